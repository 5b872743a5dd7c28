//! Chat session capability interface
//!
//! The chat platform is external. It hands the command a [`ChatSession`]
//! that can send messages, wait for a reply and deliver files. How a file
//! reaches the chat is the session's choice, advertised through
//! [`UploadCapability`].

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// One piece of a chat message
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Text(String),
    /// Image by URL
    Image(String),
    /// Bundle of messages shown together, e.g. a forwarded card list
    Forward(Vec<Message>),
}

/// A chat message, optionally quoting the message that triggered it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    pub reply_to: Option<String>,
    pub segments: Vec<Segment>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quote the triggering message, if the session has an id for it
    pub fn reply<S: Into<String>>(reply_to: Option<S>) -> Self {
        Self {
            reply_to: reply_to.map(Into::into),
            segments: Vec::new(),
        }
    }

    pub fn text<S: Into<String>>(mut self, text: S) -> Self {
        self.segments.push(Segment::Text(text.into()));
        self
    }

    pub fn image<S: Into<String>>(mut self, url: S) -> Self {
        self.segments.push(Segment::Image(url.into()));
        self
    }

    pub fn forward(mut self, messages: Vec<Message>) -> Self {
        self.segments.push(Segment::Forward(messages));
        self
    }

    pub fn extend(mut self, segments: impl IntoIterator<Item = Segment>) -> Self {
        self.segments.extend(segments);
        self
    }

    /// Concatenated text of every segment, images and bundles included
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Image(url) => {
                    out.push_str("[image: ");
                    out.push_str(url);
                    out.push_str("]\n");
                }
                Segment::Forward(messages) => {
                    for message in messages {
                        out.push_str(&message.plain_text());
                    }
                }
            }
        }
        out
    }
}

/// How a session gets a file into the chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCapability {
    /// The platform fetches the file from its URL itself
    Direct,
    /// The file has to be downloaded first and uploaded from disk
    DownloadThenUpload,
}

/// Capabilities a chat platform provides to the Workshop command
#[async_trait]
pub trait ChatSession: Send + Sync {
    /// Id of the message that triggered the command, used for quoting
    fn message_id(&self) -> Option<String>;

    async fn send(&self, message: Message) -> Result<()>;

    /// Wait up to `timeout` for the user's next reply
    ///
    /// `Ok(None)` means no reply arrived in time.
    async fn prompt(&self, timeout: Duration) -> Result<Option<String>>;

    fn upload_capability(&self) -> UploadCapability;

    /// Send a file the platform fetches from `url`
    async fn send_file_url(&self, url: &str, file_name: &str) -> Result<()>;

    /// Upload a downloaded file from disk under `file_name`
    ///
    /// `path` is temporary and removed once the call returns.
    async fn send_file_path(&self, file_name: &str, path: &Path) -> Result<()>;
}
