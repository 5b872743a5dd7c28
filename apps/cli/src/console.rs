//! Terminal chat session
//!
//! Messages go to stdout, replies come from stdin and delivered files are
//! written into an output directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::Mutex;
use tracing::{debug, info};
use workshop::{ChatSession, Message, Result, Segment, UploadCapability, WorkshopError};

type Input = Lines<Box<dyn AsyncBufRead + Unpin + Send>>;

/// Session backed by the terminal
#[derive(Clone)]
pub struct ConsoleSession {
    input: Arc<Mutex<Input>>,
    out_dir: PathBuf,
    capability: UploadCapability,
    message_id: Option<String>,
}

impl ConsoleSession {
    pub fn new(
        reader: Box<dyn AsyncBufRead + Unpin + Send>,
        out_dir: PathBuf,
        capability: UploadCapability,
    ) -> Self {
        Self {
            input: Arc::new(Mutex::new(reader.lines())),
            out_dir,
            capability,
            message_id: None,
        }
    }

    pub fn stdin(out_dir: PathBuf, capability: UploadCapability) -> Self {
        let reader = tokio::io::BufReader::new(tokio::io::stdin());
        Self::new(Box::new(reader), out_dir, capability)
    }

    /// Same terminal, answering a different input line
    pub fn with_message_id(&self, id: u64) -> Self {
        Self {
            message_id: Some(id.to_string()),
            ..self.clone()
        }
    }

    /// Next input line, `None` at end of input
    pub async fn read_line(&self) -> Result<Option<String>> {
        self.input.lock().await.next_line().await.map_err(stdin_error)
    }
}

fn stdin_error(source: std::io::Error) -> WorkshopError {
    WorkshopError::Io {
        path: PathBuf::from("<stdin>"),
        source,
    }
}

/// Last component of a user-supplied file name, so saves stay inside the output dir
fn safe_file_name(file_name: &str) -> Result<&Path> {
    Path::new(file_name)
        .file_name()
        .map(Path::new)
        .ok_or_else(|| WorkshopError::Session {
            message: format!("'{}' is not a usable file name", file_name),
        })
}

/// Plain-text rendering of a message for the terminal
pub fn render(message: &Message) -> String {
    let mut out = String::new();
    if let Some(id) = &message.reply_to {
        out.push_str(&format!("> #{}\n", id));
    }
    for segment in &message.segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Image(url) => out.push_str(&format!("[image] {}\n", url)),
            Segment::Forward(messages) => {
                for message in messages {
                    out.push_str("----\n");
                    out.push_str(&render(message));
                }
                out.push_str("----\n");
            }
        }
    }
    out
}

#[async_trait]
impl ChatSession for ConsoleSession {
    fn message_id(&self) -> Option<String> {
        self.message_id.clone()
    }

    async fn send(&self, message: Message) -> Result<()> {
        let text = render(&message);
        println!("{}", text.trim_end());
        Ok(())
    }

    async fn prompt(&self, timeout: Duration) -> Result<Option<String>> {
        match tokio::time::timeout(timeout, self.read_line()).await {
            Ok(line) => line,
            Err(_) => {
                debug!("No input within {:?}", timeout);
                Ok(None)
            }
        }
    }

    fn upload_capability(&self) -> UploadCapability {
        self.capability
    }

    async fn send_file_url(&self, url: &str, file_name: &str) -> Result<()> {
        println!("{}: {}", file_name, url);
        Ok(())
    }

    async fn send_file_path(&self, file_name: &str, path: &Path) -> Result<()> {
        let target = self.out_dir.join(safe_file_name(file_name)?);
        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|source| WorkshopError::Io { path: self.out_dir.clone(), source })?;
        let size = tokio::fs::copy(path, &target)
            .await
            .map_err(|source| WorkshopError::Io { path: target.clone(), source })?;
        info!("Saved {} ({} bytes)", target.display(), size);
        Ok(())
    }
}
