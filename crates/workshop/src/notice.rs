//! User-facing chat text

use std::fmt;

use crate::model::{ResolvedSet, WorkshopItem};
use crate::session::{Message, Segment};

/// Short notices sent back to the chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    InvalidLink,
    RequestFailed,
    AskDownload { title: String, timeout_secs: u64 },
    InputTimeout,
    NothingToDownload,
    DownloadFailed,
    RpcPushed { files: Vec<String> },
    RpcComplete { title: String },
    RpcError { message: String },
    RpcTimeout,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::InvalidLink => write!(f, "That is not a valid Steam Workshop link."),
            Notice::RequestFailed => write!(
                f,
                "Request failed, the id may be invalid or the service is unavailable."
            ),
            Notice::AskDownload { title, timeout_secs } => write!(
                f,
                "Download \"{}\"? Reply y/yes within {} seconds to confirm.",
                title, timeout_secs
            ),
            Notice::InputTimeout => write!(f, "Input timed out, download cancelled."),
            Notice::NothingToDownload => {
                write!(f, "Nothing to download, the item has no files.")
            }
            Notice::DownloadFailed => {
                write!(f, "Some files could not be sent, please try again later.")
            }
            Notice::RpcPushed { files } => {
                write!(f, "Queued {} file(s) for download: {}", files.len(), files.join(", "))
            }
            Notice::RpcComplete { title } => write!(f, "\"{}\" finished downloading.", title),
            Notice::RpcError { message } => write!(f, "Download failed: {}", message),
            Notice::RpcTimeout => write!(
                f,
                "Stopped waiting for the download, it may still be running."
            ),
        }
    }
}

impl Notice {
    /// Render as a message quoting `reply_to`
    pub fn to_message(&self, reply_to: Option<String>) -> Message {
        Message::reply(reply_to).text(self.to_string())
    }
}

/// Full info card for a single file, with both timestamps
pub fn detailed_card(item: &WorkshopItem) -> Vec<Segment> {
    vec![
        Segment::Text(format!("Title: {}\n", item.title)),
        Segment::Text(format!("Released: {}\n", item.release_time())),
        Segment::Text(format!("Updated: {}\n", item.update_time())),
        Segment::Text(format!("File size: {}\n", item.display_size())),
        Segment::Text(format!("Game: {}\n", item.app_name)),
        Segment::Text(format!("Description: \n{}\n", item.file_description)),
        Segment::Image(item.preview_url.clone()),
    ]
}

/// Compact card used inside a collection bundle
pub fn summary_card(item: &WorkshopItem) -> Vec<Segment> {
    vec![
        Segment::Text(format!("Title: {}\n", item.title)),
        Segment::Text(format!("File size: {}\n", item.display_size())),
        Segment::Text(format!("Game: {}\n", item.app_name)),
        Segment::Text(format!("Description: \n{}\n", item.file_description)),
        Segment::Image(item.preview_url.clone()),
    ]
}

/// Info message for a resolved set
///
/// Single files get one detailed card. Collections get a bundle of summary
/// cards; the root is included only when it has a payload of its own.
pub fn info_message(set: &ResolvedSet, reply_to: Option<String>) -> Message {
    if set.is_single() {
        return Message::reply(reply_to).extend(detailed_card(&set.root));
    }

    let cards = set
        .deliverables()
        .into_iter()
        .map(|item| Message::new().extend(summary_card(item)))
        .collect();
    Message::reply(reply_to).forward(cards)
}
