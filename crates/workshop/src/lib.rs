//! Workshop Library
//!
//! This library resolves Steam Workshop sharing links into file metadata and
//! delivers the files to a chat session, either by handing them to the
//! session directly or by queuing them on an aria2 daemon over JSON-RPC.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use workshop::{CommandOptions, WorkshopCommand, WorkshopConfig};
//! # use workshop::ChatSession;
//!
//! # async fn example(session: &dyn ChatSession) -> workshop::Result<()> {
//! // Load configuration from WORKSHOP_* variables (and .env)
//! let config = WorkshopConfig::from_env()?;
//!
//! let command = WorkshopCommand::new(config)?;
//!
//! // Show info and deliver without asking
//! let options = CommandOptions { download: true, ..CommandOptions::default() };
//! let url = "https://steamcommunity.com/sharedfiles/filedetails/?id=2503216290";
//! let outcome = command.execute(session, url, &options).await?;
//!
//! println!("{}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Link resolution**: collections are expanded in chunks of at most 50 ids
//! - **Retry logic**: bounded, immediate retries for every upstream request
//! - **Bulk delivery**: failed files are retried in rounds, successes never resent
//! - **aria2 RPC**: batched `system.multicall` queuing and status polling
//! - **Pluggable chat platform**: everything platform-specific sits behind [`ChatSession`]

pub mod api;
pub mod command;
pub mod config;
pub mod error;
pub mod format;
pub mod http;
pub mod model;
pub mod notice;
pub mod rpc;
pub mod session;
pub mod transfer;

pub use api::WorkshopApi;
pub use command::{CommandOptions, CommandOutcome, RpcWatch, WorkshopCommand};
pub use config::WorkshopConfig;
pub use error::{Result, WorkshopError};
pub use format::{format_file_name, size_format, timestamp_to_date};
pub use http::{RequestBody, RetryClient};
pub use model::{ResolvedSet, WorkshopItem, WorkshopLink};
pub use notice::Notice;
pub use rpc::{Aria2Client, RpcJob, Settled};
pub use session::{ChatSession, Message, Segment, UploadCapability};
pub use transfer::{Deliverer, TransferOutcome, TransferReport};
