//! The `workshop` command
//!
//! Ties the pieces together: validate the link, resolve it, show the info
//! card, optionally ask for confirmation, then deliver through the chat
//! session or queue on aria2. Every user-facing failure ends in exactly one
//! chat notice; only a session that cannot send at all surfaces as an error.
//!
//! Queuing on aria2 returns as soon as the daemon accepts the batch. The
//! returned [`RpcWatch`] does the polling and the final notice, and may run
//! on its own task.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::api::WorkshopApi;
use crate::config::WorkshopConfig;
use crate::error::Result;
use crate::http::RetryClient;
use crate::model::{ResolvedSet, WorkshopLink};
use crate::notice::{Notice, info_message};
use crate::rpc::{Aria2Client, QueuedFile, RpcJob, Settled};
use crate::session::{ChatSession, Segment};
use crate::transfer::{SessionDeliverer, TransferReport, deliver_all, plan_file_names};

/// Replies accepted as a yes to the download prompt
const CONFIRM_REPLIES: [&str; 3] = ["y", "yes", "是"];

/// Flags of one invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOptions {
    /// `-d`: deliver without asking
    pub download: bool,
    /// `-i`: show info only
    pub info: bool,
    /// `-n <name>`: file name for a single-file delivery
    pub name: Option<String>,
}

/// How an invocation ended
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    InvalidLink,
    RequestFailed,
    /// Info was shown and nothing was delivered
    InfoShown,
    Declined,
    PromptTimedOut,
    /// The item resolved to no downloadable files
    NothingToDeliver,
    /// Direct delivery ran; the report may still contain failures
    Delivered(TransferReport),
    /// aria2 accepted the files; the watch still has to be run
    Queued(RpcWatch),
    /// aria2 refused the batch
    QueueFailed,
}

/// Pending completion report for jobs queued on aria2
#[derive(Debug, Clone)]
pub struct RpcWatch {
    rpc: Arc<Aria2Client>,
    jobs: Vec<RpcJob>,
    title: String,
    reply_to: Option<String>,
    interval: Duration,
    max_polls: usize,
}

impl RpcWatch {
    pub fn jobs(&self) -> &[RpcJob] {
        &self.jobs
    }

    /// Poll until the jobs settle, then tell the chat how it went
    ///
    /// Fails only when the final notice cannot be sent.
    pub async fn run(self, session: &dyn ChatSession) -> Result<Settled> {
        let settled = self
            .rpc
            .poll_until_settled(&self.jobs, self.interval, self.max_polls)
            .await;

        let notice = match settled.clone().into_result() {
            Ok(()) => Notice::RpcComplete { title: self.title },
            Err(e) => {
                warn!("{}", e);
                e.user_notice()
            }
        };
        session.send(notice.to_message(self.reply_to)).await?;
        Ok(settled)
    }
}

impl PartialEq for RpcWatch {
    fn eq(&self, other: &Self) -> bool {
        self.jobs == other.jobs && self.title == other.title && self.reply_to == other.reply_to
    }
}

enum Confirmation {
    Proceed,
    Declined,
    TimedOut,
}

/// Handler for Workshop links
pub struct WorkshopCommand {
    config: WorkshopConfig,
    http: RetryClient,
    api: WorkshopApi,
    rpc: Option<Arc<Aria2Client>>,
}

impl WorkshopCommand {
    /// Build the clients described by an already validated configuration
    pub fn new(config: WorkshopConfig) -> Result<Self> {
        let http = RetryClient::new(&config)?;
        let api = WorkshopApi::new(http.clone(), config.workshop_api.clone());
        let rpc = Aria2Client::from_config(&config, http.clone()).map(Arc::new);
        if let Some(rpc) = &rpc {
            info!("aria2 delivery enabled at {}", rpc.endpoint());
        }
        Ok(Self { config, http, api, rpc })
    }

    pub fn config(&self) -> &WorkshopConfig {
        &self.config
    }

    /// Auto-recognise hook for plain chat messages
    ///
    /// Runs the command with default options when auto-recognition is on
    /// and the message starts with a Workshop link.
    pub async fn on_message(
        &self,
        session: &dyn ChatSession,
        text: &str,
    ) -> Result<Option<CommandOutcome>> {
        if !self.config.auto_recognise {
            return Ok(None);
        }
        match WorkshopLink::detect(text) {
            Some(link) => {
                debug!("Recognised Workshop link {}", link.url);
                self.execute(session, &link.url, &CommandOptions::default())
                    .await
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    /// Run the command for one link
    pub async fn execute(
        &self,
        session: &dyn ChatSession,
        url: &str,
        options: &CommandOptions,
    ) -> Result<CommandOutcome> {
        let reply_to = session.message_id();

        let link = match WorkshopLink::parse(url) {
            Ok(link) => link,
            Err(e) => {
                debug!("{}", e);
                session.send(e.user_notice().to_message(reply_to)).await?;
                return Ok(CommandOutcome::InvalidLink);
            }
        };

        let set = match self.api.resolve_id(link.id).await {
            Ok(set) => set,
            Err(e) => {
                warn!("Failed to resolve {}: {}", link.url, e);
                debug!("{}", e.detailed_report());
                session.send(e.user_notice().to_message(reply_to)).await?;
                return Ok(CommandOutcome::RequestFailed);
            }
        };

        let has_files = !set.deliverables().is_empty();
        let ask = has_files && self.config.ask_download && !options.download && !options.info;
        self.present(session, &set, ask, reply_to.clone()).await?;

        if options.info || (!options.download && !self.config.ask_download) {
            return Ok(CommandOutcome::InfoShown);
        }
        if !has_files {
            warn!("'{}' ({}) has no files to deliver", set.title(), link.id);
            session.send(Notice::NothingToDownload.to_message(reply_to)).await?;
            return Ok(CommandOutcome::NothingToDeliver);
        }
        if !options.download {
            match self.confirm(session).await? {
                Confirmation::Proceed => {}
                Confirmation::Declined => return Ok(CommandOutcome::Declined),
                Confirmation::TimedOut => {
                    session.send(Notice::InputTimeout.to_message(reply_to)).await?;
                    return Ok(CommandOutcome::PromptTimedOut);
                }
            }
        }

        match &self.rpc {
            Some(rpc) => self.queue(session, rpc, &set, options, reply_to).await,
            None => self.deliver(session, &set, options, reply_to).await,
        }
    }

    /// Send the info card, with the download question when one will be asked
    async fn present(
        &self,
        session: &dyn ChatSession,
        set: &ResolvedSet,
        ask: bool,
        reply_to: Option<String>,
    ) -> Result<()> {
        let ask_notice = Notice::AskDownload {
            title: set.title().to_string(),
            timeout_secs: self.config.input_timeout().as_secs(),
        };

        if set.is_single() {
            let mut message = info_message(set, reply_to);
            if ask {
                message = message.extend([
                    Segment::Text(format!("{}\n", "=".repeat(20))),
                    Segment::Text(ask_notice.to_string()),
                ]);
            }
            return session.send(message).await;
        }

        session.send(info_message(set, None)).await?;
        if ask {
            session.send(ask_notice.to_message(reply_to)).await?;
        }
        Ok(())
    }

    async fn confirm(&self, session: &dyn ChatSession) -> Result<Confirmation> {
        match session.prompt(self.config.input_timeout()).await? {
            Some(reply) => {
                let reply = reply.trim().to_lowercase();
                if CONFIRM_REPLIES.contains(&reply.as_str()) {
                    Ok(Confirmation::Proceed)
                } else {
                    debug!("Download declined with '{}'", reply);
                    Ok(Confirmation::Declined)
                }
            }
            None if self.config.proceed_on_prompt_timeout => {
                info!("No reply to the download prompt, proceeding");
                Ok(Confirmation::Proceed)
            }
            None => Ok(Confirmation::TimedOut),
        }
    }

    async fn deliver(
        &self,
        session: &dyn ChatSession,
        set: &ResolvedSet,
        options: &CommandOptions,
        reply_to: Option<String>,
    ) -> Result<CommandOutcome> {
        let deliverer = SessionDeliverer::new(session, &self.http);
        let items = set.deliverables();
        let retries = self.config.download_retries;
        let report = deliver_all(&deliverer, &items, options.name.as_deref(), retries).await;

        if let Err(e) = report.clone().into_result() {
            warn!("{}", e);
            session.send(e.user_notice().to_message(reply_to)).await?;
        } else {
            info!("Delivered {} file(s) for '{}'", report.items.len(), set.title());
        }
        Ok(CommandOutcome::Delivered(report))
    }

    async fn queue(
        &self,
        session: &dyn ChatSession,
        rpc: &Arc<Aria2Client>,
        set: &ResolvedSet,
        options: &CommandOptions,
        reply_to: Option<String>,
    ) -> Result<CommandOutcome> {
        let items = set.deliverables();
        let files: Vec<QueuedFile> = items
            .iter()
            .zip(plan_file_names(&items, options.name.as_deref()))
            .map(|(item, file_name)| QueuedFile {
                item_id: item.id,
                url: item.file_url.clone(),
                file_name,
            })
            .collect();

        let jobs = match rpc.queue_download(&files).await {
            Ok(jobs) => jobs,
            Err(e) => {
                warn!("aria2 rejected the download batch: {}", e);
                session.send(e.user_notice().to_message(reply_to)).await?;
                return Ok(CommandOutcome::QueueFailed);
            }
        };

        let pushed = Notice::RpcPushed {
            files: jobs.iter().map(|job| job.file_name.clone()).collect(),
        };
        session.send(pushed.to_message(reply_to.clone())).await?;

        Ok(CommandOutcome::Queued(RpcWatch {
            rpc: Arc::clone(rpc),
            jobs,
            title: set.title().to_string(),
            reply_to,
            interval: self.config.rpc_poll_interval(),
            max_polls: self.config.rpc_max_polls,
        }))
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::InvalidLink => write!(f, "invalid link"),
            CommandOutcome::RequestFailed => write!(f, "request failed"),
            CommandOutcome::InfoShown => write!(f, "info shown"),
            CommandOutcome::Declined => write!(f, "declined"),
            CommandOutcome::PromptTimedOut => write!(f, "prompt timed out"),
            CommandOutcome::NothingToDeliver => write!(f, "nothing to deliver"),
            CommandOutcome::Delivered(report) => write!(
                f,
                "delivered {}/{} in {} round(s)",
                report.delivered_ids().len(),
                report.items.len(),
                report.rounds
            ),
            CommandOutcome::Queued(watch) => write!(f, "queued {} job(s)", watch.jobs.len()),
            CommandOutcome::QueueFailed => write!(f, "queue failed"),
        }
    }
}
