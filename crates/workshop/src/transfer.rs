//! Bulk file delivery with retry rounds
//!
//! The orchestrator only sequences attempts and tracks outcomes. The actual
//! transfer is done by a [`Deliverer`], normally a [`SessionDeliverer`] that
//! hands files to the chat platform.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, WorkshopError};
use crate::format::format_file_name;
use crate::http::RetryClient;
use crate::model::WorkshopItem;
use crate::session::{ChatSession, UploadCapability};

/// Something that can get one file to the user
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, item: &WorkshopItem, file_name: &str) -> Result<()>;
}

/// Delivers through the chat session, using whichever upload path it supports
pub struct SessionDeliverer<'a> {
    session: &'a dyn ChatSession,
    http: &'a RetryClient,
}

impl<'a> SessionDeliverer<'a> {
    pub fn new(session: &'a dyn ChatSession, http: &'a RetryClient) -> Self {
        Self { session, http }
    }
}

#[async_trait]
impl Deliverer for SessionDeliverer<'_> {
    async fn deliver(&self, item: &WorkshopItem, file_name: &str) -> Result<()> {
        match self.session.upload_capability() {
            UploadCapability::Direct => self.session.send_file_url(&item.file_url, file_name).await,
            UploadCapability::DownloadThenUpload => {
                let file = self.http.download_to_temp(&item.file_url).await?;
                debug!("Uploading {} from {}", file_name, file.path().display());
                self.session.send_file_path(file_name, file.path()).await
            }
        }
    }
}

/// Delivery state of one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Pending,
    Delivered,
    Failed { last_error: String },
}

/// Outcome for one item, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub id: u64,
    pub file_name: String,
    pub outcome: TransferOutcome,
}

/// Result of a bulk delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub items: Vec<ItemOutcome>,
    /// Rounds actually run, at most `retry_bound + 1`
    pub rounds: usize,
}

impl TransferReport {
    pub fn delivered_ids(&self) -> Vec<u64> {
        self.ids_where(|outcome| matches!(outcome, TransferOutcome::Delivered))
    }

    pub fn failed_ids(&self) -> Vec<u64> {
        self.ids_where(|outcome| matches!(outcome, TransferOutcome::Failed { .. }))
    }

    pub fn is_complete(&self) -> bool {
        self.items.iter().all(|item| item.outcome == TransferOutcome::Delivered)
    }

    /// Collapse permanent failures into one collective error
    pub fn into_result(self) -> Result<Self> {
        let failed = self.failed_ids();
        if failed.is_empty() {
            Ok(self)
        } else {
            Err(WorkshopError::DeliveryFailed { failed })
        }
    }

    fn ids_where(&self, predicate: impl Fn(&TransferOutcome) -> bool) -> Vec<u64> {
        self.items
            .iter()
            .filter(|item| predicate(&item.outcome))
            .map(|item| item.id)
            .collect()
    }
}

/// File name for every item; the override only applies to a lone item
pub fn plan_file_names(items: &[&WorkshopItem], name_override: Option<&str>) -> Vec<String> {
    let name_override = if items.len() == 1 { name_override } else { None };
    if items.len() > 1 && name_override.is_none() {
        debug!("Naming {} files from their titles", items.len());
    }
    items
        .iter()
        .map(|item| format_file_name(item, name_override))
        .collect()
}

/// Deliver every item, retrying failures for up to `retry_bound` extra rounds
///
/// Each round only attempts items that have not been delivered yet, so a
/// single item stops at its first success and a batch shrinks monotonically.
/// Whatever is still pending after the last round is marked failed.
pub async fn deliver_all(
    deliverer: &dyn Deliverer,
    items: &[&WorkshopItem],
    name_override: Option<&str>,
    retry_bound: usize,
) -> TransferReport {
    let names = plan_file_names(items, name_override);
    let mut report = TransferReport {
        items: items
            .iter()
            .zip(names)
            .map(|(item, file_name)| ItemOutcome {
                id: item.id,
                file_name,
                outcome: TransferOutcome::Pending,
            })
            .collect(),
        rounds: 0,
    };
    let mut last_errors: Vec<Option<String>> = vec![None; items.len()];

    for round in 0..=retry_bound {
        let pending: Vec<usize> = report
            .items
            .iter()
            .enumerate()
            .filter(|(_, item)| item.outcome == TransferOutcome::Pending)
            .map(|(index, _)| index)
            .collect();
        if pending.is_empty() {
            break;
        }
        if round > 0 {
            info!("{} file(s) not delivered, retrying {}/{}", pending.len(), round, retry_bound);
        }
        report.rounds += 1;

        for index in pending {
            let file_name = report.items[index].file_name.clone();
            info!("Delivering {} ({})", file_name, items[index].file_url);
            match deliverer.deliver(items[index], &file_name).await {
                Ok(()) => report.items[index].outcome = TransferOutcome::Delivered,
                Err(e) => {
                    debug!("Delivery of {} failed: {}", file_name, e);
                    last_errors[index] = Some(e.to_string());
                }
            }
        }
    }

    for (entry, last_error) in report.items.iter_mut().zip(last_errors) {
        if entry.outcome == TransferOutcome::Pending {
            warn!("Giving up on {} after {} round(s)", entry.file_name, report.rounds);
            entry.outcome = TransferOutcome::Failed {
                last_error: last_error.unwrap_or_default(),
            };
        }
    }

    report
}
