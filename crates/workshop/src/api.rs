//! Workshop details API client
//!
//! Resolves a sharing link into the requested item plus, for collections and
//! files with dependencies, every child item. The details endpoint accepts at
//! most [`MAX_IDS_PER_REQUEST`] ids per call, so child ids are fetched in
//! chunks, one request at a time.

use reqwest::Method;
use tracing::{debug, info};

use crate::error::{Result, WorkshopError};
use crate::http::{RequestBody, RetryClient};
use crate::model::{ResolvedSet, WorkshopItem, WorkshopLink};

/// Upstream limit on ids per details request
pub const MAX_IDS_PER_REQUEST: usize = 50;

/// Client for the Workshop details endpoint
#[derive(Debug, Clone)]
pub struct WorkshopApi {
    http: RetryClient,
    endpoint: String,
}

impl WorkshopApi {
    pub fn new<S: Into<String>>(http: RetryClient, endpoint: S) -> Self {
        Self { http, endpoint: endpoint.into() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Resolve a sharing link into the requested item and its children
    pub async fn resolve(&self, url: &str) -> Result<ResolvedSet> {
        let link = WorkshopLink::parse(url)?;
        self.resolve_id(link.id).await
    }

    /// Resolve a Workshop id into the requested item and its children
    pub async fn resolve_id(&self, id: u64) -> Result<ResolvedSet> {
        let root = self
            .fetch_details(&[id])
            .await?
            .into_iter()
            .next()
            .ok_or(WorkshopError::EmptyResult { id })?;

        let mut set = ResolvedSet::new(root);
        if set.is_single() {
            info!("Resolved single file '{}' ({})", set.title(), id);
            return Ok(set);
        }

        let child_ids = set.root.child_ids();
        info!(
            "Resolved collection '{}' ({}) with {} children, file type {}",
            set.title(),
            id,
            child_ids.len(),
            set.root.file_type
        );

        for chunk in child_ids.chunks(MAX_IDS_PER_REQUEST) {
            let items = self.fetch_details(chunk).await?;
            set.children.extend(items);
        }

        Ok(set)
    }

    /// Fetch details for up to [`MAX_IDS_PER_REQUEST`] ids in one request
    pub async fn fetch_details(&self, ids: &[u64]) -> Result<Vec<WorkshopItem>> {
        debug_assert!(ids.len() <= MAX_IDS_PER_REQUEST);
        let body = id_list(ids);
        debug!("Workshop details request: {}", body);

        self.http
            .request_with_retry(Method::POST, &self.endpoint, RequestBody::Text(body))
            .await
    }
}

/// Encode ids as the literal `[id1,id2,...]` body the endpoint expects
fn id_list(ids: &[u64]) -> String {
    let joined = ids.iter().map(u64::to_string).collect::<Vec<_>>().join(",");
    format!("[{}]", joined)
}
