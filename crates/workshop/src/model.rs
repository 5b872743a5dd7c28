//! Workshop items, resolved item sets and link parsing

use serde::{Deserialize, Deserializer};
use url::Url;

use crate::error::{Result, WorkshopError};
use crate::format::{size_format, timestamp_to_date};

const WORKSHOP_HOST: &str = "steamcommunity.com";
const WORKSHOP_PATHS: &[&str] = &["/sharedfiles/filedetails/", "/workshop/filedetails/"];

/// `file_type` of an item that carries its own payload plus dependencies
pub const FILE_TYPE_WITH_DEPENDENCIES: u32 = 0;

/// A single record returned by the Workshop details API
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkshopItem {
    #[serde(rename = "publishedfileid", deserialize_with = "number_or_string")]
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "number_or_string")]
    pub time_created: i64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub time_updated: i64,
    #[serde(default, deserialize_with = "number_or_string")]
    pub file_size: u64,
    #[serde(default)]
    pub app_name: String,
    #[serde(default)]
    pub file_description: String,
    #[serde(default)]
    pub preview_url: String,
    #[serde(default)]
    pub file_url: String,
    /// Upstream file name, only used for its extension
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub num_children: u32,
    #[serde(default)]
    pub children: Vec<WorkshopChild>,
    #[serde(default)]
    pub file_type: u32,
}

/// Child reference inside a collection record
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WorkshopChild {
    #[serde(deserialize_with = "number_or_string")]
    pub publishedfileid: u64,
}

impl WorkshopItem {
    pub fn child_ids(&self) -> Vec<u64> {
        self.children.iter().map(|child| child.publishedfileid).collect()
    }

    pub fn has_children(&self) -> bool {
        self.num_children > 0 || !self.children.is_empty()
    }

    pub fn release_time(&self) -> String {
        timestamp_to_date(self.time_created.saturating_mul(1000))
    }

    pub fn update_time(&self) -> String {
        timestamp_to_date(self.time_updated.saturating_mul(1000))
    }

    /// Display size, empty when upstream reports zero bytes
    pub fn display_size(&self) -> String {
        size_format(self.file_size).unwrap_or_default()
    }
}

/// Items resolved for one command invocation
///
/// The originally requested item always comes first. Children follow in
/// the order upstream returned them.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSet {
    pub root: WorkshopItem,
    pub children: Vec<WorkshopItem>,
}

impl ResolvedSet {
    pub fn new(root: WorkshopItem) -> Self {
        Self { root, children: Vec::new() }
    }

    pub fn title(&self) -> &str {
        &self.root.title
    }

    /// True when the requested item has no children
    pub fn is_single(&self) -> bool {
        !self.root.has_children()
    }

    /// True when the root has its own payload in addition to children
    pub fn root_has_payload(&self) -> bool {
        self.is_single() || self.root.file_type == FILE_TYPE_WITH_DEPENDENCIES
    }

    /// Every resolved item, root first
    pub fn items(&self) -> impl Iterator<Item = &WorkshopItem> {
        std::iter::once(&self.root).chain(self.children.iter())
    }

    /// Items that should actually be delivered
    ///
    /// A plain collection root is metadata only and is left out.
    pub fn deliverables(&self) -> Vec<&WorkshopItem> {
        if self.root_has_payload() {
            self.items().collect()
        } else {
            self.children.iter().collect()
        }
    }
}

/// A validated Workshop sharing link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkshopLink {
    pub url: String,
    pub id: u64,
}

impl WorkshopLink {
    /// Parse a link such as `https://steamcommunity.com/sharedfiles/filedetails/?id=123`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let invalid = |reason: &str| WorkshopError::InvalidLink {
            url: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input).map_err(|e| invalid(&e.to_string()))?;
        if url.scheme() != "https" || url.host_str() != Some(WORKSHOP_HOST) {
            return Err(invalid("not a steamcommunity.com link"));
        }
        if !WORKSHOP_PATHS.contains(&url.path()) {
            return Err(invalid("not a Workshop file details page"));
        }

        let id = url
            .query_pairs()
            .find(|(key, _)| key == "id")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| invalid("missing id parameter"))?;
        let id = id.parse::<u64>().map_err(|_| invalid("id is not numeric"))?;

        Ok(Self { url: input.to_string(), id })
    }

    /// Recognise a message whose text starts with a Workshop link
    pub fn detect(text: &str) -> Option<Self> {
        let first = text.split_whitespace().next()?;
        Self::parse(first).ok()
    }
}

fn number_or_string<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: std::str::FromStr + TryFrom<i64> + TryFrom<u64>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Unsigned(u64),
        Signed(i64),
        Text(String),
    }

    fn out_of_range<E: serde::de::Error>() -> E {
        E::custom("number out of range")
    }

    match Raw::deserialize(deserializer)? {
        Raw::Unsigned(n) => <T as TryFrom<u64>>::try_from(n).map_err(|_| out_of_range()),
        Raw::Signed(n) => <T as TryFrom<i64>>::try_from(n).map_err(|_| out_of_range()),
        Raw::Text(s) if s.trim().is_empty() => {
            <T as TryFrom<u64>>::try_from(0).map_err(|_| out_of_range())
        }
        Raw::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid number '{}'", s))),
    }
}
