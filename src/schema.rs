//! Data model for scraped pages and the site summary
//!
//! Everything here is serialized verbatim into the `data/` tree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Label used when a download has no preceding type label.
pub const DEFAULT_DOWNLOAD_TYPE: &str = "下载";

/// Title used when the page has no primary heading.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Structured extraction result for one scraped page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub title: String,
    #[serde(default)]
    pub intro_text: String,
    #[serde(default)]
    pub release_info: String,
    #[serde(default)]
    pub version_info: String,
    /// Remote hero image, resolved against the page URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Local copy of the hero image, relative to the item directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    pub url: String,
    #[serde(default)]
    pub versions: Vec<VersionBlock>,
}

impl PageRecord {
    pub fn download_count(&self) -> usize {
        self.versions.iter().map(|v| v.downloads.len()).sum()
    }

    pub fn has_placeholder_title(&self) -> bool {
        self.title == UNKNOWN_TITLE
    }
}

/// One version's metadata and its download entries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionBlock {
    pub version_text: String,
    #[serde(default)]
    pub attributes: Vec<String>,
    #[serde(default)]
    pub downloads: Vec<DownloadEntry>,
}

impl VersionBlock {
    /// A block without attributes and downloads carries nothing worth keeping.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.downloads.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEntry {
    pub download_type: String,
    pub download_url: String,
}

impl DownloadEntry {
    pub fn kind(&self) -> LinkKind {
        LinkKind::classify(&self.download_url)
    }
}

/// Download link scheme, decided purely by prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    /// http:// or https://
    Http,
    /// ed2k:// peer-to-peer link
    Ed2k,
    /// magnet:, thunder:, ftp: and anything else
    Other,
}

impl LinkKind {
    pub fn classify(url: &str) -> Self {
        let lower = url.trim_start().to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            LinkKind::Http
        } else if lower.starts_with("ed2k://") {
            LinkKind::Ed2k
        } else {
            LinkKind::Other
        }
    }
}

impl std::fmt::Display for LinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkKind::Http => write!(f, "http"),
            LinkKind::Ed2k => write!(f, "ed2k"),
            LinkKind::Other => write!(f, "other"),
        }
    }
}

/// Aggregate for one category, written as `{category}.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    pub name: String,
    #[serde(rename = "type")]
    pub slug: String,
    #[serde(default)]
    pub subtypes: BTreeMap<String, PageRecord>,
}

impl CategoryData {
    pub fn new(slug: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            subtypes: BTreeMap::new(),
        }
    }
}

/// Root of `summary.json`. Always rebuilt from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryIndex {
    pub last_updated: String,
    #[serde(default)]
    pub systems: BTreeMap<String, CategoryData>,
}

impl SummaryIndex {
    pub fn total_items(&self) -> usize {
        self.systems.values().map(|c| c.subtypes.len()).sum()
    }
}
