//! Static registry of categories and subtypes to mirror
//!
//! One YAML table drives the whole run: where pages live, how URLs are
//! built, and the order categories appear on the index.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Catalog shipped with the binary
const BUILTIN_CATALOG: &str = include_str!("../catalog.yaml");

const DEFAULT_URL_TEMPLATE: &str = "{base}/{category}/{subtype}/";

/// Accepted per-request timeout, in seconds
pub const TIMEOUT_RANGE: RangeInclusive<u64> = 15..=30;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid slug {0:?}: use lowercase letters, digits, '.', '_' or '-'")]
    InvalidSlug(String),
    #[error("duplicate category {0:?}")]
    DuplicateCategory(String),
    #[error("duplicate subtype {subtype:?} in category {category:?}")]
    DuplicateSubtype { category: String, subtype: String },
    #[error("catalog has no categories")]
    Empty,
    #[error("fetch.timeout_secs must be between 15 and 30, got {0}")]
    Timeout(u64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub base_url: String,
    #[serde(default = "default_url_template")]
    pub url_template: String,
    /// Prefixes stripped by [`local_path`]; `base_url` is always one of them
    #[serde(default)]
    pub host_prefixes: Vec<String>,
    /// Single line written to CNAME
    pub hostname: String,
    #[serde(default)]
    pub fetch: FetchSettings,
    pub categories: Vec<CategorySpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchSettings {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            delay_secs: default_delay_secs(),
        }
    }
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub slug: String,
    /// Display name, e.g. "Windows 11"
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    pub subtypes: Vec<String>,
}

/// One page to visit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub category: String,
    pub subtype: String,
    pub source_url: String,
}

impl CatalogEntry {
    /// Directory of this entry below the data root
    pub fn item_path(&self) -> String {
        format!("{}/{}", self.category, self.subtype)
    }
}

fn default_url_template() -> String {
    DEFAULT_URL_TEMPLATE.to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_delay_secs() -> u64 {
    2
}

impl Catalog {
    /// Load the catalog from `path`, or the built-in one when no path is given.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
                Self::from_yaml(&content)
                    .with_context(|| format!("Failed to parse catalog: {}", path.display()))
            }
            None => Self::builtin(),
        }
    }

    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CATALOG).context("Built-in catalog is invalid")
    }

    pub fn from_yaml(content: &str) -> Result<Self, CatalogError> {
        let mut catalog: Catalog = serde_yaml::from_str(content)?;
        catalog.base_url = catalog.base_url.trim_end_matches('/').to_string();
        let base_prefix = format!("{}/", catalog.base_url);
        if !catalog.host_prefixes.contains(&base_prefix) {
            catalog.host_prefixes.push(base_prefix);
        }
        catalog.validate()?;
        Ok(catalog)
    }

    fn validate(&self) -> Result<(), CatalogError> {
        if self.categories.is_empty() {
            return Err(CatalogError::Empty);
        }
        if !TIMEOUT_RANGE.contains(&self.fetch.timeout_secs) {
            return Err(CatalogError::Timeout(self.fetch.timeout_secs));
        }

        let mut seen_categories = HashSet::new();
        for cat in &self.categories {
            check_slug(&cat.slug)?;
            if !seen_categories.insert(cat.slug.as_str()) {
                return Err(CatalogError::DuplicateCategory(cat.slug.clone()));
            }

            let mut seen_subtypes = HashSet::new();
            for sub in &cat.subtypes {
                check_slug(sub)?;
                if !seen_subtypes.insert(sub.as_str()) {
                    return Err(CatalogError::DuplicateSubtype {
                        category: cat.slug.clone(),
                        subtype: sub.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Every page to visit, in display order
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.categories
            .iter()
            .flat_map(|cat| {
                cat.subtypes.iter().map(move |sub| CatalogEntry {
                    category: cat.slug.clone(),
                    subtype: sub.clone(),
                    source_url: self.source_url(&cat.slug, sub),
                })
            })
            .collect()
    }

    pub fn source_url(&self, category: &str, subtype: &str) -> String {
        self.url_template
            .replace("{base}", &self.base_url)
            .replace("{category}", category)
            .replace("{subtype}", subtype)
    }

    pub fn category(&self, slug: &str) -> Option<&CategorySpec> {
        self.categories.iter().find(|c| c.slug == slug)
    }

    /// Position of a category in the display order (unknown slugs sort last)
    pub fn display_rank(&self, slug: &str) -> usize {
        self.categories
            .iter()
            .position(|c| c.slug == slug)
            .unwrap_or(self.categories.len())
    }

    pub fn local_path(&self, url: &str) -> String {
        local_path(url, &self.host_prefixes)
    }
}

/// Slugs become directory names, so only `[a-z0-9._-]` without a leading dot
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('.')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
}

fn check_slug(slug: &str) -> Result<(), CatalogError> {
    if is_valid_slug(slug) {
        Ok(())
    } else {
        Err(CatalogError::InvalidSlug(slug.to_string()))
    }
}

/// Map a page URL to its site-relative path: strip the first known host
/// prefix and any trailing slashes. Idempotent.
pub fn local_path(url: &str, prefixes: &[String]) -> String {
    let stripped = prefixes
        .iter()
        .find_map(|p| url.strip_prefix(p.as_str()))
        .unwrap_or(url);
    stripped.trim_end_matches('/').to_string()
}
