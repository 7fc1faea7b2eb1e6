//! On-disk layout of the generated site
//!
//! ```text
//! {site}/index.html
//! {site}/CNAME
//! {site}/static/style.css, script.js
//! {site}/data/summary.json
//! {site}/data/{category}.json
//! {site}/data/{category}/{subtype}/data.json
//! {site}/data/{category}/{subtype}/detail.html
//! {site}/data/{category}/{subtype}/images/*
//! ```

use crate::catalog::CatalogEntry;
use crate::schema::{CategoryData, PageRecord, SummaryIndex};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

pub const DATA_DIR: &str = "data";
pub const STATIC_DIR: &str = "static";
pub const SUMMARY_FILE: &str = "summary.json";
pub const ITEM_FILE: &str = "data.json";
pub const DETAIL_FILE: &str = "detail.html";
pub const INDEX_FILE: &str = "index.html";
pub const CNAME_FILE: &str = "CNAME";

const STYLE_CSS: &str = include_str!("../assets/style.css");
const SCRIPT_JS: &str = include_str!("../assets/script.js");

pub struct SiteStore {
    site_dir: PathBuf,
    data_dir: PathBuf,
}

impl SiteStore {
    pub fn new(site_dir: impl Into<PathBuf>) -> Self {
        let site_dir = site_dir.into();
        let data_dir = site_dir.join(DATA_DIR);
        Self { site_dir, data_dir }
    }

    pub fn site_dir(&self) -> &Path {
        &self.site_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn item_dir(&self, entry: &CatalogEntry) -> PathBuf {
        self.data_dir.join(&entry.category).join(&entry.subtype)
    }

    /// Write `data.json` and `detail.html` for one entry, replacing old copies
    pub async fn write_item(
        &self,
        entry: &CatalogEntry,
        record: &PageRecord,
        detail_html: &str,
    ) -> Result<()> {
        let dir = self.item_dir(entry);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        write_json(&dir.join(ITEM_FILE), record).await?;
        let detail = dir.join(DETAIL_FILE);
        fs::write(&detail, detail_html)
            .await
            .with_context(|| format!("Failed to write {}", detail.display()))?;

        debug!(path = %dir.display(), "item written");
        Ok(())
    }

    /// Replace only `detail.html` of an existing entry
    pub async fn write_detail(&self, entry: &CatalogEntry, detail_html: &str) -> Result<()> {
        let dir = self.item_dir(entry);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let detail = dir.join(DETAIL_FILE);
        fs::write(&detail, detail_html)
            .await
            .with_context(|| format!("Failed to write {}", detail.display()))
    }

    /// Store an image below the entry's `images/` directory and return its
    /// path relative to the entry directory.
    pub async fn write_image(
        &self,
        entry: &CatalogEntry,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String> {
        let dir = self.item_dir(entry).join("images");
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let path = dir.join(file_name);
        fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(format!("images/{}", file_name))
    }

    pub async fn write_category(&self, category: &CategoryData) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.data_dir.display()))?;
        write_json(
            &self.data_dir.join(format!("{}.json", category.slug)),
            category,
        )
        .await
    }

    /// Overwrite `summary.json` with a fully rebuilt index
    pub async fn write_summary(&self, summary: &SummaryIndex) -> Result<()> {
        fs::create_dir_all(&self.data_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.data_dir.display()))?;
        write_json(&self.data_dir.join(SUMMARY_FILE), summary).await
    }

    pub async fn load_summary(&self) -> Result<SummaryIndex> {
        let path = self.data_dir.join(SUMMARY_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read summary: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse summary: {}", path.display()))
    }

    pub async fn load_item(&self, entry: &CatalogEntry) -> Result<PageRecord> {
        let path = self.item_dir(entry).join(ITEM_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub async fn write_index(&self, html: &str) -> Result<()> {
        fs::create_dir_all(&self.site_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.site_dir.display()))?;
        let path = self.site_dir.join(INDEX_FILE);
        fs::write(&path, html)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Write `static/style.css` and `static/script.js`. A file that cannot
    /// be replaced is logged and skipped.
    pub async fn write_static_assets(&self) -> Result<usize> {
        let dir = self.site_dir.join(STATIC_DIR);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let mut written = 0;
        for (name, contents) in [("style.css", STYLE_CSS), ("script.js", SCRIPT_JS)] {
            if write_with_retry(&dir.join(name), contents.as_bytes()).await {
                written += 1;
            }
        }
        Ok(written)
    }

    pub async fn write_cname(&self, hostname: &str) -> Result<()> {
        let path = self.site_dir.join(CNAME_FILE);
        fs::write(&path, format!("{}\n", hostname.trim()))
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write a file; on a permission error delete the target and try once more.
/// Returns false (after logging) when the file could not be written.
pub(crate) async fn write_with_retry(path: &Path, contents: &[u8]) -> bool {
    let err = match fs::write(path, contents).await {
        Ok(()) => return true,
        Err(e) => e,
    };

    if err.kind() == io::ErrorKind::PermissionDenied {
        let _ = fs::remove_file(path).await;
        match fs::write(path, contents).await {
            Ok(()) => return true,
            Err(e) => warn!(path = %path.display(), error = %e, "write failed after retry"),
        }
    } else {
        warn!(path = %path.display(), error = %err, "write failed");
    }
    false
}
