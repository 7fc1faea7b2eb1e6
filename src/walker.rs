//! scrape command: walk the catalog and write the data tree
//!
//! Strictly sequential: fetch, extract, persist, then the next page.
//! A failed page is logged and skipped; it never stops the walk.

use crate::catalog::{Catalog, CatalogEntry, CategorySpec};
use crate::extract::Extractor;
use crate::fetch::HttpFetcher;
use crate::render::SiteRenderer;
use crate::schema::{CategoryData, PageRecord, SummaryIndex};
use crate::store::SiteStore;
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{error, info, warn};
use url::Url;

#[derive(Args, Clone)]
pub struct ScrapeArgs {
    /// Catalog YAML file (default: built-in catalog)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Site directory to write into
    #[arg(short, long, default_value = "site")]
    pub out: PathBuf,

    /// Only scrape these categories (can be used multiple times)
    #[arg(long, short)]
    pub category: Option<Vec<String>>,

    /// Timeout per request in seconds, 15-30 (overrides the catalog)
    #[arg(long, value_parser = clap::value_parser!(u64).range(15..=30))]
    pub timeout: Option<u64>,

    /// Delay between requests in seconds (overrides the catalog)
    #[arg(long)]
    pub delay: Option<u64>,
}

/// Outcome of one walk. `summary` is what was written to summary.json.
#[derive(Debug, Serialize)]
pub struct WalkReport {
    pub ok: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
    #[serde(skip)]
    pub summary: SummaryIndex,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemFailure {
    pub category: String,
    pub subtype: String,
    pub url: String,
    pub error: String,
}

pub async fn run_scrape(args: ScrapeArgs) -> Result<()> {
    let catalog = load_catalog(&args).await?;
    let store = SiteStore::new(&args.out);

    let report = scrape(&catalog, &store).await?;

    // Compact JSON report on stdout
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

/// Walk the whole catalog into `store` with the catalog's fetch settings
pub async fn scrape(catalog: &Catalog, store: &SiteStore) -> Result<WalkReport> {
    let renderer = SiteRenderer::new()?;
    let fetcher = HttpFetcher::new(&catalog.fetch)?;

    let report = Walker::new(catalog, store, &renderer, fetcher)?.run().await?;
    info!("Done: {}/{} OK", report.ok, report.ok + report.failed);

    Ok(report)
}

/// Load the catalog and apply command-line overrides
pub(crate) async fn load_catalog(args: &ScrapeArgs) -> Result<Catalog> {
    let mut catalog = Catalog::load(args.catalog.as_deref()).await?;

    if let Some(timeout) = args.timeout {
        catalog.fetch.timeout_secs = timeout;
    }
    if let Some(delay) = args.delay {
        catalog.fetch.delay_secs = delay;
    }
    if let Some(wanted) = &args.category {
        select_categories(&mut catalog, wanted)?;
    }

    Ok(catalog)
}

fn select_categories(catalog: &mut Catalog, wanted: &[String]) -> Result<()> {
    for slug in wanted {
        if catalog.category(slug).is_none() {
            bail!("Unknown category: {}", slug);
        }
    }
    catalog.categories.retain(|c| wanted.contains(&c.slug));
    Ok(())
}

pub struct Walker<'a> {
    catalog: &'a Catalog,
    store: &'a SiteStore,
    renderer: &'a SiteRenderer,
    extractor: Extractor,
    fetcher: HttpFetcher,
}

impl<'a> Walker<'a> {
    pub fn new(
        catalog: &'a Catalog,
        store: &'a SiteStore,
        renderer: &'a SiteRenderer,
        fetcher: HttpFetcher,
    ) -> Result<Self> {
        Ok(Self {
            catalog,
            store,
            renderer,
            extractor: Extractor::new()?,
            fetcher,
        })
    }

    /// Walk every catalog entry, then write the category files and a
    /// freshly built summary.json.
    pub async fn run(mut self) -> Result<WalkReport> {
        let mut systems = BTreeMap::new();
        let mut ok = 0;
        let mut failures = Vec::new();

        let catalog = self.catalog;
        info!("Scraping {} pages from {}", catalog.entries().len(), catalog.base_url);

        for spec in &catalog.categories {
            info!(category = %spec.slug, "Scraping {}", spec.name);
            let data = self.walk_category(spec, &mut ok, &mut failures).await;

            if let Err(e) = self.store.write_category(&data).await {
                error!(category = %spec.slug, "Failed to write category file: {:#}", e);
            }
            systems.insert(spec.slug.clone(), data);
        }

        let summary = SummaryIndex {
            last_updated: Utc::now().to_rfc3339(),
            systems,
        };
        self.store
            .write_summary(&summary)
            .await
            .context("Failed to write summary.json")?;

        Ok(WalkReport {
            ok,
            failed: failures.len(),
            failures,
            summary,
        })
    }

    async fn walk_category(
        &mut self,
        spec: &CategorySpec,
        ok: &mut usize,
        failures: &mut Vec<ItemFailure>,
    ) -> CategoryData {
        let mut data = CategoryData::new(&spec.slug, &spec.name);

        for subtype in &spec.subtypes {
            let entry = CatalogEntry {
                category: spec.slug.clone(),
                subtype: subtype.clone(),
                source_url: self.catalog.source_url(&spec.slug, subtype),
            };

            match self.process(&entry, &spec.name).await {
                Ok(record) => {
                    info!(
                        category = %entry.category,
                        subtype = %entry.subtype,
                        versions = record.versions.len(),
                        downloads = record.download_count(),
                        "scraped"
                    );
                    data.subtypes.insert(subtype.clone(), record);
                    *ok += 1;
                }
                Err(e) => {
                    warn!(
                        category = %entry.category,
                        subtype = %entry.subtype,
                        url = %entry.source_url,
                        "Failed to scrape: {:#}",
                        e
                    );
                    failures.push(ItemFailure {
                        category: entry.category,
                        subtype: entry.subtype,
                        url: entry.source_url,
                        error: format!("{:#}", e),
                    });
                }
            }
        }

        data
    }

    /// Fetch, extract and persist one page
    async fn process(&mut self, entry: &CatalogEntry, category_name: &str) -> Result<PageRecord> {
        let html = self
            .fetcher
            .fetch_text(&entry.source_url)
            .await
            .context("fetch failed")?;

        let mut record = self
            .extractor
            .extract(&html, &entry.source_url)
            .context("extraction failed")?;

        if record.has_placeholder_title() {
            record.title = format!("{} {}", category_name, entry.subtype);
        }

        if let Some(image_url) = record.image_url.clone() {
            record.image_path = self.save_image(entry, &image_url).await;
        }

        let detail = self.renderer.render_detail(&record)?;
        self.store.write_item(entry, &record, &detail).await?;

        Ok(record)
    }

    /// Download the hero image; failures only cost the image
    async fn save_image(&mut self, entry: &CatalogEntry, url: &str) -> Option<String> {
        let bytes = match self.fetcher.fetch_bytes(url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %url, "Failed to download image: {}", e);
                return None;
            }
        };

        let name = image_file_name(url, &entry.subtype);
        match self.store.write_image(entry, &name, &bytes).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(url = %url, "Failed to save image: {:#}", e);
                None
            }
        }
    }
}

/// Last URL path segment when it is a plain file name, else `{subtype}.jpg`
fn image_file_name(url: &str, subtype: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| {
            !name.is_empty()
                && !name.starts_with('.')
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        })
        .unwrap_or_else(|| format!("{}.jpg", subtype))
}
