//! render and build commands: turn the data tree into the site
//!
//! `render` only reads what `scrape` wrote; `build` runs both and can
//! publish the result in one go.

use crate::catalog::{is_valid_slug, Catalog, CatalogEntry};
use crate::publish::{publish_site, PublishReport};
use crate::render::SiteRenderer;
use crate::store::SiteStore;
use crate::walker::{load_catalog, scrape, ScrapeArgs, WalkReport};
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Args)]
pub struct RenderArgs {
    /// Catalog YAML file (default: built-in catalog)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Site directory containing data/summary.json
    #[arg(long, default_value = "site")]
    pub site: PathBuf,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub scrape: ScrapeArgs,

    /// Mirror the finished site into this directory
    #[arg(long, value_name = "DIR")]
    pub publish: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize)]
pub struct RenderReport {
    pub sections: usize,
    pub items: usize,
    pub details: usize,
    pub assets: usize,
}

#[derive(Debug, Serialize)]
pub struct BuildReport {
    pub scrape: WalkReport,
    pub render: RenderReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<PublishReport>,
}

pub async fn run_render(args: RenderArgs) -> Result<()> {
    let catalog = Catalog::load(args.catalog.as_deref()).await?;
    let store = SiteStore::new(&args.site);

    let report = render_site(&catalog, &store).await?;
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

pub async fn run_build(args: BuildArgs) -> Result<()> {
    let catalog = load_catalog(&args.scrape).await?;
    let store = SiteStore::new(&args.scrape.out);

    let scrape_report = scrape(&catalog, &store).await?;
    let render_report = render_site(&catalog, &store).await?;
    let publish_report = match args.publish {
        Some(dest) => Some(publish_site(store.site_dir().to_path_buf(), dest).await?),
        None => None,
    };

    let report = BuildReport {
        scrape: scrape_report,
        render: render_report,
        publish: publish_report,
    };
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

/// Write index.html, refresh every detail page, the static assets and CNAME
/// from the stored summary.
pub async fn render_site(catalog: &Catalog, store: &SiteStore) -> Result<RenderReport> {
    let renderer = SiteRenderer::new()?;
    let summary = store.load_summary().await?;

    let index = renderer.render_index(&summary, catalog)?;
    store.write_index(&index).await?;

    let mut report = RenderReport {
        sections: summary
            .systems
            .values()
            .filter(|c| !c.subtypes.is_empty())
            .count(),
        items: summary.total_items(),
        ..Default::default()
    };

    for (category, data) in &summary.systems {
        for (subtype, record) in &data.subtypes {
            if !is_valid_slug(category) || !is_valid_slug(subtype) {
                warn!(category = %category, subtype = %subtype, "Skipping entry with unsafe path");
                continue;
            }
            let entry = CatalogEntry {
                category: category.clone(),
                subtype: subtype.clone(),
                source_url: record.url.clone(),
            };
            let detail = renderer.render_detail(record)?;
            store.write_detail(&entry, &detail).await?;
            report.details += 1;
        }
    }

    report.assets = store.write_static_assets().await?;
    store.write_cname(&catalog.hostname).await?;

    info!(
        "Rendered {} items in {} sections into {}",
        report.items,
        report.sections,
        store.site_dir().display()
    );
    Ok(report)
}
