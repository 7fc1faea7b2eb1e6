//! index-list command: single-page index built from a plain URL list
//!
//! Reads any text file, pulls out every http(s) URL, groups them by a fixed
//! keyword table and writes one self-contained HTML page.

use crate::catalog::Catalog;
use crate::render::{derived_title, LegacyGroup, LegacyItem, SiteRenderer};
use anyhow::{Context, Result};
use clap::Args;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

/// Keyword to group name; the first matching keyword wins and groups are
/// shown in this order.
const GROUPS: &[(&str, &str)] = &[
    ("applications/office", "Office 系列"),
    ("operating-systems/windows", "Windows 早期版本"),
    ("servers/sql-server", "SQL Server 系列"),
    ("windows-10/win10", "Windows 10 系列"),
    ("windows-11/win11", "Windows 11 系列"),
    ("windows-server/windows-server", "Windows Server 系列"),
];

#[derive(Args)]
pub struct IndexListArgs {
    /// Text file with one page URL per line
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Output HTML file
    #[arg(short, long, default_value = "site/data/index.html")]
    pub out: PathBuf,

    /// Catalog YAML file, used for its host prefixes (default: built-in catalog)
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct IndexListReport {
    pub file: String,
    pub urls: usize,
    pub listed: usize,
    pub groups: usize,
}

pub async fn run_index_list(args: IndexListArgs) -> Result<()> {
    let catalog = Catalog::load(args.catalog.as_deref()).await?;
    let content = fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read URL list: {}", args.file.display()))?;

    let urls = extract_urls(&content)?;
    let groups = group_urls(&urls, &catalog);
    let listed = groups.iter().map(|g| g.items.len()).sum();

    let html = SiteRenderer::new()?.render_legacy_index(&groups)?;
    if let Some(parent) = args.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&args.out, html)
        .await
        .with_context(|| format!("Failed to write {}", args.out.display()))?;
    info!("Index written to {}", args.out.display());

    let report = IndexListReport {
        file: args.out.display().to_string(),
        urls: urls.len(),
        listed,
        groups: groups.len(),
    };
    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

/// Unique http(s) URLs in order of first appearance
pub fn extract_urls(content: &str) -> Result<Vec<String>> {
    let re = Regex::new(r#"https?://[^\s\)>\]"'`<]+"#)?;

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for mat in re.find_iter(content) {
        let url = mat
            .as_str()
            .trim_end_matches(|c| matches!(c, ',' | '.' | ')' | ']' | ';' | ':'));
        if seen.insert(url.to_string()) {
            urls.push(url.to_string());
        }
    }

    Ok(urls)
}

/// Bucket URLs by keyword. URLs matching no keyword are dropped and empty
/// groups are left out.
pub fn group_urls(urls: &[String], catalog: &Catalog) -> Vec<LegacyGroup> {
    let mut groups: Vec<LegacyGroup> = GROUPS
        .iter()
        .map(|(_, name)| LegacyGroup {
            name: name.to_string(),
            items: Vec::new(),
        })
        .collect();

    for url in urls {
        let Some(idx) = GROUPS.iter().position(|(kw, _)| url.contains(kw)) else {
            debug!(url = %url, "no group");
            continue;
        };
        let path = catalog.local_path(url);
        groups[idx].items.push(LegacyItem {
            title: derived_title(&path),
            url: url.clone(),
            href: format!("{}/index.html", path),
        });
    }

    groups.retain(|g| !g.items.is_empty());
    groups
}
