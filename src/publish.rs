//! publish command: mirror the generated site into a destination directory
//!
//! `data/` and `static/` are removed and copied fresh so nothing from a
//! previous catalog survives; `index.html` and `CNAME` are overwritten.

use crate::store::{CNAME_FILE, DATA_DIR, INDEX_FILE, STATIC_DIR};
use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

#[derive(Args)]
pub struct PublishArgs {
    /// Destination directory (e.g. the repository root served by the static host)
    #[arg(value_name = "DEST")]
    pub dest: PathBuf,

    /// Generated site directory
    #[arg(long, default_value = "site")]
    pub site: PathBuf,
}

#[derive(Debug, Default, Serialize)]
pub struct PublishReport {
    pub dest: String,
    pub copied: usize,
    pub failed: usize,
}

pub async fn run_publish(args: PublishArgs) -> Result<()> {
    let report = publish_site(args.site, args.dest).await?;
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}

/// [`publish`] on the blocking thread pool
pub async fn publish_site(site: PathBuf, dest: PathBuf) -> Result<PublishReport> {
    tokio::task::spawn_blocking(move || publish(&site, &dest))
        .await
        .context("Publish task panicked")?
}

/// Mirror `site` into `dest`
pub fn publish(site: &Path, dest: &Path) -> Result<PublishReport> {
    if !site.is_dir() {
        bail!("Site directory not found: {}", site.display());
    }
    check_overlap(site, dest)?;
    fs::create_dir_all(dest).with_context(|| format!("Failed to create {}", dest.display()))?;

    let mut report = PublishReport {
        dest: dest.display().to_string(),
        ..Default::default()
    };

    for dir in [DATA_DIR, STATIC_DIR] {
        let src = site.join(dir);
        if !src.is_dir() {
            warn!("Nothing to publish for {}/", dir);
            continue;
        }
        let target = dest.join(dir);
        if target.exists() {
            fs::remove_dir_all(&target)
                .with_context(|| format!("Failed to remove {}", target.display()))?;
        }
        mirror_dir(&src, &target, &mut report)?;
        info!("{}/ published", dir);
    }

    for file in [INDEX_FILE, CNAME_FILE] {
        let src = site.join(file);
        if !src.is_file() {
            continue;
        }
        tally(&mut report, copy_with_retry(&src, &dest.join(file)));
    }

    Ok(report)
}

/// Refuse layouts where replacing a destination directory would delete or
/// recurse into its own source: `dest` equal to `site`, or a mirrored
/// directory nested in its counterpart.
fn check_overlap(site: &Path, dest: &Path) -> Result<()> {
    let site = resolve(site)?;
    let dest = resolve(dest)?;

    if site == dest {
        bail!("Destination is the site directory itself: {}", dest.display());
    }
    for dir in [DATA_DIR, STATIC_DIR] {
        let src = site.join(dir);
        let target = dest.join(dir);
        if target.starts_with(&src) || src.starts_with(&target) {
            bail!(
                "Destination {} overlaps site directory {}",
                dest.display(),
                site.display()
            );
        }
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet: canonicalize the
/// nearest existing ancestor and re-append the rest.
fn resolve(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve {}", path.display()))?;

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_owned());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", existing.display()))?;
    resolved.extend(rest.iter().rev());
    Ok(resolved)
}

fn mirror_dir(src: &Path, dest: &Path, report: &mut PublishReport) -> Result<()> {
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            tally(report, copy_with_retry(entry.path(), &target));
        }
    }
    Ok(())
}

fn tally(report: &mut PublishReport, ok: bool) {
    if ok {
        report.copied += 1;
    } else {
        report.failed += 1;
    }
}

/// Copy a file; on a permission error delete the target and try once more.
fn copy_with_retry(src: &Path, dest: &Path) -> bool {
    let err = match fs::copy(src, dest) {
        Ok(_) => return true,
        Err(e) => e,
    };

    if err.kind() == io::ErrorKind::PermissionDenied {
        let _ = fs::remove_file(dest);
        match fs::copy(src, dest) {
            Ok(_) => return true,
            Err(e) => warn!(file = %dest.display(), error = %e, "copy failed after retry"),
        }
    } else {
        error!(file = %dest.display(), error = %err, "copy failed");
    }
    false
}
