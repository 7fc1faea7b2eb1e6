//! msdn-mirror CLI
//!
//! Mirrors the imsdn.cn download catalog into a static site.
//! Logs go to stderr, the JSON report of each command to stdout.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use msdn_mirror::generate::{run_build, run_render, BuildArgs, RenderArgs};
use msdn_mirror::legacy::{run_index_list, IndexListArgs};
use msdn_mirror::publish::{run_publish, PublishArgs};
use msdn_mirror::walker::{run_scrape, ScrapeArgs};

#[derive(Parser)]
#[command(name = "msdn-mirror")]
#[command(version)]
#[command(about = "Static mirror of the imsdn.cn Microsoft download catalog")]
#[command(long_about = "Scrapes Windows, Office and SQL Server download pages and renders a searchable static site.\n\nCommands:\n  scrape       Fetch catalog pages into site/data\n  render       Build index.html and detail pages\n  publish      Copy the site into a deploy directory\n  build        scrape + render (+ publish)\n  index-list   Single-page index from a URL list")]
struct Cli {
    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every catalog page and write data.json, detail.html and summary.json
    Scrape(ScrapeArgs),
    /// Render index.html and detail pages from site/data
    Render(RenderArgs),
    /// Mirror the generated site into a destination directory
    Publish(PublishArgs),
    /// Scrape, render and optionally publish
    Build(BuildArgs),
    /// Build a grouped single-page index from a file of URLs
    IndexList(IndexListArgs),
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scrape(args) => run_scrape(args).await,
        Commands::Render(args) => run_render(args).await,
        Commands::Publish(args) => run_publish(args).await,
        Commands::Build(args) => run_build(args).await,
        Commands::IndexList(args) => run_index_list(args).await,
    }
}
