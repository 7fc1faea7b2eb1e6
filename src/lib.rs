//! msdn-mirror: static mirror of the imsdn.cn Microsoft download catalog
//!
//! Commands:
//! - scrape: fetch every catalog page and write the data tree
//! - render: build index.html and detail pages from stored data
//! - publish: copy the generated site into a deploy directory
//! - build: scrape, render and optionally publish in one run
//! - index-list: single-page index from a plain URL list

pub mod catalog;
pub mod extract;
pub mod fetch;
pub mod generate;
pub mod legacy;
pub mod publish;
pub mod render;
pub mod schema;
pub mod store;
pub mod walker;

pub use catalog::{Catalog, CatalogEntry, CatalogError};
pub use extract::{ExtractError, Extractor};
pub use fetch::{FetchError, HttpFetcher};
pub use generate::{render_site, RenderReport};
pub use publish::{publish, publish_site, PublishReport};
pub use render::SiteRenderer;
pub use schema::{CategoryData, DownloadEntry, LinkKind, PageRecord, SummaryIndex, VersionBlock};
pub use store::SiteStore;
pub use walker::{scrape, ItemFailure, WalkReport};
