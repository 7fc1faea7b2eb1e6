//! HTML rendering for the index, detail and legacy pages
//!
//! Templates are compiled into the binary and rendered with Tera.
//! Autoescaping is on for every template, so scraped text is never
//! interpolated raw.

use crate::catalog::Catalog;
use crate::schema::{LinkKind, PageRecord, SummaryIndex};
use crate::store::{DATA_DIR, DETAIL_FILE};
use anyhow::{Context, Result};
use serde::Serialize;
use tera::{Context as TContext, Tera};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const DETAIL_TEMPLATE: &str = include_str!("../templates/detail.html");
const LEGACY_TEMPLATE: &str = include_str!("../templates/legacy_index.html");

const SNIPPET_CHARS: usize = 100;

pub struct SiteRenderer {
    tera: Tera,
}

#[derive(Debug, Serialize)]
struct IndexView {
    last_updated: String,
    total: usize,
    sections: Vec<SectionView>,
}

#[derive(Debug, Serialize)]
struct SectionView {
    slug: String,
    name: String,
    icon: String,
    cards: Vec<CardView>,
}

#[derive(Debug, Serialize)]
struct CardView {
    /// Derived from the local path, e.g. "Win11 24H2"
    title: String,
    page_title: String,
    href: String,
    url: String,
    path: String,
    image: Option<String>,
    link_count: usize,
    snippet: String,
    intro: String,
    /// Version labels, attributes and download URLs for the details search scope
    details: String,
}

#[derive(Debug, Serialize)]
struct DetailView<'a> {
    title: &'a str,
    image: Option<&'a str>,
    release_info: &'a str,
    version_info: &'a str,
    intro_text: &'a str,
    source_url: &'a str,
    link_count: usize,
    versions: Vec<VersionView<'a>>,
}

#[derive(Debug, Serialize)]
struct VersionView<'a> {
    version_text: &'a str,
    attributes: &'a [String],
    downloads: Vec<DownloadView<'a>>,
}

#[derive(Debug, Serialize)]
struct DownloadView<'a> {
    label: &'a str,
    url: &'a str,
    kind: LinkKind,
}

/// One group of the legacy single-page index
#[derive(Debug, Clone, Serialize)]
pub struct LegacyGroup {
    pub name: String,
    pub items: Vec<LegacyItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LegacyItem {
    pub title: String,
    pub url: String,
    pub href: String,
}

impl SiteRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("index.html", INDEX_TEMPLATE),
            ("detail.html", DETAIL_TEMPLATE),
            ("legacy_index.html", LEGACY_TEMPLATE),
        ])
        .context("Failed to compile templates")?;
        tera.autoescape_on(vec![".html"]);
        tera.set_escape_fn(escape_text);
        Ok(Self { tera })
    }

    /// Index page: one section per non-empty category, in catalog order
    pub fn render_index(&self, summary: &SummaryIndex, catalog: &Catalog) -> Result<String> {
        let mut categories: Vec<_> = summary
            .systems
            .values()
            .filter(|c| !c.subtypes.is_empty())
            .collect();
        categories.sort_by(|a, b| {
            (catalog.display_rank(&a.slug), &a.slug).cmp(&(catalog.display_rank(&b.slug), &b.slug))
        });

        let sections: Vec<SectionView> = categories
            .into_iter()
            .map(|cat| {
                let spec = catalog.category(&cat.slug);
                let rank = |sub: &str| {
                    spec.and_then(|s| s.subtypes.iter().position(|x| x == sub))
                        .unwrap_or(usize::MAX)
                };

                let mut subtypes: Vec<_> = cat.subtypes.iter().collect();
                subtypes.sort_by(|(a, _), (b, _)| (rank(a), *a).cmp(&(rank(b), *b)));

                SectionView {
                    slug: cat.slug.clone(),
                    name: cat.name.clone(),
                    icon: spec
                        .and_then(|s| s.icon.clone())
                        .unwrap_or_else(|| "fas fa-cube".to_string()),
                    cards: subtypes
                        .into_iter()
                        .map(|(sub, record)| card(catalog, &cat.slug, sub, record))
                        .collect(),
                }
            })
            .collect();

        let view = IndexView {
            last_updated: summary.last_updated.clone(),
            total: sections.iter().map(|s| s.cards.len()).sum(),
            sections,
        };
        self.render("index.html", &view)
    }

    /// Detail page for one scraped record
    pub fn render_detail(&self, record: &PageRecord) -> Result<String> {
        let view = DetailView {
            title: &record.title,
            image: record.image_path.as_deref(),
            release_info: &record.release_info,
            version_info: &record.version_info,
            intro_text: &record.intro_text,
            source_url: &record.url,
            link_count: record.download_count(),
            versions: record
                .versions
                .iter()
                .map(|v| VersionView {
                    version_text: &v.version_text,
                    attributes: &v.attributes,
                    downloads: v
                        .downloads
                        .iter()
                        .map(|d| DownloadView {
                            label: &d.download_type,
                            url: &d.download_url,
                            kind: d.kind(),
                        })
                        .collect(),
                })
                .collect(),
        };
        self.render("detail.html", &view)
    }

    pub fn render_legacy_index(&self, groups: &[LegacyGroup]) -> Result<String> {
        let mut ctx = TContext::new();
        ctx.insert("groups", groups);
        ctx.insert("total", &groups.iter().map(|g| g.items.len()).sum::<usize>());
        self.tera
            .render("legacy_index.html", &ctx)
            .context("Failed to render legacy_index.html")
    }

    fn render<T: Serialize>(&self, template: &str, view: &T) -> Result<String> {
        let ctx = TContext::from_serialize(view)
            .with_context(|| format!("Failed to build context for {}", template))?;
        self.tera
            .render(template, &ctx)
            .with_context(|| format!("Failed to render {}", template))
    }
}

fn card(catalog: &Catalog, category: &str, subtype: &str, record: &PageRecord) -> CardView {
    let path = if record.url.is_empty() {
        format!("{}/{}", category, subtype)
    } else {
        catalog.local_path(&record.url)
    };
    let item_dir = format!("{}/{}/{}", DATA_DIR, category, subtype);

    let intro = if record.intro_text.is_empty() {
        &record.release_info
    } else {
        &record.intro_text
    };

    let details = record
        .versions
        .iter()
        .flat_map(|v| {
            std::iter::once(v.version_text.as_str())
                .chain(v.attributes.iter().map(String::as_str))
                .chain(v.downloads.iter().map(|d| d.download_url.as_str()))
        })
        .collect::<Vec<_>>()
        .join(" ");

    CardView {
        title: derived_title(&path),
        page_title: record.title.clone(),
        href: format!("{}/{}", item_dir, DETAIL_FILE),
        url: record.url.clone(),
        image: record
            .image_path
            .as_ref()
            .map(|p| format!("{}/{}", item_dir, p)),
        path,
        link_count: record.download_count(),
        snippet: snippet(intro, SNIPPET_CHARS),
        intro: intro.clone(),
        details,
    }
}

/// Card title: last path segment, hyphens to spaces, title-cased
pub fn derived_title(local_path: &str) -> String {
    let segment = local_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(local_path);
    title_case(&segment.replace('-', " "))
}

/// Uppercase a letter that follows a non-letter, lowercase the rest
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// HTML escaping for both text and quoted attribute contexts
pub fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CategoryData, DownloadEntry, VersionBlock};
    use std::collections::BTreeMap;

    fn record(url: &str, downloads: &[&str]) -> PageRecord {
        PageRecord {
            title: "Windows 11 24H2".to_string(),
            intro_text: "Latest release".to_string(),
            release_info: "Released 2024".to_string(),
            version_info: String::new(),
            image_url: None,
            image_path: None,
            url: url.to_string(),
            versions: vec![VersionBlock {
                version_text: "24H2 (Build 26100)".to_string(),
                attributes: vec!["size: 5.4GB".to_string()],
                downloads: downloads
                    .iter()
                    .map(|u| DownloadEntry {
                        download_type: "x64".to_string(),
                        download_url: u.to_string(),
                    })
                    .collect(),
            }],
        }
    }

    fn summary(records: Vec<(&str, &str, PageRecord)>) -> SummaryIndex {
        let mut systems: BTreeMap<String, CategoryData> = BTreeMap::new();
        for (cat, sub, rec) in records {
            systems
                .entry(cat.to_string())
                .or_insert_with(|| CategoryData::new(cat, cat))
                .subtypes
                .insert(sub.to_string(), rec);
        }
        SummaryIndex {
            last_updated: "2025-01-01T00:00:00+00:00".to_string(),
            systems,
        }
    }

    #[test]
    fn test_detail_http_download() {
        let r = SiteRenderer::new().unwrap();
        let html = r
            .render_detail(&record("https://www.imsdn.cn/windows-11/win11-24h2/", &["https://example.com/win11.iso"]))
            .unwrap();
        assert!(html.contains(r#"data-action="open""#));
        assert!(html.contains(r#"href="https://example.com/win11.iso""#));
        assert!(html.contains(r#"data-action="copy""#));
        assert!(!html.contains(r#"data-action="copy-ed2k""#));
    }

    #[test]
    fn test_detail_ed2k_download() {
        let r = SiteRenderer::new().unwrap();
        let html = r
            .render_detail(&record("", &["ed2k://|file|win11.iso|1|AB|/"]))
            .unwrap();
        assert!(html.contains(r#"data-action="copy-ed2k""#));
        assert!(!html.contains(r#"data-action="open""#));
    }

    #[test]
    fn test_detail_other_scheme_gets_copy_only() {
        let r = SiteRenderer::new().unwrap();
        let html = r
            .render_detail(&record("", &["magnet:?xt=urn:btih:abc"]))
            .unwrap();
        assert!(html.contains(r#"data-action="copy""#));
        assert!(!html.contains(r#"data-action="open""#));
        assert!(!html.contains(r#"data-action="copy-ed2k""#));
    }

    #[test]
    fn test_detail_escapes_scraped_text() {
        let r = SiteRenderer::new().unwrap();
        let mut rec = record("", &["https://example.com/a.iso\"><script>x</script>"]);
        rec.title = "<script>alert(1)</script>".to_string();
        rec.versions[0].attributes = vec!["<img src=x onerror=y>".to_string()];
        let html = r.render_detail(&rec).unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<img src=x"));
        assert!(!html.contains("<script>x</script>"));
    }

    #[test]
    fn test_index_card_links_to_detail() {
        let r = SiteRenderer::new().unwrap();
        let catalog = Catalog::builtin().unwrap();
        let s = summary(vec![(
            "windows-11",
            "win11-24h2",
            record("https://www.imsdn.cn/windows-11/win11-24h2/", &["https://example.com/win11.iso"]),
        )]);
        let html = r.render_index(&s, &catalog).unwrap();
        assert!(html.contains(r#"href="data/windows-11/win11-24h2/detail.html""#));
        assert!(html.contains("Win11 24H2"));
        assert_eq!(html.matches(r#"class="category-section""#).count(), 1);
        assert_eq!(html.matches("item-card\"").count(), 1);
    }

    #[test]
    fn test_index_respects_catalog_order() {
        let r = SiteRenderer::new().unwrap();
        let catalog = Catalog::builtin().unwrap();
        let s = summary(vec![
            ("servers", "sql-server-2019", record("https://www.imsdn.cn/servers/sql-server-2019/", &[])),
            ("windows-11", "win11-24h2", record("https://www.imsdn.cn/windows-11/win11-24h2/", &[])),
        ]);
        let html = r.render_index(&s, &catalog).unwrap();
        let win = html.find(r#"id="cat-windows-11""#).unwrap();
        let sql = html.find(r#"id="cat-servers""#).unwrap();
        assert!(win < sql);
    }

    #[test]
    fn test_index_with_no_entries() {
        let r = SiteRenderer::new().unwrap();
        let catalog = Catalog::builtin().unwrap();
        let mut s = summary(vec![]);
        s.systems
            .insert("windows-10".to_string(), CategoryData::new("windows-10", "Windows 10"));
        let html = r.render_index(&s, &catalog).unwrap();
        assert_eq!(html.matches(r#"class="category-section""#).count(), 0);
        assert!(html.contains(r#"id="noResults""#));
    }

    #[test]
    fn test_legacy_index() {
        let r = SiteRenderer::new().unwrap();
        let groups = vec![LegacyGroup {
            name: "Office 系列".to_string(),
            items: vec![LegacyItem {
                title: "Office 2024".to_string(),
                url: "https://www.imsdn.cn/applications/office-2024/".to_string(),
                href: "applications/office-2024/index.html".to_string(),
            }],
        }];
        let html = r.render_legacy_index(&groups).unwrap();
        assert!(html.contains(r#"href="applications/office-2024/index.html""#));
        assert!(html.contains("Office 系列"));
    }

    #[test]
    fn test_derived_title() {
        assert_eq!(derived_title("windows-11/win11-24h2"), "Win11 24H2");
        assert_eq!(
            derived_title("windows-server/windows-server-2012-r2"),
            "Windows Server 2012 R2"
        );
        assert_eq!(derived_title("applications/office-2024/"), "Office 2024");
    }

    #[test]
    fn test_snippet() {
        assert_eq!(snippet("short", 10), "short");
        assert_eq!(snippet("中文字符超过限制", 4), "中文字符...");
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(
            escape_text(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
        assert_eq!(escape_text("https://example.com/a"), "https://example.com/a");
    }
}
