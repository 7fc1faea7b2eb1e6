//! Page extraction: download-page markup → [`PageRecord`]
//!
//! The source pages are built with a page-builder theme, so the structural
//! markers are CSS classes from that theme. Missing markers degrade to
//! placeholders; only an empty document is a hard failure.

use crate::schema::{DownloadEntry, PageRecord, VersionBlock, DEFAULT_DOWNLOAD_TYPE, UNKNOWN_TITLE};
use anyhow::{anyhow, Result};
use scraper::{ElementRef, Html, Node, Selector};
use thiserror::Error;
use url::Url;

const TITLE: &str = "h1";
const CONTENT: &str = ".sppb-addon-content";
const SECTION: &str = "section";
const VERSION_HEADING: &str = "h3";
const LABEL: &str = "strong";
const IMAGE: &str = ".sppb-addon-single-image-container img";
const DOWNLOAD_CLASS: &str = "dl-link";

/// Label text echoed in the markup next to every download box
const BOILERPLATE: [&str; 2] = ["迅雷下载", "thunder download"];

/// Download boxes pointing here are official landing pages, not images
const SKIPPED_HOST: &str = "microsoft.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("document is empty")]
    EmptyDocument,
}

/// Compiled selectors for the download-page layout
pub struct Extractor {
    title: Selector,
    content: Selector,
    section: Selector,
    heading: Selector,
    label: Selector,
    image: Selector,
}

impl Extractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            title: selector(TITLE)?,
            content: selector(CONTENT)?,
            section: selector(SECTION)?,
            heading: selector(VERSION_HEADING)?,
            label: selector(LABEL)?,
            image: selector(IMAGE)?,
        })
    }

    /// Parse one page. `url` is the page's own address, used to resolve
    /// relative image sources.
    pub fn extract(&self, html: &str, url: &str) -> Result<PageRecord, ExtractError> {
        if html.trim().is_empty() {
            return Err(ExtractError::EmptyDocument);
        }

        let doc = Html::parse_document(html);

        let title_el = doc.select(&self.title).next();
        let title = title_el
            .map(text_of)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.to_string());

        let containers: Vec<ElementRef> = doc.select(&self.content).collect();
        let intro = match title_el {
            Some(t) => self.container_after(&doc, t),
            None => containers.first().copied(),
        };

        let image_url = doc
            .select(&self.image)
            .next()
            .and_then(|img| img.value().attr("src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(|src| resolve(url, src));

        let versions = doc
            .select(&self.section)
            .filter(|s| is_leaf_section(*s))
            .filter_map(|s| self.version_block(s))
            .collect();

        Ok(PageRecord {
            title,
            intro_text: intro.map(text_of).unwrap_or_default(),
            release_info: containers.first().map(|c| text_of(*c)).unwrap_or_default(),
            version_info: containers.get(1).map(|c| text_of(*c)).unwrap_or_default(),
            image_url,
            image_path: None,
            url: url.to_string(),
            versions,
        })
    }

    /// First content container that follows `title` in document order
    fn container_after<'a>(&self, doc: &'a Html, title: ElementRef<'a>) -> Option<ElementRef<'a>> {
        let mut passed = false;
        for node in doc.root_element().descendants() {
            if node.id() == title.id() {
                passed = true;
                continue;
            }
            if !passed {
                continue;
            }
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };
            if self.content.matches(&el) && !node.ancestors().any(|a| a.id() == title.id()) {
                return Some(el);
            }
        }
        None
    }

    fn version_block(&self, section: ElementRef) -> Option<VersionBlock> {
        let heading = section.select(&self.heading).next()?;
        let version_text = text_of(heading);
        if version_text.is_empty() {
            return None;
        }

        let block = VersionBlock {
            version_text,
            attributes: self.attributes_after(heading),
            downloads: self.downloads_in(section),
        };

        (!block.is_empty()).then_some(block)
    }

    /// Text of the siblings between a version heading and the next one
    fn attributes_after(&self, heading: ElementRef) -> Vec<String> {
        let mut attributes = Vec::new();

        for node in heading.next_siblings() {
            match node.value() {
                Node::Element(_) => {
                    let Some(el) = ElementRef::wrap(node) else {
                        continue;
                    };
                    if el.value().name() == VERSION_HEADING
                        || el.select(&self.heading).next().is_some()
                    {
                        break;
                    }
                    if holds_download(el) || self.is_label(el) {
                        continue;
                    }
                    push_attribute(&mut attributes, text_of(el));
                }
                Node::Text(text) => push_attribute(&mut attributes, normalize(text)),
                _ => {}
            }
        }

        attributes
    }

    /// Single pass over the section: every download box takes the most
    /// recent label seen in the same section.
    fn downloads_in(&self, section: ElementRef) -> Vec<DownloadEntry> {
        let mut label: Option<String> = None;
        let mut downloads = Vec::new();

        for node in section.descendants() {
            let Some(el) = ElementRef::wrap(node) else {
                continue;
            };

            if el.value().name() == LABEL {
                if inside_download(el) {
                    continue;
                }
                let text = text_of(el);
                if !text.is_empty() && !is_boilerplate(&text) {
                    label = Some(text);
                }
            } else if is_download(el) {
                let url: String = el.text().map(str::trim).collect();
                if url.is_empty() || url.to_lowercase().contains(SKIPPED_HOST) {
                    continue;
                }
                downloads.push(DownloadEntry {
                    download_type: label
                        .clone()
                        .unwrap_or_else(|| DEFAULT_DOWNLOAD_TYPE.to_string()),
                    download_url: url,
                });
            }
        }

        downloads
    }

    /// A node whose whole text is its `<strong>` label
    fn is_label(&self, el: ElementRef) -> bool {
        if el.value().name() == LABEL {
            return true;
        }
        let labels: Vec<String> = el.select(&self.label).map(text_of).collect();
        !labels.is_empty() && labels.join(" ") == text_of(el)
    }
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector {}: {}", css, e))
}

/// Element text with whitespace runs collapsed to single spaces
fn text_of(el: ElementRef) -> String {
    normalize(&el.text().collect::<Vec<_>>().join(" "))
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_attribute(attributes: &mut Vec<String>, text: String) {
    if !text.is_empty() && !is_boilerplate(&text) {
        attributes.push(text);
    }
}

fn is_boilerplate(text: &str) -> bool {
    let trimmed = text
        .trim()
        .trim_end_matches([':', '：'])
        .trim()
        .to_lowercase();
    BOILERPLATE.contains(&trimmed.as_str())
}

fn is_download(el: ElementRef) -> bool {
    el.value().classes().any(|c| c == DOWNLOAD_CLASS)
}

fn holds_download(el: ElementRef) -> bool {
    el.descendants()
        .filter_map(ElementRef::wrap)
        .any(is_download)
}

fn inside_download(el: ElementRef) -> bool {
    el.ancestors().filter_map(ElementRef::wrap).any(is_download)
}

/// Sections that wrap other sections are layout, not version blocks
fn is_leaf_section(section: ElementRef) -> bool {
    !section
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| e.value().name() == SECTION)
}

fn resolve(base: &str, src: &str) -> String {
    Url::parse(base)
        .and_then(|b| b.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.to_string())
}
