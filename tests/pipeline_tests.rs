//! End-to-end scrape/render runs against a local mock of the download site

use msdn_mirror::{publish, render_site, scrape, Catalog, PageRecord, SiteStore};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WIN11_PAGE: &str = include_str!("fixtures/win11-24h2.html");

fn catalog_for(server: &MockServer, timeout_secs: u64, subtypes: &[&str]) -> Catalog {
    let yaml = format!(
        "base_url: {}\n\
         hostname: windows.unblock.win\n\
         fetch:\n  delay_secs: 0\n\
         categories:\n  - slug: windows-11\n    name: Windows 11\n    subtypes: [{}]\n",
        server.uri(),
        subtypes.join(", ")
    );
    let mut catalog = Catalog::from_yaml(&yaml).unwrap();
    // below the accepted config range, to keep the timeout case fast
    catalog.fetch.timeout_secs = timeout_secs;
    catalog
}

async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_image(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/images/win11.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
        .mount(server)
        .await;
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn summary_without_timestamp(site: &Path) -> serde_json::Value {
    let mut value: serde_json::Value =
        serde_json::from_str(&read(&site.join("data/summary.json"))).unwrap();
    value.as_object_mut().unwrap().remove("last_updated");
    value
}

#[tokio::test]
async fn test_scrape_and_render_single_page() {
    let server = MockServer::start().await;
    mount_page(&server, "/windows-11/win11-24h2/", WIN11_PAGE).await;
    mount_image(&server).await;

    let site = tempdir().unwrap();
    let store = SiteStore::new(site.path());
    let catalog = catalog_for(&server, 5, &["win11-24h2"]);

    let report = scrape(&catalog, &store).await.unwrap();
    assert_eq!(report.ok, 1);
    assert_eq!(report.failed, 0);

    let item_dir = site.path().join("data/windows-11/win11-24h2");
    let record: PageRecord = serde_json::from_str(&read(&item_dir.join("data.json"))).unwrap();
    assert_eq!(record.title, "Windows 11 24H2");
    assert_eq!(record.intro_text, "Windows 11 2024 更新。");
    assert_eq!(record.version_info, "版本信息：Build 26100");
    assert_eq!(record.url, format!("{}/windows-11/win11-24h2/", server.uri()));
    assert_eq!(record.versions.len(), 2);

    let x64 = &record.versions[0];
    assert_eq!(x64.version_text, "Windows 11 24H2 (x64)");
    assert_eq!(x64.attributes.len(), 2);
    assert_eq!(x64.downloads[0].download_type, "HTTP 直链");
    assert_eq!(x64.downloads[0].download_url, "https://example.com/win11.iso");
    assert_eq!(x64.downloads[1].download_type, "电驴");

    // no label in this section, so nothing leaks over from the previous one
    assert_eq!(record.versions[1].downloads[0].download_type, "下载");

    assert_eq!(record.image_path.as_deref(), Some("images/win11.jpg"));
    assert_eq!(fs::read(item_dir.join("images/win11.jpg")).unwrap(), b"jpeg-bytes");

    let detail = read(&item_dir.join("detail.html"));
    assert!(detail.contains(r#"href="https://example.com/win11.iso""#));
    assert!(detail.contains(r#"data-action="open""#));
    assert!(detail.contains(r#"data-action="copy-ed2k""#));

    let summary: serde_json::Value =
        serde_json::from_str(&read(&site.path().join("data/summary.json"))).unwrap();
    assert!(summary["last_updated"].is_string());
    assert_eq!(
        summary["systems"]["windows-11"]["subtypes"]["win11-24h2"]["title"],
        "Windows 11 24H2"
    );
    assert!(site.path().join("data/windows-11.json").exists());

    let rendered = render_site(&catalog, &store).await.unwrap();
    assert_eq!(rendered.items, 1);
    assert_eq!(rendered.sections, 1);
    assert_eq!(rendered.details, 1);

    let index = read(&site.path().join("index.html"));
    assert!(index.contains(r#"href="data/windows-11/win11-24h2/detail.html""#));
    assert!(index.contains("Win11 24H2"));
    assert!(site.path().join("static/style.css").exists());
    assert!(site.path().join("static/script.js").exists());
    assert_eq!(read(&site.path().join("CNAME")), "windows.unblock.win\n");

    let dest = tempdir().unwrap();
    let published = publish(site.path(), dest.path()).unwrap();
    assert_eq!(published.failed, 0);
    assert!(dest
        .path()
        .join("data/windows-11/win11-24h2/detail.html")
        .exists());
    assert!(dest.path().join("index.html").exists());
}

#[tokio::test]
async fn test_missing_page_is_skipped() {
    let server = MockServer::start().await;
    mount_page(&server, "/windows-11/win11-24h2/", WIN11_PAGE).await;
    mount_image(&server).await;

    let site = tempdir().unwrap();
    let store = SiteStore::new(site.path());
    let catalog = catalog_for(&server, 5, &["win11-24h2", "win11-23h2"]);

    let report = scrape(&catalog, &store).await.unwrap();
    assert_eq!(report.ok, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].subtype, "win11-23h2");
    assert!(report.failures[0].error.contains("HTTP 404"));

    let subtypes = &report.summary.systems["windows-11"].subtypes;
    assert!(subtypes.contains_key("win11-24h2"));
    assert!(!subtypes.contains_key("win11-23h2"));
    assert!(!site.path().join("data/windows-11/win11-23h2").exists());
}

#[tokio::test]
async fn test_slow_page_times_out() {
    let server = MockServer::start().await;
    mount_page(&server, "/windows-11/win11-24h2/", WIN11_PAGE).await;
    mount_image(&server).await;
    Mock::given(method("GET"))
        .and(path("/windows-11/win11-23h2/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(WIN11_PAGE)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let site = tempdir().unwrap();
    let store = SiteStore::new(site.path());
    let catalog = catalog_for(&server, 1, &["win11-23h2", "win11-24h2"]);

    let report = scrape(&catalog, &store).await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.ok, 1);
    assert!(report.failures[0].error.contains("timed out"));
    assert!(site
        .path()
        .join("data/windows-11/win11-24h2/data.json")
        .exists());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, "/windows-11/win11-24h2/", WIN11_PAGE).await;
    mount_image(&server).await;

    let site = tempdir().unwrap();
    let store = SiteStore::new(site.path());
    let catalog = catalog_for(&server, 5, &["win11-24h2"]);
    let data_json = site.path().join("data/windows-11/win11-24h2/data.json");

    scrape(&catalog, &store).await.unwrap();
    let first_summary = summary_without_timestamp(site.path());
    let first_item = read(&data_json);

    scrape(&catalog, &store).await.unwrap();
    assert_eq!(summary_without_timestamp(site.path()), first_summary);
    assert_eq!(read(&data_json), first_item);
}

#[tokio::test]
async fn test_page_without_markers_uses_fallback_title() {
    let server = MockServer::start().await;
    mount_page(&server, "/windows-11/win11-24h2/", "<html><body><p>maintenance</p></body></html>").await;

    let site = tempdir().unwrap();
    let store = SiteStore::new(site.path());
    let catalog = catalog_for(&server, 5, &["win11-24h2"]);

    let report = scrape(&catalog, &store).await.unwrap();
    assert_eq!(report.ok, 1);

    let record = &report.summary.systems["windows-11"].subtypes["win11-24h2"];
    assert_eq!(record.title, "Windows 11 win11-24h2");
    assert!(record.versions.is_empty());
    assert!(record.image_path.is_none());
}
