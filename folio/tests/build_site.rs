use std::fs;
use std::io::Cursor;
use std::path::PathBuf;

use folio::folio::config::NotionConfig;
use folio::folio::{FolioEngine, SiteConfig};
use folio::pages::build_handlebars;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::new(width, height);
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

fn post_page(id: &str, slug: &str, title: &str, published: bool) -> Value {
    json!({
        "object": "page",
        "id": id,
        "created_time": "2021-05-01T00:00:00.000Z",
        "last_edited_time": "2021-05-02T00:00:00.000Z",
        "icon": { "type": "emoji", "emoji": "🦀" },
        "properties": {
            "name": { "id": "title", "type": "title", "title": [{ "plain_text": title }] },
            "slug": { "id": "s", "type": "rich_text", "rich_text": [{ "plain_text": slug }] },
            "date": { "id": "d", "type": "date", "date": { "start": "2021-05-01" } },
            "author": { "id": "a", "type": "people", "people": [{ "name": "Spencer Woo" }] },
            "tag": { "id": "t", "type": "select", "select": { "name": "Rust" } },
            "published": { "id": "p", "type": "checkbox", "checkbox": published }
        }
    })
}

fn archived_page(id: &str, slug: &str, title: &str) -> Value {
    let mut page = post_page(id, slug, title, true);
    page["archived"] = json!(true);
    page
}

fn list(results: Vec<Value>) -> Value {
    json!({ "object": "list", "results": results, "has_more": false, "next_cursor": null })
}

struct Site {
    server: MockServer,
    out: TempDir,
    cache: TempDir,
}

impl Site {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            out: tempfile::tempdir().unwrap(),
            cache: tempfile::tempdir().unwrap(),
        }
    }

    fn engine(&self) -> FolioEngine {
        self.engine_with(|_| {})
    }

    fn engine_with(&self, tweak: impl FnOnce(&mut SiteConfig)) -> FolioEngine {
        let mut notion = NotionConfig::new("secret_test", "db");
        notion.api_base = self.server.uri();

        let mut config = SiteConfig::new(notion);
        config.site.hostname = "https://example.com".into();
        config.build.output_dir = self.out.path().to_path_buf();
        config.build.cache_dir = self.cache.path().to_path_buf();
        tweak(&mut config);

        let templates = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("templates");
        FolioEngine::new(config, build_handlebars(&templates).unwrap()).unwrap()
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.out.path().join(rel)).unwrap()
    }

    async fn mount_post(&self) {
        let image_url = format!("{}/images/diagram.png", self.server.uri());

        Mock::given(method("POST"))
            .and(path("/databases/db/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
                post_page("post-1", "hello-notion", "Hello Notion", true),
                post_page("post-2", "draft", "Unfinished", false),
                archived_page("post-0", "old-news", "Old news"),
                post_page("post-3", "hello-notion", "Older duplicate", true),
            ])))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/pages/post-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(post_page("post-1", "hello-notion", "Hello Notion", true)),
            )
            .mount(&self.server)
            .await;

        for skipped in ["post-0", "post-3"] {
            Mock::given(method("GET"))
                .and(path(format!("/pages/{skipped}")))
                .respond_with(ResponseTemplate::new(404))
                .expect(0)
                .mount(&self.server)
                .await;
        }

        Mock::given(method("GET"))
            .and(path("/blocks/post-1/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![
                json!({
                    "object": "block", "id": "h-1", "type": "heading_1", "has_children": false,
                    "heading_1": { "rich_text": [{ "plain_text": "Why Rust" }] }
                }),
                json!({
                    "object": "block", "id": "toggle-1", "type": "toggle", "has_children": true,
                    "toggle": { "rich_text": [{ "plain_text": "Show diagram" }] }
                }),
            ])))
            .mount(&self.server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blocks/toggle-1/children"))
            .respond_with(ResponseTemplate::new(200).set_body_json(list(vec![json!({
                "object": "block", "id": "img-1", "type": "image", "has_children": false,
                "image": { "type": "external", "external": { "url": image_url }, "caption": [] }
            })])))
            .mount(&self.server)
            .await;
    }
}

#[tokio::test]
async fn builds_posts_index_and_projects() {
    let site = Site::start().await;
    site.mount_post().await;
    Mock::given(method("GET"))
        .and(path("/images/diagram.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(320, 200)))
        .mount(&site.server)
        .await;

    let report = site.engine().build_all().await.unwrap();
    assert_eq!(report.rendered, vec!["hello-notion"]);
    assert!(report.failed.is_empty());

    let post = site.read("blog/hello-notion/index.html");
    assert!(post.contains("<span>Hello Notion</span>"));
    assert!(post.contains(r#"<h2 id="why-rust">"#));
    assert!(post.contains(r#"<details class="notion-toggle"><summary>Show diagram</summary>"#));
    assert!(post.contains(r#"width="320" height="200""#));
    assert!(post.contains("<span>· rust</span>"));

    let index = site.read("blog/index.html");
    assert!(index.contains(r#"href="/blog/hello-notion""#));
    assert!(!index.contains("/blog/draft"));
    assert!(!index.contains("/blog/old-news"));
    assert_eq!(index.matches(r#"href="/blog/hello-notion""#).count(), 1);
    assert!(!index.contains("Older duplicate"));

    assert!(site.read("projects/index.html").contains("Under construction"));

    let posts: Value = serde_json::from_str(&site.read("static/posts.json")).unwrap();
    assert_eq!(posts["hello-notion"]["title"], "Hello Notion");
    assert!(posts.get("draft").is_none());
    assert!(posts.get("old-news").is_none());
    assert!(!site.out.path().join("blog/old-news").exists());
}

#[tokio::test]
async fn unchanged_posts_are_reused_on_rebuild() {
    let site = Site::start().await;
    site.mount_post().await;
    Mock::given(method("GET"))
        .and(path("/images/diagram.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(16, 16)))
        .expect(1)
        .mount(&site.server)
        .await;

    let engine = site.engine();
    let first = engine.build_all().await.unwrap();
    assert_eq!(first.rendered, vec!["hello-notion"]);

    let second = engine.build_all().await.unwrap();
    assert!(second.rendered.is_empty());
    assert_eq!(second.cached, vec!["hello-notion"]);
}

#[tokio::test]
async fn non_incremental_builds_render_every_time() {
    let site = Site::start().await;
    site.mount_post().await;
    Mock::given(method("GET"))
        .and(path("/images/diagram.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(16, 16)))
        .expect(2)
        .mount(&site.server)
        .await;

    let engine = site.engine_with(|config| config.build.incremental = false);
    let first = engine.build_all().await.unwrap();
    let second = engine.build_all().await.unwrap();

    assert_eq!(first.rendered, vec!["hello-notion"]);
    assert_eq!(second.rendered, vec!["hello-notion"]);
    assert!(second.cached.is_empty());
}

#[tokio::test]
async fn failed_image_probe_fails_only_that_post() {
    let site = Site::start().await;
    site.mount_post().await;
    Mock::given(method("GET"))
        .and(path("/images/diagram.png"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&site.server)
        .await;

    let report = site.engine().build_all().await.unwrap();
    assert_eq!(report.failed, vec!["hello-notion"]);
    assert!(!site.out.path().join("blog/hello-notion/index.html").exists());

    // The rest of the site is still written.
    assert!(site.read("blog/index.html").contains("/blog/hello-notion"));
}

#[tokio::test]
async fn build_one_renders_a_single_slug() {
    let site = Site::start().await;
    site.mount_post().await;
    Mock::given(method("GET"))
        .and(path("/images/diagram.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(8, 4)))
        .mount(&site.server)
        .await;

    let engine = site.engine();
    let post = engine.build_one("hello-notion").await.unwrap();
    assert!(!post.cached);
    assert!(post.html.contains(r#"width="8" height="4""#));

    let err = engine.build_one("draft").await.unwrap_err();
    assert!(err.to_string().contains("no published post with slug draft"));
}
