use std::ffi::OsStr;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::json;
use walkdir::WalkDir;

use crate::folio::SiteConfig;
use crate::folio::config::ProjectConfig;
use crate::folio::toc::TocEntry;
use crate::folio::types::PostSummary;

/// Register every `.hbs` file under `templates_dir`. Top-level files become
/// templates named by their stem; nested files become partials named by their
/// relative path (e.g. `components/head`).
pub fn build_handlebars(templates_dir: &Path) -> Result<Handlebars<'static>> {
    let mut handlebars = Handlebars::new();

    for entry in WalkDir::new(templates_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file() && e.path().extension() == Some(OsStr::new("hbs")))
    {
        let path = entry.path();
        let rel = path
            .strip_prefix(templates_dir)
            .with_context(|| format!("template {} outside {}", path.display(), templates_dir.display()))?;
        let rel_no_ext = rel.with_extension("");
        let name = rel_no_ext.to_string_lossy().replace('\\', "/");

        if rel.parent().map(|p| p == Path::new("")).unwrap_or(true) {
            handlebars
                .register_template_file(&name, path)
                .with_context(|| format!("registering template {name}"))?;
        } else {
            let partial_src = fs::read_to_string(path)
                .with_context(|| format!("reading partial {name}"))?;
            handlebars
                .register_partial(&name, partial_src)
                .with_context(|| format!("registering partial {name}"))?;
        }
    }

    for required in ["post", "blog", "projects"] {
        if !handlebars.has_template(required) {
            anyhow::bail!(
                "template {required}.hbs missing from {}",
                templates_dir.display()
            );
        }
    }

    Ok(handlebars)
}

#[derive(Serialize)]
struct SiteContext<'a> {
    title: &'a str,
    title_suffix: &'a str,
    description: &'a str,
    author: &'a str,
    locale: &'a str,
    year: i32,
    version: &'static str,
}

fn site_context(config: &SiteConfig) -> SiteContext<'_> {
    SiteContext {
        title: &config.site.title,
        title_suffix: &config.site.title_suffix,
        description: &config.site.description,
        author: &config.site.author,
        locale: &config.site.locale,
        year: Utc::now().year(),
        version: env!("CARGO_PKG_VERSION"),
    }
}

/// Post metadata as shown in a listing or above an article; names are lowercased
/// the way the site displays them.
#[derive(Serialize)]
struct PostCard<'a> {
    title: &'a str,
    href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    emoji: Option<&'a str>,
    date: String,
    authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
}

impl<'a> From<&'a PostSummary> for PostCard<'a> {
    fn from(post: &'a PostSummary) -> Self {
        PostCard {
            title: &post.title,
            href: post.href(),
            emoji: post.emoji.as_deref(),
            date: post
                .date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            authors: post.authors.iter().map(|a| a.to_lowercase()).collect(),
            tag: post.tag.as_ref().map(|t| t.to_lowercase()),
        }
    }
}

#[derive(Serialize)]
struct ArticleContext<'a> {
    #[serde(flatten)]
    card: PostCard<'a>,
    toc: &'a [TocEntry],
    body: &'a str,
}

pub fn render_post_page(
    hb: &Handlebars<'static>,
    config: &SiteConfig,
    post: &PostSummary,
    body_html: &str,
    toc: &[TocEntry],
) -> Result<String> {
    let article = ArticleContext {
        card: post.into(),
        toc,
        body: body_html,
    };
    let data = json!({
        "site": site_context(config),
        "page_title": post.title,
        "canonical": config.canonical_url(&post.href()),
        "article": article,
    });

    hb.render("post", &data)
        .with_context(|| format!("rendering post {}", post.slug))
}

pub fn render_blog_index(
    hb: &Handlebars<'static>,
    config: &SiteConfig,
    posts: &[PostSummary],
) -> Result<String> {
    let cards: Vec<PostCard> = posts.iter().map(PostCard::from).collect();
    let data = json!({
        "site": site_context(config),
        "page_title": "Blog",
        "canonical": config.canonical_url("/blog"),
        "posts": cards,
    });

    hb.render("blog", &data).context("rendering blog index")
}

pub fn render_projects(hb: &Handlebars<'static>, config: &SiteConfig) -> Result<String> {
    let projects: &[ProjectConfig] = &config.projects;
    let data = json!({
        "site": site_context(config),
        "page_title": "Projects",
        "canonical": config.canonical_url("/projects"),
        "projects": projects,
    });

    hb.render("projects", &data).context("rendering projects page")
}
