use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::folio::config::PropertyNames;
use crate::folio::notion::Page;

/// A blog post as listed in the database, before its blocks are fetched.
#[derive(Clone, Debug, Serialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub authors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    pub last_edited_time: DateTime<Utc>,
}

impl PostSummary {
    /// Read a post out of a database page. Pages without a title or slug are not posts.
    pub fn from_page(page: &Page, names: &PropertyNames) -> Option<Self> {
        let text = |name: &str| {
            page.property(name)
                .and_then(|p| p.plain_text())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let title = text(&names.title)?;
        let slug = text(&names.slug)?;

        Some(Self {
            id: page.id.clone(),
            title,
            slug,
            date: page.property(&names.date).and_then(|p| p.date()),
            authors: page
                .property(&names.author)
                .map(|p| p.people_names())
                .unwrap_or_default(),
            tag: text(&names.tag),
            emoji: page.emoji().map(str::to_string),
            published: page.property(&names.published).and_then(|p| p.checkbox()),
            last_edited_time: page.last_edited_time,
        })
    }

    pub fn href(&self) -> String {
        format!("/blog/{}", self.slug)
    }

    /// Path of the rendered post relative to the output root.
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from("blog").join(&self.slug).join("index.html")
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RenderedPost {
    pub slug: String,
    pub html: String,
    pub cached: bool,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct BuildReport {
    pub rendered: Vec<String>,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

impl BuildReport {
    pub fn total(&self) -> usize {
        self.rendered.len() + self.cached.len() + self.failed.len()
    }
}

/// Slugs become directory names; refuse anything that could escape `blog/`.
pub fn is_safe_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug != "."
        && slug != ".."
        && slug
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}
