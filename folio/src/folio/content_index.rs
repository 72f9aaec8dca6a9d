use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;

use crate::folio::types::PostSummary;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContentIndexEntry<'a> {
    slug: &'a str,
    title: &'a str,
    href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<&'a str>,
    #[serde(skip_serializing_if = "no_authors")]
    authors: &'a [String],
}

fn no_authors(authors: &&[String]) -> bool {
    authors.is_empty()
}

/// Write `static/posts.json`, a slug-keyed index used by client-side search.
pub fn write_content_index(output_root: &Path, posts: &[PostSummary]) -> Result<PathBuf> {
    let entries: BTreeMap<&str, ContentIndexEntry> = posts
        .iter()
        .map(|post| {
            (
                post.slug.as_str(),
                ContentIndexEntry {
                    slug: &post.slug,
                    title: &post.title,
                    href: post.href(),
                    date: post.date.map(|d| d.format("%Y-%m-%d").to_string()),
                    tag: post.tag.as_deref(),
                    authors: &post.authors,
                },
            )
        })
        .collect();

    let static_dir = output_root.join("static");
    fs::create_dir_all(&static_dir)
        .with_context(|| format!("creating static dir at {}", static_dir.display()))?;

    let json_path = static_dir.join("posts.json");
    let json = serde_json::to_string(&entries)?;
    fs::write(&json_path, json)
        .with_context(|| format!("writing content index to {}", json_path.display()))?;

    debug!("posts.json written to {}", json_path.display());
    Ok(json_path)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use serde_json::Value;

    use super::*;

    #[test]
    fn index_is_keyed_by_slug() {
        let dir = tempfile::tempdir().unwrap();
        let posts = vec![PostSummary {
            id: "p-1".into(),
            title: "Hello".into(),
            slug: "hello".into(),
            date: NaiveDate::from_ymd_opt(2022, 1, 2),
            authors: vec!["Ada".into()],
            tag: Some("notes".into()),
            emoji: None,
            published: None,
            last_edited_time: Utc::now(),
        }];

        let path = write_content_index(dir.path(), &posts).unwrap();
        let index: Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();

        assert_eq!(index["hello"]["title"], "Hello");
        assert_eq!(index["hello"]["href"], "/blog/hello");
        assert_eq!(index["hello"]["date"], "2022-01-02");
        assert_eq!(index["hello"]["authors"][0], "Ada");
    }
}
