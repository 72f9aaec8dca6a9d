pub mod draft;
pub mod traits;

use crate::folio::types::PostSummary;

use self::traits::Filter;

pub struct PluginRegistry {
    filters: Vec<Box<dyn Filter>>,
}

impl PluginRegistry {
    pub fn bare_minimum() -> Self {
        Self { filters: vec![] }
    }

    pub fn with_filters(mut self, filters: Vec<Box<dyn Filter>>) -> Self {
        self.filters = filters;
        self
    }

    /// A post is kept only when every filter includes it.
    pub fn allow(&self, post: &PostSummary) -> bool {
        self.filters.iter().all(|f| f.include(post))
    }

    pub fn retain(&self, posts: &mut Vec<PostSummary>) {
        posts.retain(|post| {
            let keep = self.allow(post);
            if !keep {
                log::debug!("filtered out post {}", post.slug);
            }
            keep
        });
    }
}

pub use draft::{DraftFilter, ScheduledFilter};

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;

    fn post(slug: &str, published: Option<bool>, date: Option<NaiveDate>) -> PostSummary {
        PostSummary {
            id: slug.into(),
            title: slug.into(),
            slug: slug.into(),
            date,
            authors: vec![],
            tag: None,
            emoji: None,
            published,
            last_edited_time: Utc::now(),
        }
    }

    #[test]
    fn filters_drafts_and_scheduled_posts() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let registry = PluginRegistry::bare_minimum()
            .with_filters(vec![Box::new(DraftFilter), Box::new(ScheduledFilter { today })]);

        let mut posts = vec![
            post("live", Some(true), NaiveDate::from_ymd_opt(2024, 2, 1)),
            post("no-checkbox", None, None),
            post("draft", Some(false), NaiveDate::from_ymd_opt(2024, 2, 1)),
            post("later", Some(true), NaiveDate::from_ymd_opt(2024, 4, 1)),
        ];
        registry.retain(&mut posts);

        let slugs: Vec<_> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["live", "no-checkbox"]);
    }
}
