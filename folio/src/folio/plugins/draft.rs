use super::traits::Filter;
use crate::folio::types::PostSummary;

/// Hides posts whose `published` checkbox exists and is unticked.
pub struct DraftFilter;

impl Filter for DraftFilter {
    fn include(&self, post: &PostSummary) -> bool {
        post.published.unwrap_or(true)
    }
}

/// Hides posts dated in the future, so scheduled posts stay out of the build.
pub struct ScheduledFilter {
    pub today: chrono::NaiveDate,
}

impl ScheduledFilter {
    pub fn now() -> Self {
        Self {
            today: chrono::Utc::now().date_naive(),
        }
    }
}

impl Filter for ScheduledFilter {
    fn include(&self, post: &PostSummary) -> bool {
        post.date.map(|d| d <= self.today).unwrap_or(true)
    }
}
