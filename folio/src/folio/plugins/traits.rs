use crate::folio::types::PostSummary;

pub trait Filter: Send + Sync {
    fn include(&self, post: &PostSummary) -> bool;
}
