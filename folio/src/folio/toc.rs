use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::folio::notion::Block;
use crate::folio::notion::model::plain_text;

static NON_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("anchor regex"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: u8,
    pub text: String,
    pub anchor: String,
}

/// Lowercased, dash-separated fragment id for a heading.
pub fn anchor_for(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_WORD_RE
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Hands out unique anchors in document order; repeats get `-1`, `-2`, ...
#[derive(Debug, Default)]
pub struct AnchorSet {
    taken: HashSet<String>,
}

impl AnchorSet {
    pub fn assign(&mut self, text: &str) -> String {
        let mut base = anchor_for(text);
        if base.is_empty() {
            base = "section".into();
        }

        let mut anchor = base.clone();
        let mut counter = 1;
        while self.taken.contains(&anchor) {
            anchor = format!("{base}-{counter}");
            counter += 1;
        }
        self.taken.insert(anchor.clone());
        anchor
    }
}

/// Every heading in the tree, depth-first, with the anchors the renderer will emit.
pub fn table_of_contents(blocks: &[Block]) -> Vec<TocEntry> {
    let mut anchors = AnchorSet::default();
    let mut entries = Vec::new();
    collect(blocks, &mut anchors, &mut entries);
    entries
}

fn collect(blocks: &[Block], anchors: &mut AnchorSet, entries: &mut Vec<TocEntry>) {
    for block in blocks {
        if let Some((level, heading)) = block.kind.heading() {
            let text = plain_text(&heading.rich_text);
            let anchor = anchors.assign(&text);
            entries.push(TocEntry {
                level,
                text,
                anchor,
            });
        }
        collect(&block.children, anchors, entries);
    }
}
