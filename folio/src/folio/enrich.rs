//! Prepares a page's block tree for rendering.
//!
//! Two phases run back to back: nested children are fetched and spliced into
//! their parents, then every image in the finished tree is probed for its
//! pixel size. Both phases fan out in parallel and fail as a whole: the first
//! error aborts enrichment and nothing is returned.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use futures_util::{StreamExt, TryStreamExt, stream};
use log::debug;

use crate::folio::notion::{Block, BlockSource, ImageDimensions};
use crate::folio::probe::ImageProbe;

#[derive(Clone, Debug)]
pub struct EnrichOptions {
    /// Levels of children fetched below the top-level blocks. `1` fetches
    /// only the direct children of top-level blocks.
    pub max_depth: usize,
    pub concurrency: usize,
}

impl Default for EnrichOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            concurrency: 8,
        }
    }
}

pub async fn enrich_blocks<S, P>(
    mut blocks: Vec<Block>,
    source: &S,
    prober: &P,
    options: &EnrichOptions,
) -> Result<Vec<Block>>
where
    S: BlockSource,
    P: ImageProbe,
{
    resolve_children(&mut blocks, source, options).await?;
    resolve_image_dimensions(&mut blocks, prober, options).await?;
    Ok(blocks)
}

/// Fetch children level by level until no block at an allowed depth is missing them.
pub async fn resolve_children<S: BlockSource>(
    blocks: &mut [Block],
    source: &S,
    options: &EnrichOptions,
) -> Result<()> {
    let mut attempted: HashSet<String> = HashSet::new();

    loop {
        let mut pending = Vec::new();
        collect_pending(blocks, 0, options.max_depth, &attempted, &mut pending);
        if pending.is_empty() {
            return Ok(());
        }

        debug!("fetching children for {} blocks", pending.len());
        attempted.extend(pending.iter().cloned());

        let mut fetched: HashMap<String, Vec<Block>> = stream::iter(pending)
            .map(|id| async move {
                let children = source
                    .children(&id)
                    .await
                    .with_context(|| format!("fetching children of block {id}"))?;
                Ok::<_, anyhow::Error>((id, children))
            })
            .buffer_unordered(options.concurrency.max(1))
            .try_collect()
            .await?;

        splice_children(blocks, &mut fetched);
    }
}

fn collect_pending(
    blocks: &[Block],
    depth: usize,
    max_depth: usize,
    attempted: &HashSet<String>,
    out: &mut Vec<String>,
) {
    for block in blocks {
        if block.needs_children() {
            if depth < max_depth && !attempted.contains(&block.id) {
                out.push(block.id.clone());
            }
        } else {
            collect_pending(&block.children, depth + 1, max_depth, attempted, out);
        }
    }
}

fn splice_children(blocks: &mut [Block], fetched: &mut HashMap<String, Vec<Block>>) {
    for block in blocks.iter_mut() {
        if fetched.is_empty() {
            return;
        }
        match fetched.remove(&block.id) {
            Some(children) => block.children = children,
            None => splice_children(&mut block.children, fetched),
        }
    }
}

/// Probe every image in the tree and attach its dimensions.
pub async fn resolve_image_dimensions<P: ImageProbe>(
    blocks: &mut [Block],
    prober: &P,
    options: &EnrichOptions,
) -> Result<()> {
    let mut images = Vec::new();
    collect_images(blocks, &mut images);
    if images.is_empty() {
        return Ok(());
    }

    debug!("probing {} images", images.len());

    let mut dimensions: HashMap<String, ImageDimensions> = stream::iter(images)
        .map(|(id, url)| async move {
            let dims = prober
                .probe(&url)
                .await
                .with_context(|| format!("probing image block {id}"))?;
            Ok::<_, anyhow::Error>((id, dims))
        })
        .buffer_unordered(options.concurrency.max(1))
        .try_collect()
        .await?;

    attach_dimensions(blocks, &mut dimensions);
    Ok(())
}

fn collect_images(blocks: &[Block], out: &mut Vec<(String, String)>) {
    for block in blocks {
        if let Some(image) = block.kind.image() {
            out.push((block.id.clone(), image.source.url().to_string()));
        }
        collect_images(&block.children, out);
    }
}

fn attach_dimensions(blocks: &mut [Block], dimensions: &mut HashMap<String, ImageDimensions>) {
    for block in blocks.iter_mut() {
        if let Some(image) = block.kind.image_mut() {
            image.dimensions = dimensions.remove(&block.id);
        }
        attach_dimensions(&mut block.children, dimensions);
    }
}
