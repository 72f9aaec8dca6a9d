pub mod folio;
pub mod pages;

use std::env;

use anyhow::{Result, bail};
use log::info;

use crate::folio::{FolioEngine, SiteConfig};

/// Build the whole site, or only the post whose slug is given as the first argument.
pub async fn run() -> Result<()> {
    let config = SiteConfig::load()?;
    let handlebars = pages::build_handlebars(&config.build.templates_dir)?;
    let output_dir = config.build.output_dir.clone();
    let engine = FolioEngine::new(config, handlebars)?;

    if let Some(slug) = env::args().nth(1) {
        let post = engine.build_one(&slug).await?;
        info!(
            "{} {} into {}",
            if post.cached { "Reused" } else { "Rendered" },
            post.slug,
            output_dir.display()
        );
        return Ok(());
    }

    let report = engine.build_all().await?;
    info!(
        "Built {} posts into {} ({} rendered, {} cached, {} failed)",
        report.total(),
        output_dir.display(),
        report.rendered.len(),
        report.cached.len(),
        report.failed.len()
    );

    if !report.failed.is_empty() {
        bail!("failed to render: {}", report.failed.join(", "));
    }
    Ok(())
}
