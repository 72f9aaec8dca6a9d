use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use futures_util::{StreamExt, stream};
use handlebars::Handlebars;
use log::{debug, error, info, warn};

use crate::folio::cache;
use crate::folio::config::SiteConfig;
use crate::folio::content_index::write_content_index;
use crate::folio::enrich::{EnrichOptions, enrich_blocks};
use crate::folio::notion::{NotionClient, Page};
use crate::folio::plugins::{DraftFilter, PluginRegistry, ScheduledFilter};
use crate::folio::probe::ImageProber;
use crate::folio::render::render_blocks;
use crate::folio::toc::table_of_contents;
use crate::folio::types::{BuildReport, PostSummary, RenderedPost, is_safe_slug};
use crate::pages;

pub struct FolioEngine {
    pub config: SiteConfig,
    handlebars: Handlebars<'static>,
    notion: NotionClient,
    prober: ImageProber,
    registry: PluginRegistry,
    output_root: PathBuf,
    cache_root: PathBuf,
    /// Newest of the template-hash marker and the binary; pages older than this are stale.
    deps_mtime: SystemTime,
}

impl FolioEngine {
    pub fn new(config: SiteConfig, handlebars: Handlebars<'static>) -> Result<Self> {
        let output_root = config.build.output_dir.clone();
        let cache_root = config.build.cache_dir.clone();

        cache::ensure_cache_root(&cache_root)
            .with_context(|| format!("creating cache dir {}", cache_root.display()))?;
        fs::create_dir_all(&output_root)
            .with_context(|| format!("creating output dir {}", output_root.display()))?;

        let templates_hash =
            cache::hash_files_with_extension(&config.build.templates_dir, "hbs")
                .context("hashing templates")?;
        let templates_mtime = cache::update_hash_marker(&cache_root, "templates", &templates_hash)?;
        let deps_mtime = templates_mtime.max(cache::binary_mtime());

        let notion = NotionClient::new(&config.notion).context("building notion client")?;
        let prober = ImageProber::new(
            Duration::from_secs(config.notion.timeout_secs),
            config.build.max_probe_bytes,
        )
        .context("building image probe client")?;

        Ok(Self {
            config,
            handlebars,
            notion,
            prober,
            registry: PluginRegistry::bare_minimum()
                .with_filters(vec![Box::new(DraftFilter), Box::new(ScheduledFilter::now())]),
            output_root,
            cache_root,
            deps_mtime,
        })
    }

    fn enrich_options(&self) -> EnrichOptions {
        EnrichOptions {
            max_depth: self.config.build.max_child_depth,
            concurrency: self.config.build.concurrency,
        }
    }

    fn summarize(&self, pages: &[Page]) -> Vec<PostSummary> {
        let names = &self.config.notion.properties;
        let mut posts: Vec<PostSummary> = pages
            .iter()
            .filter(|page| !page.archived)
            .filter_map(|page| {
                let post = PostSummary::from_page(page, names);
                if post.is_none() {
                    warn!("page {} has no {} or {}, skipping", page.id, names.title, names.slug);
                }
                post
            })
            .filter(|post| {
                let safe = is_safe_slug(&post.slug);
                if !safe {
                    warn!("post {} has an unusable slug {:?}, skipping", post.id, post.slug);
                }
                safe
            })
            .collect();
        self.registry.retain(&mut posts);

        // Pages arrive newest first; later pages with the same slug would overwrite its output.
        let mut slugs = HashSet::new();
        posts.retain(|post| {
            let first = slugs.insert(post.slug.clone());
            if !first {
                warn!("post {} reuses slug {:?}, skipping", post.id, post.slug);
            }
            first
        });
        posts
    }

    /// Every publishable post in the database, newest first.
    pub async fn list_posts(&self) -> Result<Vec<PostSummary>> {
        let pages = self
            .notion
            .query_database(&self.config.notion.database_id, None)
            .await
            .context("querying posts database")?;
        let posts = self.summarize(&pages);
        info!("{} posts in database ({} pages)", posts.len(), pages.len());
        Ok(posts)
    }

    fn is_cached(&self, post: &PostSummary) -> Result<bool> {
        if !self.config.build.incremental {
            return Ok(false);
        }

        let fresh = cache::post_is_fresh(
            &cache::marker_path(&self.cache_root, &post.slug),
            &self.output_root.join(post.output_path()),
            &post.last_edited_time.to_rfc3339(),
            &[self.deps_mtime],
            Duration::from_secs(self.config.build.revalidate_secs),
        )?;
        Ok(fresh)
    }

    /// Fetch, enrich and render one post, then write it under `blog/{slug}/`.
    pub async fn render_post(&self, post: &PostSummary) -> Result<RenderedPost> {
        let output = self.output_root.join(post.output_path());

        if self.is_cached(post)? {
            debug!("reusing cached render of {}", post.slug);
            let html = fs::read_to_string(&output)
                .with_context(|| format!("reading cached {}", output.display()))?;
            return Ok(RenderedPost {
                slug: post.slug.clone(),
                html,
                cached: true,
            });
        }

        let page = self
            .notion
            .retrieve_page(&post.id)
            .await
            .with_context(|| format!("retrieving page for {}", post.slug))?;
        // The slug decides the output path, so it stays as listed even if it was edited since.
        let listed_slug = post.slug.clone();
        let mut post = PostSummary::from_page(&page, &self.config.notion.properties)
            .unwrap_or_else(|| post.clone());
        post.slug = listed_slug;

        let blocks = self
            .notion
            .list_block_children(&page.id)
            .await
            .with_context(|| format!("listing blocks of {}", post.slug))?;
        let blocks = enrich_blocks(blocks, &self.notion, &self.prober, &self.enrich_options())
            .await
            .with_context(|| format!("enriching blocks of {}", post.slug))?;

        let toc = table_of_contents(&blocks);
        let body = render_blocks(&blocks);
        let html = pages::render_post_page(&self.handlebars, &self.config, &post, &body, &toc)?;

        cache::write_output(&output, &html)
            .with_context(|| format!("writing {}", output.display()))?;
        cache::write_marker(
            &cache::marker_path(&self.cache_root, &post.slug),
            &post.last_edited_time.to_rfc3339(),
        )?;

        info!("rendered {} ({} blocks)", post.slug, blocks.len());
        Ok(RenderedPost {
            slug: post.slug.clone(),
            html,
            cached: false,
        })
    }

    /// Render a single post, looked up by slug.
    pub async fn build_one(&self, slug: &str) -> Result<RenderedPost> {
        let pages = self
            .notion
            .query_database(&self.config.notion.database_id, Some(slug))
            .await
            .with_context(|| format!("looking up post {slug}"))?;

        let Some(post) = self.summarize(&pages).into_iter().find(|p| p.slug == slug) else {
            bail!("no published post with slug {slug}");
        };
        self.render_post(&post).await
    }

    /// Render every post plus the blog index, projects page and content index.
    /// A post that fails is reported and skipped; the rest of the site still builds.
    pub async fn build_all(&self) -> Result<BuildReport> {
        let posts = self.list_posts().await?;

        let results: Vec<(String, Result<RenderedPost>)> = stream::iter(posts.iter())
            .map(|post| async move { (post.slug.clone(), self.render_post(post).await) })
            .buffer_unordered(self.config.build.concurrency.max(1))
            .collect()
            .await;

        let mut report = BuildReport::default();
        for (slug, result) in results {
            match result {
                Ok(rendered) if rendered.cached => report.cached.push(slug),
                Ok(_) => report.rendered.push(slug),
                Err(err) => {
                    error!("failed to render post {slug}: {err:#}");
                    report.failed.push(slug);
                }
            }
        }

        // Failed posts stay listed; an earlier render of them, if any, is left in place.
        self.write_page(
            "blog/index.html",
            pages::render_blog_index(&self.handlebars, &self.config, &posts)?,
        )?;
        self.write_page(
            "projects/index.html",
            pages::render_projects(&self.handlebars, &self.config)?,
        )?;
        write_content_index(&self.output_root, &posts)?;

        report.rendered.sort();
        report.cached.sort();
        report.failed.sort();
        Ok(report)
    }

    fn write_page(&self, rel: &str, html: String) -> Result<()> {
        let path = self.output_root.join(rel);
        cache::write_output(&path, &html).with_context(|| format!("writing {}", path.display()))
    }
}
