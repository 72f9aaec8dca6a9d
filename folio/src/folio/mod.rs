pub mod cache;
pub mod config;
pub mod content_index;
pub mod enrich;
pub mod notion;
pub mod plugins;
pub mod probe;
pub mod render;
pub mod renderer;
pub mod toc;
pub mod types;

pub use config::SiteConfig;
pub use renderer::FolioEngine;
pub use types::{BuildReport, PostSummary, RenderedPost};
