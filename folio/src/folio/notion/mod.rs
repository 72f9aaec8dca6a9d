//! Typed client for the subset of the Notion REST API the site reads:
//! database queries, page retrieval and block children.

pub mod client;
pub mod error;
pub mod model;

pub use client::{BlockSource, NotionClient};
pub use error::NotionError;
pub use model::{Block, BlockKind, ImageDimensions, Page};
