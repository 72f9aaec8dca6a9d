use std::future::Future;
use std::time::Duration;

use log::debug;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::NotionError;
use super::model::{ApiErrorBody, Block, Page, PaginatedList};
use crate::folio::config::{NotionConfig, PropertyNames};

/// Largest page size the Notion API accepts.
const PAGE_SIZE: u32 = 100;

const NOTION_VERSION: HeaderName = HeaderName::from_static("notion-version");

/// Anything that can list the children of a block.
pub trait BlockSource {
    fn children(&self, block_id: &str) -> impl Future<Output = anyhow::Result<Vec<Block>>> + Send;
}

#[derive(Clone)]
pub struct NotionClient {
    http: reqwest::Client,
    api_base: String,
    properties: PropertyNames,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Result<Self, NotionError> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.token))
            .map_err(|_| NotionError::InvalidHeader("authorization"))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            NOTION_VERSION,
            HeaderValue::from_str(&config.version)
                .map_err(|_| NotionError::InvalidHeader("notion-version"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("folio/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            properties: config.properties.clone(),
        })
    }

    /// Query a database, newest posts first, optionally narrowed to a single slug.
    pub async fn query_database(
        &self,
        database_id: &str,
        slug: Option<&str>,
    ) -> Result<Vec<Page>, NotionError> {
        let url = format!("{}/databases/{}/query", self.api_base, database_id);
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let body = self.query_body(slug, cursor.as_deref());
            let response = self.http.post(&url).json(&body).send().await?;
            let list: PaginatedList<Page> = decode(response).await?;
            debug!(
                "database {database_id}: {} pages (has_more: {})",
                list.results.len(),
                list.has_more
            );
            pages.extend(list.results);

            match (list.has_more, list.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        Ok(pages)
    }

    fn query_body(&self, slug: Option<&str>, cursor: Option<&str>) -> Value {
        let mut body = json!({
            "sorts": [{ "property": self.properties.date, "direction": "descending" }],
            "page_size": PAGE_SIZE,
        });
        if let Some(slug) = slug {
            body["filter"] = json!({
                "property": self.properties.slug,
                "rich_text": { "equals": slug },
            });
        }
        if let Some(cursor) = cursor {
            body["start_cursor"] = json!(cursor);
        }
        body
    }

    pub async fn retrieve_page(&self, page_id: &str) -> Result<Page, NotionError> {
        let url = format!("{}/pages/{}", self.api_base, page_id);
        let response = self.http.get(&url).send().await?;
        decode(response).await
    }

    /// All direct children of a block (or page), following every cursor.
    pub async fn list_block_children(&self, block_id: &str) -> Result<Vec<Block>, NotionError> {
        let url = format!("{}/blocks/{}/children", self.api_base, block_id);
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut request = self.http.get(&url).query(&[("page_size", PAGE_SIZE.to_string())]);
            if let Some(cursor) = &cursor {
                request = request.query(&[("start_cursor", cursor)]);
            }

            let list: PaginatedList<Block> = decode(request.send().await?).await?;
            blocks.extend(list.results);

            match (list.has_more, list.next_cursor) {
                (true, Some(next)) => cursor = Some(next),
                _ => break,
            }
        }

        debug!("block {block_id}: {} children", blocks.len());
        Ok(blocks)
    }
}

impl BlockSource for NotionClient {
    async fn children(&self, block_id: &str) -> anyhow::Result<Vec<Block>> {
        Ok(self.list_block_children(block_id).await?)
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, NotionError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(NotionError::RateLimited { retry_after });
    }

    let bytes = response.bytes().await?;

    if !status.is_success() {
        return Err(match serde_json::from_slice::<ApiErrorBody>(&bytes) {
            Ok(body) => NotionError::Api {
                status: status.as_u16(),
                code: body.code,
                message: body.message,
            },
            Err(_) => NotionError::Api {
                status: status.as_u16(),
                code: "unknown".into(),
                message: String::from_utf8_lossy(&bytes).into_owned(),
            },
        });
    }

    Ok(serde_json::from_slice(&bytes)?)
}
