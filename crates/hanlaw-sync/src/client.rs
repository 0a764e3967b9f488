//! HTTP client for the law.go.kr DRF endpoints.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use hanlaw_core::StatuteDetail;

use crate::parse::{self, ParseError, SearchPage};

/// Largest page size the upstream API accepts.
pub const MAX_DISPLAY: u32 = 100;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("api returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Connection settings for the statute API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL up to the DRF path segment, without a trailing slash.
    pub base_url: String,
    /// Caller credential (the `OC` query parameter).
    pub oc: String,
    /// Listing sort order. `lasc` sorts by statute name ascending.
    pub sort: String,
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.law.go.kr/DRF".to_string(),
            oc: String::new(),
            sort: "lasc".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the statute listing and detail endpoints. Responses are
/// always requested as XML; retries are the caller's concern.
pub struct SourceClient {
    http: reqwest::Client,
    base_url: String,
    oc: String,
    sort: String,
}

impl SourceClient {
    pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            oc: config.oc,
            sort: config.sort,
        })
    }

    /// Fetch one page of the statute listing. `display` is clamped to
    /// the upstream maximum. A page with no matches is an empty
    /// `SearchPage`, not an error.
    pub async fn list_statutes(
        &self,
        query: Option<&str>,
        display: u32,
        page: u32,
    ) -> Result<SearchPage, ClientError> {
        let display = display.clamp(1, MAX_DISPLAY);
        let mut params = vec![
            ("OC", self.oc.clone()),
            ("target", "law".to_string()),
            ("type", "XML".to_string()),
            ("display", display.to_string()),
            ("page", page.to_string()),
            ("sort", self.sort.clone()),
        ];
        if let Some(query) = query {
            params.push(("query", query.to_string()));
        }

        let body = self.get("lawSearch.do", &params).await?;
        let parsed = parse::parse_search_page(&body)?;
        let requested = display;
        debug!(page, requested, returned = parsed.summaries.len(), "listed statutes");
        Ok(parsed)
    }

    /// Fetch the full text of one statute by its external id (the
    /// upstream `MST` parameter).
    pub async fn fetch_detail(&self, external_id: &str) -> Result<StatuteDetail, ClientError> {
        let params = vec![
            ("OC", self.oc.clone()),
            ("target", "law".to_string()),
            ("type", "XML".to_string()),
            ("MST", external_id.to_string()),
        ];

        let body = self.get("lawService.do", &params).await?;
        Ok(parse::parse_detail(&body)?)
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<String, ClientError> {
        let url = format!("{}/{}", self.base_url, path);
        let resp = self.http.get(&url).query(params).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(resp.text().await?)
    }
}
