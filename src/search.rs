//! Search Client for Swirl Search
//! One `{query, k}` POST per search, with lenient parsing of the `results` list

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while talking to the search endpoint.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    /// Connection refused, DNS failure, timeout and the like
    #[error("transport error: {0}")]
    Transport(String),

    /// Endpoint answered with a non-2xx status
    #[error("endpoint returned HTTP {0}")]
    Status(u16),

    /// HTTP client could not be constructed
    #[error("client setup failed: {0}")]
    Client(String),
}

/// Result type for search operations.
pub type SearchResult<T> = Result<T, SearchError>;

/// Request payload sent to the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub k: u32,
}

/// A single paper as returned by the endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperRecord {
    pub title: String,
    pub abstract_text: Option<String>,
    pub authors: Option<String>,
    /// Full URL to the paper, when the endpoint provides one
    pub id: Option<String>,
    /// Bare identifier used to build a viewer URL
    pub paper_id: Option<String>,
}

impl PaperRecord {
    /// Link for the "View Paper" action: `id` wins, else `viewer_base + paperid`.
    pub fn link(&self, viewer_base: &str) -> Option<String> {
        if let Some(id) = &self.id {
            return Some(id.clone());
        }
        self.paper_id
            .as_ref()
            .map(|paper_id| format!("{viewer_base}{paper_id}"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAuthors {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize)]
struct RawRecord {
    title: String,
    #[serde(rename = "abstract", default)]
    abstract_text: Option<String>,
    #[serde(default)]
    authors: Option<RawAuthors>,
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    paperid: Option<Value>,
}

#[derive(Deserialize)]
struct RawResponse {
    #[serde(default)]
    results: Vec<Value>,
}

/// Strings pass through, numbers are stringified, blanks become `None`.
fn identifier(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => non_blank(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_blank(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

impl From<RawRecord> for PaperRecord {
    fn from(raw: RawRecord) -> Self {
        let authors = raw.authors.and_then(|authors| match authors {
            RawAuthors::One(name) => non_blank(name),
            RawAuthors::Many(names) => non_blank(names.join(", ")),
        });

        Self {
            title: raw.title,
            abstract_text: raw.abstract_text.and_then(non_blank),
            authors,
            id: identifier(raw.id),
            paper_id: identifier(raw.paperid),
        }
    }
}

/// Extract paper records from a response body.
///
/// A body that is not JSON, lacks `results`, or carries a non-array `results`
/// yields an empty list. Entries without a string `title` are skipped.
pub fn parse_results(body: &str) -> Vec<PaperRecord> {
    let response: RawResponse = match serde_json::from_str(body) {
        Ok(response) => response,
        Err(e) => {
            warn!("unusable search payload, treating as no results: {e}");
            return Vec::new();
        }
    };

    let total = response.results.len();
    let papers: Vec<PaperRecord> = response
        .results
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RawRecord>(entry).ok())
        .map(PaperRecord::from)
        .collect();

    if papers.len() < total {
        debug!(
            skipped = total - papers.len(),
            "dropped result entries without a title"
        );
    }
    papers
}

/// Raw HTTP reply handed back by a transport.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for the HTTP exchange with the search endpoint.
///
/// Implementations perform exactly one request per call and never retry.
pub trait SearchTransport: Send + Sync {
    /// POST `payload` as JSON to `url` and return the status and body.
    fn post_json(&self, url: &str, payload: &SearchRequest) -> SearchResult<HttpReply>;
}

/// Blocking reqwest transport.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> SearchResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

impl SearchTransport for HttpTransport {
    fn post_json(&self, url: &str, payload: &SearchRequest) -> SearchResult<HttpReply> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .map_err(|e| SearchError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|e| SearchError::Transport(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

/// Client bound to one endpoint.
#[derive(Clone)]
pub struct SearchClient {
    transport: Arc<dyn SearchTransport>,
    endpoint: String,
}

impl SearchClient {
    pub fn new(transport: Arc<dyn SearchTransport>, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run one search.
    ///
    /// # Errors
    /// `Transport` when the request never completes, `Status` for non-2xx replies.
    pub fn search(&self, query: &str, k: u32) -> SearchResult<Vec<PaperRecord>> {
        let request = SearchRequest {
            query: query.to_string(),
            k,
        };
        debug!(endpoint = %self.endpoint, k, "sending search request");

        let reply = self.transport.post_json(&self.endpoint, &request)?;
        if !reply.is_success() {
            return Err(SearchError::Status(reply.status));
        }
        Ok(parse_results(&reply.body))
    }
}
