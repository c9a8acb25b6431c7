//! HTTP search backend
//!
//! Implements [`SearchBackend`] against the Elasticsearch / OpenSearch REST API.
//! Every call is a single request; no retries are attempted so that a count
//! and the data query it planned never observe diverging retried state.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::config::EngineConfig;
use crate::error::EngineError;

use super::dsl::{render_count, render_search};
use super::{EngineQuery, EngineResult, RawHit, SearchBackend, SearchPage, SearchRequest};

/// Search engine client over HTTP.
#[derive(Clone)]
pub struct EngineClient {
    http: reqwest::Client,
    base_url: Url,
    username: Option<String>,
    password: Option<String>,
    saved_objects_index: String,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<RawHit>,
}

impl From<SearchResponse> for SearchPage {
    fn from(resp: SearchResponse) -> Self {
        SearchPage {
            hits: resp.hits.hits,
            scroll_id: resp.scroll_id,
        }
    }
}

impl EngineClient {
    /// Create a client from engine configuration.
    pub fn new(config: &EngineConfig) -> EngineResult<Self> {
        let base_url = Url::parse(&config.url)
            .map_err(|e| EngineError::InvalidUrl(format!("{}: {e}", config.url)))?;
        if base_url.cannot_be_a_base() {
            return Err(EngineError::InvalidUrl(config.url.clone()));
        }

        let http = reqwest::Client::builder()
            .user_agent(format!("ssexport/{}", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
            saved_objects_index: config.saved_objects_index.clone(),
        })
    }

    /// Index holding saved searches and index patterns.
    pub fn saved_objects_index(&self) -> &str {
        &self.saved_objects_index
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> EngineResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| EngineError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> EngineResult<RequestBuilder> {
        let builder = self.http.request(method, self.endpoint(segments)?);
        Ok(match self.username {
            Some(ref user) => builder.basic_auth(user, self.password.as_ref()),
            None => builder,
        })
    }

    /// Send a request and decode a successful JSON body.
    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> EngineResult<T> {
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EngineError::from_response(status.as_u16(), &body));
        }

        trace!("Engine response ({} bytes)", body.len());
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a document by id; `Ok(None)` when the engine reports it missing.
    pub async fn get_document(&self, index: &str, id: &str) -> EngineResult<Option<Value>> {
        let request = self.request(Method::GET, &[index, "_doc", id])?;
        match self.send::<Value>(request).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl SearchBackend for EngineClient {
    async fn max_result_window(&self, index_pattern: &str) -> EngineResult<u64> {
        let request = self
            .request(Method::GET, &[index_pattern, "_settings"])?
            .query(&[("include_defaults", "true")]);
        let settings: Value = self.send(request).await?;
        let window = parse_max_result_window(&settings)?;
        debug!("Max result window for '{}': {}", index_pattern, window);
        Ok(window)
    }

    async fn count(&self, index_pattern: &str, query: &EngineQuery) -> EngineResult<u64> {
        let request = self
            .request(Method::POST, &[index_pattern, "_count"])?
            .json(&render_count(query));
        let resp: CountResponse = self.send(request).await?;
        Ok(resp.count)
    }

    async fn search(&self, index_pattern: &str, request: &SearchRequest) -> EngineResult<SearchPage> {
        let request = self
            .request(Method::POST, &[index_pattern, "_search"])?
            .json(&render_search(request));
        let resp: SearchResponse = self.send(request).await?;
        Ok(resp.into())
    }

    async fn open_scroll(
        &self,
        index_pattern: &str,
        request: &SearchRequest,
        keep_alive: &str,
    ) -> EngineResult<SearchPage> {
        let request = self
            .request(Method::POST, &[index_pattern, "_search"])?
            .query(&[("scroll", keep_alive)])
            .json(&render_search(request));
        let resp: SearchResponse = self.send(request).await?;
        Ok(resp.into())
    }

    async fn scroll(&self, scroll_id: &str, keep_alive: &str) -> EngineResult<SearchPage> {
        let body = json!({ "scroll": keep_alive, "scroll_id": scroll_id });
        let request = self
            .request(Method::POST, &["_search", "scroll"])?
            .json(&body);
        let resp: SearchResponse = self.send(request).await?;
        Ok(resp.into())
    }

    async fn clear_scroll(&self, scroll_id: &str) -> EngineResult<()> {
        let body = json!({ "scroll_id": [scroll_id] });
        let request = self
            .request(Method::DELETE, &["_search", "scroll"])?
            .json(&body);
        let _: Value = self.send(request).await?;
        Ok(())
    }
}

/// Resolve the effective max result window from a `_settings` response.
///
/// An explicit index setting wins over the cluster default. With several
/// concrete indices the smallest window is returned, since one batch size has
/// to be valid for every index the pattern touches.
pub fn parse_max_result_window(settings: &Value) -> EngineResult<u64> {
    let indices = settings
        .as_object()
        .ok_or_else(|| EngineError::Decode("settings response is not an object".into()))?;

    let mut window: Option<u64> = None;
    for (index, entry) in indices {
        let explicit = entry.pointer("/settings/index/max_result_window");
        let default = entry.pointer("/defaults/index/max_result_window");
        let value = explicit.or(default).ok_or_else(|| {
            EngineError::Decode(format!("no max_result_window for index '{index}'"))
        })?;

        let parsed = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse::<u64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            EngineError::Decode(format!("invalid max_result_window '{value}' for index '{index}'"))
        })?;

        window = Some(window.map_or(parsed, |w| w.min(parsed)));
    }

    window.ok_or_else(|| EngineError::Decode("index pattern matched no indices".into()))
}
