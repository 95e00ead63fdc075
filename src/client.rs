//! Transport client for the label system API.

use crate::cache::{cache_key, Cache, CacheEntry, MemoryCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{envelope_records, is_truthy, IntentRequest, RequestOptions};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// An empty parameter set for listings called without filters.
pub const NO_PARAMS: &[(&str, &str)] = &[];

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
    base_url: String,
    timeout: Duration,
    cache: Option<Arc<dyn Cache>>,
    cache_ttl: Option<Duration>,
    default_headers: HeaderMap,
}

impl ClientBuilder {
    /// Create a new client builder for an absolute base URL such as
    /// `http://localhost:8000/api/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            cache: None,
            cache_ttl: None,
            default_headers: HeaderMap::new(),
        }
    }

    /// Start from application settings: resolved base URL, request timeout
    /// and cache lifetime.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Self::new(config.base_url()?).timeout(config.request_timeout);
        builder.cache_ttl = config.cache_ttl;
        Ok(builder)
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom cache implementation.
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Cache successful GET responses for `ttl`. Caching is off unless set.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Send a header with every request. Per-call headers still win.
    pub fn default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("invalid base URL {:?}: {}", self.base_url, e))
        })?;

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(Error::Http)?;

        let cache: Arc<dyn Cache> = self
            .cache
            .unwrap_or_else(|| Arc::new(MemoryCache::default()));

        Ok(Client {
            base_url: self.base_url,
            http_client,
            default_headers: self.default_headers,
            cache,
            cache_ttl: self.cache_ttl,
            generation: AtomicU64::new(0),
        })
    }
}

/// HTTP client for the label system API.
///
/// Every method issues exactly one request and returns the parsed JSON body
/// as the backend sent it. Failures are logged and returned; nothing is
/// retried.
///
/// # Example
///
/// ```rust,no_run
/// use label_system_client::{Client, NO_PARAMS};
///
/// #[tokio::main]
/// async fn main() -> Result<(), label_system_client::Error> {
///     let client = Client::builder("http://localhost:8000/api/v1").build()?;
///
///     let tree = client.label_tree(NO_PARAMS).await?;
///     println!("{:#}", tree);
///     Ok(())
/// }
/// ```
pub struct Client {
    base_url: String,
    http_client: reqwest::Client,
    default_headers: HeaderMap,
    cache: Arc<dyn Cache>,
    cache_ttl: Option<Duration>,
    /// Bumped on every invalidation; a GET started under an older
    /// generation must not leave its body in the cache.
    generation: AtomicU64,
}

impl Client {
    /// Create a new client builder.
    pub fn builder(base_url: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(base_url)
    }

    /// The absolute base URL endpoints are appended to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Drop every cached response.
    pub fn invalidate_cache(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.clear();
    }

    /// Perform one request against `endpoint` and return the parsed body.
    ///
    /// The body is parsed as JSON whatever the status. A non-success status
    /// becomes [`Error::Api`] carrying the body's `message` (or `detail`),
    /// else `HTTP <status>`.
    pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Value> {
        let url = format!("{}{}", self.base_url, endpoint);
        let method = options.method.unwrap_or(Method::GET);

        let result = self
            .execute(&method, &url, options.body, options.headers)
            .await;
        result.map_err(|e| log_failure(&method, &url, e))
    }

    // === Labels ===

    /// List labels.
    pub async fn list_labels<Q: Serialize + ?Sized>(&self, params: &Q) -> Result<Value> {
        self.get_with_query("/labels", params, always_query).await
    }

    /// Get a label by ID.
    pub async fn get_label(&self, id: impl Display) -> Result<Value> {
        self.get(&format!("/labels/{}", id)).await
    }

    /// Create a label.
    pub async fn create_label<B: Serialize + ?Sized>(&self, label: &B) -> Result<Value> {
        self.post("/labels", label).await
    }

    /// Update a label.
    pub async fn update_label<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        label: &B,
    ) -> Result<Value> {
        self.put(&format!("/labels/{}", id), label).await
    }

    /// Delete a label.
    pub async fn delete_label(&self, id: impl Display) -> Result<Value> {
        self.delete(&format!("/labels/{}", id)).await
    }

    /// Get the label hierarchy.
    pub async fn label_tree<Q: Serialize + ?Sized>(&self, params: &Q) -> Result<Value> {
        self.get_with_query("/labels/tree", params, optional_query).await
    }

    /// Get the direct children of a label.
    pub async fn children_labels(&self, label_code: &str) -> Result<Value> {
        self.get(&format!("/labels/{}/children", label_code)).await
    }

    /// Get the item data attached to a label.
    pub async fn label_items(&self, label_code: &str) -> Result<Value> {
        self.get(&format!("/labels/{}/items", label_code)).await
    }

    // === Rules ===

    /// List rules.
    pub async fn list_rules<Q: Serialize + ?Sized>(&self, params: &Q) -> Result<Value> {
        self.get_with_query("/rules", params, always_query).await
    }

    /// Get a rule by ID.
    pub async fn get_rule(&self, id: impl Display) -> Result<Value> {
        self.get(&format!("/rules/{}", id)).await
    }

    /// Create a rule.
    pub async fn create_rule<B: Serialize + ?Sized>(&self, rule: &B) -> Result<Value> {
        self.post("/rules", rule).await
    }

    /// Update a rule.
    pub async fn update_rule<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        rule: &B,
    ) -> Result<Value> {
        self.put(&format!("/rules/{}", id), rule).await
    }

    /// Delete a rule.
    pub async fn delete_rule(&self, id: impl Display) -> Result<Value> {
        self.delete(&format!("/rules/{}", id)).await
    }

    /// List the rules bound to a label code.
    pub async fn rules_by_label_code(&self, label_code: &str) -> Result<Value> {
        self.get(&format!("/rules/by_label_code/{}", label_code))
            .await
    }

    // === Entity tags ===

    /// List entity tags. The `?` is left off when there are no parameters.
    pub async fn list_entity_tags<Q: Serialize + ?Sized>(&self, params: &Q) -> Result<Value> {
        self.get_with_query("/entity_tags/", params, optional_query).await
    }

    /// Get an entity tag by ID.
    pub async fn get_entity_tag(&self, id: impl Display) -> Result<Value> {
        self.get(&format!("/entity_tags/{}", id)).await
    }

    /// Create an entity tag.
    pub async fn create_entity_tag<B: Serialize + ?Sized>(&self, tag: &B) -> Result<Value> {
        self.post("/entity_tags/", tag).await
    }

    /// Update an entity tag.
    pub async fn update_entity_tag<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        tag: &B,
    ) -> Result<Value> {
        self.put(&format!("/entity_tags/{}", id), tag).await
    }

    /// Delete an entity tag.
    pub async fn delete_entity_tag(&self, id: impl Display) -> Result<Value> {
        self.delete(&format!("/entity_tags/{}", id)).await
    }

    /// Distinct tag names, in first-seen order, computed from the full
    /// entity tag listing.
    ///
    /// Each record contributes `entity_tag_name`, falling back to
    /// `entity_name`; records with neither are skipped, and so are names
    /// that are not strings.
    pub async fn entity_tag_names(&self) -> Result<Vec<String>> {
        let list = self.list_entity_tags(NO_PARAMS).await?;
        Ok(distinct_tag_names(&list))
    }

    /// Tag names from the backend's own name listing endpoint.
    pub async fn entity_tag_name_list(&self) -> Result<Value> {
        self.get("/entity-tags/tag-names/list").await
    }

    /// List the entities carrying a tag.
    pub async fn entities_by_tag_name(&self, tag_name: &str) -> Result<Value> {
        self.get(&format!("/entity-tags/tag/{}/entities", tag_name))
            .await
    }

    // === Intent recognition ===

    /// Recognize the intent of `text`.
    pub async fn recognize_intent(&self, text: &str, context: &Value) -> Result<Value> {
        let body = IntentRequest {
            query: text,
            context,
        };
        self.post("/intent_recognition/recognize", &body).await
    }

    // === Items ===

    /// List items.
    pub async fn list_items<Q: Serialize + ?Sized>(&self, params: &Q) -> Result<Value> {
        self.get_with_query("/items", params, always_query).await
    }

    /// Get an item by ID.
    pub async fn get_item(&self, id: impl Display) -> Result<Value> {
        self.get(&format!("/items/{}", id)).await
    }

    /// Create an item.
    pub async fn create_item<B: Serialize + ?Sized>(&self, item: &B) -> Result<Value> {
        self.post("/items", item).await
    }

    /// Update an item.
    pub async fn update_item<B: Serialize + ?Sized>(
        &self,
        id: impl Display,
        item: &B,
    ) -> Result<Value> {
        self.put(&format!("/items/{}", id), item).await
    }

    /// Delete an item.
    pub async fn delete_item(&self, id: impl Display) -> Result<Value> {
        self.delete(&format!("/items/{}", id)).await
    }

    /// List the items bound to a label code.
    pub async fn items_for_label(&self, label_code: &str) -> Result<Value> {
        self.get(&format!("/items/by_label/{}", label_code)).await
    }

    // === Internal methods ===

    async fn get(&self, endpoint: &str) -> Result<Value> {
        self.request(endpoint, RequestOptions::default()).await
    }

    async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        params: &Q,
        join: fn(&str, &str) -> String,
    ) -> Result<Value> {
        let query = encode_query(params).map_err(|e| log_failure(&Method::GET, path, e))?;
        self.get(&join(path, &query)).await
    }

    async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value> {
        self.send_json(Method::POST, endpoint, body).await
    }

    async fn put<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<Value> {
        self.send_json(Method::PUT, endpoint, body).await
    }

    async fn send_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        endpoint: &str,
        body: &B,
    ) -> Result<Value> {
        let body = serde_json::to_value(body)
            .map_err(|e| log_failure(&method, endpoint, e.into()))?;
        self.request(endpoint, RequestOptions::with_body(method, body))
            .await
    }

    async fn delete(&self, endpoint: &str) -> Result<Value> {
        self.request(endpoint, RequestOptions::method(Method::DELETE))
            .await
    }

    async fn execute(
        &self,
        method: &Method,
        url: &str,
        body: Option<Value>,
        headers: HeaderMap,
    ) -> Result<Value> {
        let key = (*method == Method::GET).then(|| {
            cache_key(method.as_str(), url, header_fingerprint(&headers).as_deref())
        });
        let generation = self.generation.load(Ordering::SeqCst);

        if let (Some(key), Some(_)) = (&key, self.cache_ttl) {
            if let Some(entry) = self.cache.get(key) {
                debug!(url = %url, "serving cached response");
                return Ok(entry.value);
            }
        }

        let mut merged = HeaderMap::new();
        merged.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        merged.extend(self.default_headers.clone());
        merged.extend(headers);

        debug!(method = %method, url = %url, "sending API request");

        let mut req = self.http_client.request(method.clone(), url).headers(merged);
        if let Some(body) = &body {
            req = req.body(serde_json::to_vec(body)?);
        }

        let response = req.send().await.map_err(transport_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_error)?;
        let value: Value = serde_json::from_slice(&bytes)?;

        if !status.is_success() {
            return Err(Error::from_body(status.as_u16(), &value));
        }

        if let Some(ttl) = self.cache_ttl {
            match key {
                Some(key) => {
                    self.cache.set(&key, CacheEntry::new(value.clone(), ttl));
                    // A write finished while this GET was in flight.
                    if self.generation.load(Ordering::SeqCst) != generation {
                        self.cache.delete(&key);
                    }
                }
                None => self.invalidate_cache(),
            }
        }

        Ok(value)
    }
}

fn transport_error(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout
    } else {
        Error::Http(e)
    }
}

fn log_failure(method: &Method, url: &str, e: Error) -> Error {
    error!(method = %method, url = %url, error = %e, "API request failed");
    e
}

/// Per-call headers folded into the cache key, so requests that differ only
/// in headers (tenant, authorization) never share an entry.
fn header_fingerprint(headers: &HeaderMap) -> Option<String> {
    if headers.is_empty() {
        return None;
    }
    let mut pairs: Vec<String> = headers
        .iter()
        .map(|(name, value)| {
            format!("{}={}", name, String::from_utf8_lossy(value.as_bytes()))
        })
        .collect();
    pairs.sort();
    Some(pairs.join("&"))
}

fn encode_query<Q: Serialize + ?Sized>(params: &Q) -> Result<String> {
    Ok(serde_urlencoded::to_string(params)?)
}

/// `path?query`, keeping the `?` even when the query is empty.
fn always_query(path: &str, query: &str) -> String {
    format!("{}?{}", path, query)
}

/// `path?query`, or bare `path` when the query is empty.
fn optional_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query)
    }
}

fn distinct_tag_names(list: &Value) -> Vec<String> {
    let mut seen = HashSet::new();
    envelope_records(list)
        .iter()
        .filter_map(|record| {
            ["entity_tag_name", "entity_name"]
                .iter()
                .filter_map(|field| record.get(field))
                .find(|value| is_truthy(value))
        })
        .filter_map(Value::as_str)
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}
