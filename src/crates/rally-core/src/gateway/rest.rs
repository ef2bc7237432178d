//! PostgREST gateway
//!
//! Reads go through `GET`/`HEAD` on `{url}/rest/v1/{table}` and are retried
//! on connection failures, timeouts and 5xx answers with exponential
//! backoff. Inserts are a single `POST` and are never retried, so a lost
//! response can't turn into a duplicate row.

use crate::config::{HttpConfig, RallyConfig};
use crate::error::{RallyError, Result};
use crate::gateway::query::{Filter, Query};
use crate::gateway::realtime::RealtimeClient;
use crate::gateway::records::{decode_rows, NewRecord, Record, RecordKind};
use crate::gateway::subscription::Subscription;
use crate::gateway::Gateway;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_SCHEMA: &str = "public";

/// Gateway over a PostgREST endpoint with realtime push
pub struct RestGateway {
    client: Client,
    base_url: String,
    schema: String,
    max_retries: u32,
    retry_delay: Duration,
    backoff_multiplier: f32,
    realtime: Arc<RealtimeClient>,
}

impl RestGateway {
    /// Create a gateway for a project URL
    pub fn new(
        base_url: impl Into<String>,
        anon_key: Option<&str>,
        http: &HttpConfig,
        realtime: Arc<RealtimeClient>,
    ) -> Result<Self> {
        http.validate()?;

        let mut headers = HeaderMap::new();
        if let Some(key) = anon_key {
            headers.insert("apikey", header_value(key)?);
            headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", key))?);
        }

        let user_agent = http
            .user_agent
            .clone()
            .unwrap_or_else(|| format!("rally/{}", env!("CARGO_PKG_VERSION")));

        let client = Client::builder()
            .timeout(http.timeout())
            .user_agent(user_agent)
            .default_headers(headers)
            .build()
            .map_err(|e| RallyError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            schema: DEFAULT_SCHEMA.to_string(),
            max_retries: http.max_retries,
            retry_delay: http.retry_delay(),
            backoff_multiplier: http.backoff_multiplier,
            realtime,
        })
    }

    /// Create a gateway from the loaded configuration
    pub fn from_config(config: &RallyConfig) -> Result<Self> {
        if config.backend.url.trim().is_empty() {
            return Err(RallyError::Config("backend.url is empty".to_string()));
        }
        if config.backend.anon_key.is_none() {
            warn!("No anon key configured, requests are sent unauthenticated");
        }

        let realtime = Arc::new(RealtimeClient::from_config(
            &config.backend,
            &config.realtime,
        ));
        Ok(Self::new(
            config.backend.url.clone(),
            config.backend.anon_key.as_deref(),
            &config.http,
            realtime,
        )?
        .with_schema(config.backend.schema.clone()))
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn realtime(&self) -> &Arc<RealtimeClient> {
        &self.realtime
    }

    fn table_url(&self, kind: RecordKind) -> String {
        format!("{}/rest/v1/{}", self.base_url, kind.table())
    }

    fn request(&self, method: Method, kind: RecordKind) -> RequestBuilder {
        let req = self.client.request(method.clone(), self.table_url(kind));
        if self.schema == DEFAULT_SCHEMA {
            return req;
        }
        let profile_header = if method == Method::POST {
            "Content-Profile"
        } else {
            "Accept-Profile"
        };
        req.header(profile_header, self.schema.as_str())
    }

    /// Send a read request, retrying transient failures
    async fn send_with_retry(&self, req: RequestBuilder) -> Result<Response> {
        let mut attempts = 0;
        let mut delay = self.retry_delay;

        loop {
            let request = req
                .try_clone()
                .ok_or_else(|| RallyError::Other("Failed to clone request".to_string()))?;

            match request.send().await {
                Ok(response) => {
                    if response.status().is_success()
                        || !response.status().is_server_error()
                        || attempts >= self.max_retries
                    {
                        return Ok(response);
                    }
                    debug!(status = response.status().as_u16(), attempt = attempts + 1, "Retrying read");
                }
                Err(e) => {
                    if attempts >= self.max_retries || (!e.is_timeout() && !e.is_connect()) {
                        return Err(RallyError::Http(e));
                    }
                    debug!(error = %e, attempt = attempts + 1, "Retrying read");
                }
            }

            attempts += 1;
            tokio::time::sleep(delay).await;
            delay = next_delay(delay, self.backoff_multiplier);
        }
    }
}

/// Scale the retry delay, keeping the current one when the product is not a
/// representable duration
fn next_delay(delay: Duration, multiplier: f32) -> Duration {
    Duration::try_from_secs_f32(delay.as_secs_f32() * multiplier).unwrap_or(delay)
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| RallyError::Config("anon key is not a valid header value".to_string()))
}

/// PostgREST query parameters for a fetch
fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(filter_params(&query.filters));
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", f.value)))
        .collect()
}

/// Total from a `Content-Range` header such as `0-24/3573` or `*/0`
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Turn a non-success response into a backend error
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    Err(RallyError::Backend {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Gateway for RestGateway {
    async fn fetch_recent(&self, query: &Query) -> Result<Vec<Record>> {
        let req = self
            .request(Method::GET, query.kind)
            .query(&query_params(query));

        let response = check_status(self.send_with_retry(req).await?).await?;
        let rows: Vec<Value> = response.json().await?;
        debug!(kind = %query.kind, rows = rows.len(), "Fetched rows");

        decode_rows(query.kind, rows)
    }

    async fn count(&self, kind: RecordKind, filters: &[Filter]) -> Result<u64> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        params.extend(filter_params(filters));

        let req = self
            .request(Method::HEAD, kind)
            .header("Prefer", "count=exact")
            .query(&params);

        let response = check_status(self.send_with_retry(req).await?).await?;
        response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range)
            .ok_or_else(|| RallyError::Backend {
                status: response.status().as_u16(),
                message: "missing or malformed Content-Range".to_string(),
            })
    }

    async fn insert(&self, record: NewRecord) -> Result<Record> {
        let kind = record.kind();
        let response = self
            .request(Method::POST, kind)
            .header("Prefer", "return=representation")
            .json(&record.to_row())
            .send()
            .await?;

        let response = check_status(response).await?;
        let rows: Vec<Value> = response.json().await?;
        let stored = decode_rows(kind, rows)?
            .into_iter()
            .next()
            .ok_or_else(|| RallyError::Other(format!("Insert into {} returned no row", kind)))?;

        debug!(kind = %kind, id = stored.id(), "Row inserted");
        Ok(stored)
    }

    async fn subscribe_inserts(&self, kind: RecordKind) -> Result<Subscription> {
        self.realtime.subscribe(kind).await
    }
}
