//! ERP REST adapter.
//!
//! Session-token-authenticated client over [`ErpTransport`], with client-side
//! rate limiting (token bucket), an idempotency cache for writes, and a
//! circuit breaker for upstream throttling. One adapter instance per session;
//! the bucket and cache are never shared across sessions.

mod circuit;
mod idempotency;
mod rate_limit;
mod transport;

pub use circuit::{BreakerSnapshot, CircuitBreaker};
pub use idempotency::IdempotencyCache;
pub use rate_limit::TokenBucket;
pub use transport::{ErpRequest, ErpResponse, ErpTransport, HttpMethod, HttpTransport, MockTransport};

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::config::GatewayConfig;
use crate::error::GatewayError;

/// Throttles tolerated before the circuit opens.
const BREAKER_THRESHOLD: u32 = 5;
/// How long an open circuit fails fast before probing.
const BREAKER_RESET: Duration = Duration::from_secs(30);

/// One item of a bulk write.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct BulkItem {
    pub name: String,
    pub data: Value,
}

/// Outcome of a bulk write: per-item results in input order.
#[derive(Debug, Default, serde::Serialize)]
pub struct BulkResult {
    pub success_count: usize,
    pub error_count: usize,
    pub results: Vec<Value>,
    pub errors: Vec<Value>,
}

/// ERP adapter: document reads/writes, reports, whitelisted methods.
pub struct ErpClient {
    transport: Arc<dyn ErpTransport>,
    bucket: TokenBucket,
    cache: IdempotencyCache,
    breaker: CircuitBreaker,
    bulk_max_batch: usize,
}

impl ErpClient {
    pub fn new(transport: Arc<dyn ErpTransport>, config: &GatewayConfig) -> Self {
        Self {
            transport,
            bucket: TokenBucket::new(config.rate_limit_capacity, config.rate_limit_per_sec),
            cache: IdempotencyCache::new(config.idempotency_ttl),
            breaker: CircuitBreaker::new(BREAKER_THRESHOLD, BREAKER_RESET),
            bulk_max_batch: config.bulk_max_batch,
        }
    }

    pub fn breaker_snapshot(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }

    /// Unwraps the Frappe-style `{"data": ...}` / `{"message": ...}` envelope.
    fn extract_payload(body: Value) -> Value {
        match body {
            Value::Object(mut obj) => {
                if let Some(data) = obj.remove("data") {
                    data
                } else if let Some(message) = obj.remove("message") {
                    message
                } else {
                    Value::Object(obj)
                }
            }
            other => other,
        }
    }

    /// Rate-limited, breaker-gated transport call.
    async fn execute(&self, request: ErpRequest) -> Result<Value, GatewayError> {
        self.breaker.check()?;
        self.bucket.acquire().await;
        match self.transport.execute(request).await {
            Ok(response) => {
                self.breaker.record_success();
                Ok(Self::extract_payload(response.body))
            }
            Err(e @ GatewayError::RateLimitedUpstream { .. }) => {
                self.breaker.record_throttle();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Write path with the idempotency cache: a repeat of the same
    /// `(method, doctype, payload)` within the TTL returns the cached result
    /// flagged `from_cache` and performs no network call.
    async fn cached_write(
        &self,
        method: &str,
        doctype: &str,
        payload: Value,
        request: ErpRequest,
    ) -> Result<Value, GatewayError> {
        let key = self.cache.key(method, doctype, &payload);
        if let Some(mut hit) = self.cache.get(&key).await {
            tracing::debug!(method, doctype, "idempotency cache hit, skipping network call");
            if let Some(obj) = hit.as_object_mut() {
                obj.insert("from_cache".into(), Value::Bool(true));
            }
            return Ok(hit);
        }
        let result = self.execute(request).await?;
        self.cache.put(key, result.clone()).await;
        Ok(result)
    }

    /// `GET /api/resource/{doctype}` with JSON filters/fields. Empty filters
    /// return the first `limit` rows (default 20).
    pub async fn search(
        &self,
        doctype: &str,
        filters: &Value,
        fields: Option<&Value>,
        limit: Option<u32>,
    ) -> Result<Value, GatewayError> {
        let mut request = ErpRequest::get(format!("/api/resource/{}", doctype))
            .with_query("filters", filters.to_string())
            .with_query("limit_page_length", limit.unwrap_or(20).to_string());
        if let Some(fields) = fields {
            request = request.with_query("fields", fields.to_string());
        }
        self.execute(request).await
    }

    /// `GET /api/resource/{doctype}/{name}`.
    pub async fn get(&self, doctype: &str, name: &str) -> Result<Value, GatewayError> {
        self.execute(ErpRequest::get(format!("/api/resource/{}/{}", doctype, name)))
            .await
    }

    /// `POST /api/resource/{doctype}`. Idempotent within the cache TTL.
    pub async fn create(&self, doctype: &str, data: &Value) -> Result<Value, GatewayError> {
        let request = ErpRequest::post(
            format!("/api/resource/{}", doctype),
            json!({"data": data}),
        );
        self.cached_write("create", doctype, data.clone(), request).await
    }

    /// `PUT /api/resource/{doctype}/{name}`. Idempotent within the cache TTL.
    pub async fn update(
        &self,
        doctype: &str,
        name: &str,
        data: &Value,
    ) -> Result<Value, GatewayError> {
        let payload = json!({"name": name, "data": data});
        let request = ErpRequest::put(
            format!("/api/resource/{}/{}", doctype, name),
            json!({"data": data}),
        );
        self.cached_write("update", doctype, payload, request).await
    }

    /// Submits a draft document.
    pub async fn submit(&self, doctype: &str, name: &str) -> Result<Value, GatewayError> {
        let payload = json!({"doctype": doctype, "name": name});
        let request = ErpRequest::post("/api/method/frappe.client.submit", payload.clone());
        self.cached_write("submit", doctype, payload, request).await
    }

    /// Cancels a submitted document.
    pub async fn cancel(&self, doctype: &str, name: &str) -> Result<Value, GatewayError> {
        let payload = json!({"doctype": doctype, "name": name});
        let request = ErpRequest::post("/api/method/frappe.client.cancel", payload.clone());
        self.cached_write("cancel", doctype, payload, request).await
    }

    /// Runs a named report with filters.
    pub async fn run_report(
        &self,
        report_name: &str,
        filters: &Value,
    ) -> Result<Value, GatewayError> {
        self.execute(ErpRequest::post(
            "/api/method/frappe.desk.query_report.run",
            json!({"report_name": report_name, "filters": filters}),
        ))
        .await
    }

    /// `POST /api/method/{method}` with arbitrary args.
    pub async fn call_method(&self, method: &str, args: &Value) -> Result<Value, GatewayError> {
        self.execute(ErpRequest::post(format!("/api/method/{}", method), args.clone()))
            .await
    }

    /// Sequential per-document updates, capped at the configured batch size.
    /// Over the cap fails with `batch_limit_exceeded` before any write.
    pub async fn bulk_update(
        &self,
        doctype: &str,
        updates: &[BulkItem],
    ) -> Result<BulkResult, GatewayError> {
        if updates.len() > self.bulk_max_batch {
            return Err(GatewayError::BatchLimitExceeded {
                limit: self.bulk_max_batch,
                requested: updates.len(),
            });
        }
        let mut outcome = BulkResult::default();
        for item in updates {
            match self.update(doctype, &item.name, &item.data).await {
                Ok(result) => {
                    outcome.success_count += 1;
                    outcome.results.push(result);
                }
                Err(e) => {
                    outcome.error_count += 1;
                    outcome
                        .errors
                        .push(json!({"name": item.name, "error": e.code(), "message": e.to_string()}));
                }
            }
        }
        Ok(outcome)
    }
}
