//! ERP transport seam: HTTP request/response shapes, the reqwest-backed
//! implementation, and a recording mock for tests.
//!
//! Error mapping lives here: 4xx is final (`erp_permanent` with the
//! ERP-reported message when available), 429 is `rate_limited_upstream`
//! honoring `retry-after`, 5xx and network failures are `erp_transient`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::GatewayError;

/// HTTP method for an ERP call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
}

/// One request against the ERP REST surface.
#[derive(Debug, Clone)]
pub struct ErpRequest {
    pub method: HttpMethod,
    /// Path under the base URL, e.g. `/api/resource/Reservation`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ErpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Decoded ERP response body.
#[derive(Debug, Clone)]
pub struct ErpResponse {
    pub status: u16,
    pub body: Value,
}

/// Transport seam between the adapter and the wire.
#[async_trait]
pub trait ErpTransport: Send + Sync {
    async fn execute(&self, request: ErpRequest) -> Result<ErpResponse, GatewayError>;
}

/// Extracts the ERP-reported message from an error body, falling back to the
/// raw text.
fn erp_message(body: &Value) -> String {
    body.get("message")
        .or_else(|| body.get("exc"))
        .and_then(Value::as_str)
        .map(String::from)
        .unwrap_or_else(|| body.to_string())
}

/// reqwest-backed transport: session-token auth, 30 s timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        session_token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Internal(format!("http client build failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: session_token.into(),
        })
    }
}

#[async_trait]
impl ErpTransport for HttpTransport {
    async fn execute(&self, request: ErpRequest) -> Result<ErpResponse, GatewayError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&url),
            HttpMethod::Post => self.client.post(&url),
            HttpMethod::Put => self.client.put(&url),
        };
        builder = builder
            .header("Authorization", format!("token {}", self.session_token))
            .query(&request.query);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| GatewayError::ErpTransient(format!("network error: {}", e)))?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(GatewayError::RateLimitedUpstream { retry_after });
        }

        let body: Value = response
            .json()
            .await
            .unwrap_or(Value::Null);

        if status.is_client_error() {
            return Err(GatewayError::ErpPermanent {
                status: status.as_u16(),
                message: erp_message(&body),
            });
        }
        if status.is_server_error() {
            return Err(GatewayError::ErpTransient(format!(
                "erp returned {}: {}",
                status.as_u16(),
                erp_message(&body)
            )));
        }

        Ok(ErpResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Scripted transport for tests. Responds via a user-provided function and
/// records every request it sees.
pub struct MockTransport {
    respond: Box<dyn Fn(&ErpRequest) -> Result<ErpResponse, GatewayError> + Send + Sync>,
    requests: Mutex<Vec<ErpRequest>>,
}

impl MockTransport {
    pub fn new(
        respond: impl Fn(&ErpRequest) -> Result<ErpResponse, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers 200 with `{"data": {}}`.
    pub fn ok() -> Self {
        Self::new(|_| {
            Ok(ErpResponse {
                status: 200,
                body: serde_json::json!({"data": {}}),
            })
        })
    }

    /// Requests recorded so far.
    pub fn requests(&self) -> Vec<ErpRequest> {
        self.requests.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|g| g.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ErpTransport for MockTransport {
    async fn execute(&self, request: ErpRequest) -> Result<ErpResponse, GatewayError> {
        let result = (self.respond)(&request);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Message extraction prefers `message`, then `exc`, then raw.
    #[test]
    fn erp_message_extraction() {
        assert_eq!(
            erp_message(&serde_json::json!({"message": "Room not found"})),
            "Room not found"
        );
        assert_eq!(
            erp_message(&serde_json::json!({"exc": "ValidationError"})),
            "ValidationError"
        );
        assert_eq!(erp_message(&serde_json::json!({"other": 1})), r#"{"other":1}"#);
    }

    /// **Scenario**: The mock records requests and replays scripted answers.
    #[tokio::test]
    async fn mock_records_requests() {
        let transport = MockTransport::ok();
        let request = ErpRequest::get("/api/resource/Room").with_query("limit_page_length", "20");
        transport.execute(request).await.unwrap();
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.requests()[0].path, "/api/resource/Room");
    }

    /// **Scenario**: A network-level failure maps to erp_transient.
    #[tokio::test]
    async fn unreachable_host_is_transient() {
        let transport =
            HttpTransport::new("http://127.0.0.1:1", "tok", Duration::from_millis(200)).unwrap();
        let err = transport
            .execute(ErpRequest::get("/api/resource/Room"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "erp_transient");
    }
}
