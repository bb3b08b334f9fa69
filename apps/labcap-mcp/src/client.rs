//! # Labcap HTTP Client
//!
//! Wrapper around the Labcap REST API for use by the MCP server.

use serde_json::Value;

/// Errors from the HTTP client layer.
#[derive(Debug)]
pub enum ClientError {
    /// Cannot reach the Labcap server.
    ConnectionFailed(String),
    /// 401 Unauthorized - invalid or missing API key.
    Unauthorized,
    /// 429 Too Many Requests.
    RateLimited,
    /// 404 Not Found - the addressed record or session is gone.
    NotFound(String),
    /// Server returned a 4xx/5xx error.
    ServerError(u16, String),
    /// Failed to parse response body.
    ParseError(String),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectionFailed(url) => write!(f, "Cannot connect to Labcap at {url}"),
            Self::Unauthorized => write!(f, "Unauthorized: invalid or missing API key"),
            Self::RateLimited => write!(f, "Rate limited: too many requests"),
            Self::NotFound(what) => write!(f, "Not found: {what}"),
            Self::ServerError(status, msg) => write!(f, "Server error ({status}): {msg}"),
            Self::ParseError(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ClientError {}

/// HTTP client that wraps calls to the Labcap REST API.
#[derive(Clone)]
pub struct LabcapClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl LabcapClient {
    /// Create a new client pointing at the given Labcap server URL.
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    /// Build a request with optional Bearer auth.
    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    /// Handle HTTP response: check status codes and parse JSON.
    async fn handle_response(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ClientError::RateLimited);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::NotFound(body));
        }
        if status.is_client_error() || status.is_server_error() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::ServerError(status.as_u16(), body));
        }
        resp.json::<Value>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        req.send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))
    }

    /// GET /health
    #[allow(dead_code)]
    pub async fn health(&self) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, "/health");
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// POST /capture → one capture operation (generic JSON body).
    pub async fn capture(&self, body: Value) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::POST, "/capture").json(&body);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /records → search records with optional filters.
    pub async fn find(
        &self,
        record_type: Option<&str>,
        query: Option<&str>,
        category: Option<&str>,
    ) -> Result<Value, ClientError> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(t) = record_type {
            params.push(("record_type", t));
        }
        if let Some(q) = query {
            params.push(("query", q));
        }
        if let Some(c) = category {
            params.push(("category", c));
        }
        let req = self.request(reqwest::Method::GET, "/records").query(&params);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// GET /records/{id} → fetch one record.
    pub async fn get_record(&self, id: &str) -> Result<Value, ClientError> {
        let req = self.request(reqwest::Method::GET, &format!("/records/{id}"));
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }

    /// POST /links → link two records.
    pub async fn link(&self, source_id: &str, target_id: &str) -> Result<Value, ClientError> {
        let body = serde_json::json!({
            "source_id": source_id,
            "target_id": target_id,
        });
        let req = self.request(reqwest::Method::POST, "/links").json(&body);
        let resp = self.send(req).await?;
        self.handle_response(resp).await
    }
}
