//! Frame pairing against the NovoFrame backend
//!
//! Only `POST /api/frames/pair` is implemented here; the rest of the backend
//! API belongs to the apps.

use std::future::Future;
use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, Request, StatusCode, Uri, header};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};

const PAIR_PATH: &str = "/api/frames/pair";
const DEFAULT_ERROR: &str = "Failed to pair frame";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// A frame as the backend knows it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub mac_address: String,
    pub name: String,
    /// Fields this client does not interpret (id, owner, timestamps)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error("frame is already paired: {0}")]
    AlreadyPaired(String),
    #[error("{message} (HTTP {status})")]
    Rejected { status: u16, message: String },
    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] hyper::http::uri::InvalidUri),
    #[error("request failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("reading response failed: {0}")]
    Body(#[from] hyper::Error),
    #[error("building request failed: {0}")]
    Http(#[from] hyper::http::Error),
    #[error("unexpected response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// The pairing call, separated so the setup flow can be tested offline
pub trait FrameApi: Send + Sync {
    fn pair_frame(&self, mac_address: &str, name: &str) -> impl Future<Output = Result<Frame, PairError>> + Send;
}

#[derive(Serialize)]
struct PairRequest<'a> {
    mac_address: &'a str,
    name: &'a str,
}

#[derive(Deserialize)]
struct PairResponse {
    frame: Frame,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// Plain-HTTP client for the backend
#[derive(Debug, Clone)]
pub struct HttpFrameApi {
    base_url: String,
    token: Option<String>,
    timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpFrameApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            timeout: REQUEST_TIMEOUT,
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }

    /// Bearer token of the logged-in user
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn post(&self, uri: Uri, body: Vec<u8>) -> Result<(StatusCode, Bytes), PairError> {
        let mut request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(token) = &self.token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request.body(Full::new(Bytes::from(body)))?;

        let response = self.client.request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        Ok((status, body))
    }
}

impl FrameApi for HttpFrameApi {
    async fn pair_frame(&self, mac_address: &str, name: &str) -> Result<Frame, PairError> {
        let uri: Uri = format!("{}{PAIR_PATH}", self.base_url).parse()?;
        let body = serde_json::to_vec(&PairRequest { mac_address, name })?;
        log::info!("pairing frame {mac_address} as {name:?}");

        let (status, body) = tokio::time::timeout(self.timeout, self.post(uri, body))
            .await
            .map_err(|_| PairError::Timeout(self.timeout))??;

        if status.is_success() {
            let response: PairResponse = serde_json::from_slice(&body)?;
            log::debug!("paired frame {}", response.frame.mac_address);
            return Ok(response.frame);
        }
        Err(rejection(status, &body))
    }
}

fn rejection(status: StatusCode, body: &[u8]) -> PairError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.message)
        .unwrap_or_else(|| DEFAULT_ERROR.to_string());
    log::warn!("pairing rejected with {status}: {message}");
    if status == StatusCode::CONFLICT || message.to_lowercase().contains("already paired") {
        return PairError::AlreadyPaired(message);
    }
    PairError::Rejected {
        status: status.as_u16(),
        message,
    }
}
