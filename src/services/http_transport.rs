//! HTTP seam used by the liveness probe
//!
//! The probe only needs a status, a content type and a bounded prefix of
//! the body, so that is all the transport exposes. Tests swap in fakes.

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;

use crate::config::ProbeConfig;
use crate::errors::{AppError, AppResult, ProbeResult};
use crate::models::StreamHeaders;

/// Response of one probe request; the body is only read on demand
#[async_trait]
pub trait ProbeResponse: Send {
    fn status(&self) -> u16;

    fn content_type(&self) -> Option<String>;

    /// Read at most `limit` bytes of the body
    async fn read_prefix(&mut self, limit: usize) -> ProbeResult<Vec<u8>>;
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn open(&self, url: &str, headers: &StreamHeaders) -> ProbeResult<Box<dyn ProbeResponse>>;
}

/// reqwest-backed transport. Redirects are not followed: a 3xx response is
/// judged by the accepted status table like any other. Timeouts are applied
/// per attempt by the caller.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ProbeConfig) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent(config.default_user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|e| AppError::internal(format!("Failed to build probe HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn open(&self, url: &str, headers: &StreamHeaders) -> ProbeResult<Box<dyn ProbeResponse>> {
        let mut request = self.client.get(url);
        for (name, value) in headers.pairs() {
            request = request.header(name, value);
        }
        let response = request.send().await?;
        Ok(Box::new(ReqwestResponse { response }))
    }
}

struct ReqwestResponse {
    response: reqwest::Response,
}

#[async_trait]
impl ProbeResponse for ReqwestResponse {
    fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    fn content_type(&self) -> Option<String> {
        self.response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    }

    async fn read_prefix(&mut self, limit: usize) -> ProbeResult<Vec<u8>> {
        let mut collected: Vec<u8> = Vec::with_capacity(limit.min(8192));
        while collected.len() < limit {
            let Some(chunk) = self.response.chunk().await? else {
                break;
            };
            let take = chunk.len().min(limit - collected.len());
            collected.extend_from_slice(&chunk[..take]);
        }
        Ok(collected)
    }
}
