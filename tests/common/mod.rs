//! Shared fakes for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use m3u_merge::errors::{ProbeError, ProbeResult};
use m3u_merge::models::StreamHeaders;
use m3u_merge::services::{HttpTransport, ProbeResponse};
use m3u_merge::sources::{LoadedSource, SourceLoad};

/// Serves a short MPEG-TS looking body for every URL except the dead ones
#[derive(Default)]
pub struct FakeTransport {
    dead: HashSet<String>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub fn with_dead(urls: &[&str]) -> Self {
        Self {
            dead: urls.iter().map(|u| u.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

struct FakeResponse {
    body: Vec<u8>,
}

#[async_trait]
impl ProbeResponse for FakeResponse {
    fn status(&self) -> u16 {
        200
    }

    fn content_type(&self) -> Option<String> {
        Some("video/mp2t".to_string())
    }

    async fn read_prefix(&mut self, limit: usize) -> ProbeResult<Vec<u8>> {
        Ok(self.body.iter().copied().take(limit).collect())
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn open(&self, url: &str, _headers: &StreamHeaders) -> ProbeResult<Box<dyn ProbeResponse>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(url.to_string());
        if self.dead.contains(url) {
            return Err(ProbeError::Connect("connection refused".to_string()));
        }
        Ok(Box::new(FakeResponse {
            body: vec![0x47; 188],
        }))
    }
}

pub fn source(location: &str, text: &str, trusted: bool) -> LoadedSource {
    LoadedSource {
        location: location.to_string(),
        text: text.to_string(),
        trusted,
    }
}

pub fn load(sources: Vec<LoadedSource>) -> SourceLoad {
    SourceLoad {
        sources,
        reports: Vec::new(),
    }
}
