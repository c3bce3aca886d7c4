//! In-memory [`Fetcher`] for tests.
//!
//! Responses are registered against URL fragments; the first registered fragment contained
//! in a requested URL answers it. Every request is recorded so tests can assert on the
//! order in which the pipeline touched the network.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;
use url::Url;

use crate::{Fetcher, TransportError, error::Result};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    /// Served as-is; `fetch_json` parses it, so invalid JSON surfaces as a JSON error.
    Body(Bytes),
    Status(u16),
    /// Waits for one notification on the gate before answering.
    Gated(Arc<Notify>, Box<MockResponse>),
}

impl MockResponse {
    pub fn gated(gate: Arc<Notify>, inner: Self) -> Self {
        Self::Gated(gate, Box::new(inner))
    }
}

#[derive(Debug, Default)]
pub struct MockFetcher {
    routes: Mutex<Vec<(String, MockResponse)>>,
    requests: Mutex<Vec<Url>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every URL containing `fragment` with `response`.
    pub fn on(self, fragment: impl Into<String>, response: MockResponse) -> Self {
        self.routes.lock().push((fragment.into(), response));
        self
    }

    pub fn requests(&self) -> Vec<Url> {
        self.requests.lock().clone()
    }

    async fn respond(&self, url: &Url) -> Result<Bytes> {
        self.requests.lock().push(url.clone());
        let route = self
            .routes
            .lock()
            .iter()
            .find(|(fragment, _)| url.as_str().contains(fragment.as_str()))
            .map(|(_, response)| response.clone());

        let mut response = route.ok_or_else(|| TransportError::NotFound(url.to_string()))?;
        loop {
            response = match response {
                MockResponse::Json(value) => return Ok(Bytes::from(serde_json::to_vec(&value)?)),
                MockResponse::Body(body) => return Ok(body),
                MockResponse::Status(status) => {
                    return Err(TransportError::Status {
                        path: url.path().to_string(),
                        status,
                    });
                }
                MockResponse::Gated(gate, inner) => {
                    gate.notified().await;
                    *inner
                }
            };
        }
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let body = self.respond(url).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
        self.respond(url).await
    }
}
