use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use url::Url;

use super::error::Result;

/// The HTTP capability the search pipeline consumes.
///
/// Non-success statuses must surface as errors so callers never mistake an error page for
/// a document or an image.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch_json(&self, url: &Url) -> Result<Value>;

    async fn fetch_bytes(&self, url: &Url) -> Result<Bytes>;
}

#[cfg(feature = "http")]
pub use http::HttpFetcher;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::{Client, Response};
    use serde_json::Value;
    use tracing::{debug, instrument};
    use url::Url;

    use super::Fetcher;
    use crate::{TransportError, error::Result};

    /// [`Fetcher`] backed by a shared `reqwest` client.
    #[derive(Debug, Clone)]
    pub struct HttpFetcher {
        client: Client,
    }

    impl HttpFetcher {
        pub fn new(timeout: Duration) -> Result<Self> {
            let client = Client::builder()
                .timeout(timeout)
                .user_agent(concat!("poifinder/", env!("CARGO_PKG_VERSION")))
                .build()?;
            Ok(Self { client })
        }

        pub const fn with_client(client: Client) -> Self {
            Self { client }
        }

        async fn get(&self, url: &Url) -> Result<Response> {
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    path: url.path().to_string(),
                    status: status.as_u16(),
                });
            }
            Ok(response)
        }
    }

    // Only host and path are recorded: the query carries the api key.
    #[async_trait]
    impl Fetcher for HttpFetcher {
        #[instrument(name = "Fetch JSON", skip_all, fields(host = url.host_str(), path = url.path()), level = "debug")]
        async fn fetch_json(&self, url: &Url) -> Result<Value> {
            let body = self.get(url).await?.bytes().await?;
            debug!(bytes = body.len(), "Received JSON body");
            Ok(serde_json::from_slice(&body)?)
        }

        #[instrument(name = "Fetch bytes", skip_all, fields(host = url.host_str(), path = url.path()), level = "debug")]
        async fn fetch_bytes(&self, url: &Url) -> Result<Bytes> {
            let body = self.get(url).await?.bytes().await?;
            debug!(bytes = body.len(), "Received body");
            Ok(body)
        }
    }
}
