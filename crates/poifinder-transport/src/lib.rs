//! Transport layer for the poifinder search pipeline.
//!
//! The pipeline only ever needs two things from the network: "give me this URL as JSON"
//! and "give me this URL as bytes". Both sit behind the [`Fetcher`] trait so the core can
//! be driven by the reqwest-backed [`HttpFetcher`] in production and by an in-memory
//! fetcher in tests. [`FlickrEndpoints`] knows how to address the three requests a search
//! run makes.

pub mod endpoints;
pub mod fetch;
#[cfg(any(test, feature = "test_util"))]
pub mod mock;

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum TransportError {
        #[cfg(feature = "http")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Unexpected status {status} from {path}")]
        Status { path: String, status: u16 },
        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
        #[error("Invalid URL: {0}")]
        Url(#[from] url::ParseError),
        #[error("No response registered for {0}")]
        NotFound(String),
    }

    pub type Result<T> = std::result::Result<T, TransportError>;
}

pub use endpoints::{FlickrEndpoints, PhotoSearchParams, RadiusUnits};
pub use error::{Result, TransportError};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::Fetcher;
pub use url::Url;
