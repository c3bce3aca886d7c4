//! The search-and-enrich pipeline.
//!
//! A run issues one photo search, then geolocates and fetches the thumbnail of every hit,
//! streaming each finished [`SearchRecord`](crate::SearchRecord) through a [`ResultSink`].

pub use error::{LocationError, SearchError};
mod orchestrator;
mod response;
mod sink;

pub use orchestrator::SearchOrchestrator;
pub use response::{PhotoDescriptor, ResponseError};
pub use sink::{ChannelSink, Degradation, ResultSink, SearchEvent};

mod error {
    use poifinder_transport::TransportError;
    use thiserror::Error;

    use super::response::ResponseError;

    /// Failure of the initial search request. Ends the run with `fail`.
    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("Search request failed: {0}")]
        Transport(#[from] TransportError),
        #[error("Search response rejected: {0}")]
        Response(#[from] ResponseError),
        #[error("Search hit {index} is invalid: {reason}")]
        InvalidHit { index: usize, reason: &'static str },
    }

    /// Failure of one hit's geolocation lookup. Recovered by leaving the location absent.
    #[derive(Error, Debug)]
    pub enum LocationError {
        #[error("Geolocation request failed: {0}")]
        Transport(#[from] TransportError),
        #[error("Geolocation response rejected: {0}")]
        Response(#[from] ResponseError),
    }
}
