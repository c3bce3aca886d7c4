//! poifinder - streaming geotagged photo search
//!
//! Given a free-text query and a center point, poifinder searches Flickr for nearby
//! photos and then, for every hit, looks up where the photo was taken and fetches its
//! thumbnail. Each hit is handed to the caller as soon as it is resolved instead of after
//! the whole page, so a map or list can fill in while the search is still running.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use poifinder::{Point, SearchConfig, SearchEvent, SearchOrchestrator};
//!
//! # #[tokio::main]
//! # async fn main() -> poifinder::error::Result<()> {
//! // Reads FLICKR_API_KEY from the environment
//! let config = SearchConfig::from_env()?;
//! let orchestrator = Arc::new(SearchOrchestrator::over_http(config)?);
//!
//! let (task, mut events) = orchestrator.stream("cats", Point::from_lng_lat(-122.4, 37.7));
//! while let Some(event) = events.recv().await {
//!     match event {
//!         SearchEvent::Update(record) => println!("{record}"),
//!         SearchEvent::Complete(records) => println!("{} photos", records.len()),
//!         SearchEvent::Fail(reason) => eprintln!("search failed: {reason}"),
//!         _ => {}
//!     }
//! }
//! task.await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Failure model
//!
//! - Only the initial search can fail a run; the caller then gets a single `fail`.
//! - A hit whose geolocation lookup fails is delivered without a location.
//! - A hit whose image cannot be fetched or decoded is delivered with a 75x75 placeholder.
//!
//! # Guarding against overlapping searches
//!
//! [`SearchSession`] allows one search in flight at a time, keeps the results of the
//! current search and can cancel it.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
pub mod error;
mod record;
mod search;
mod session;
mod thumbnail;

pub use config::{SearchConfig, SearchConfigBuilder};
pub use poifinder_transport as transport;
pub use poifinder_transport::{FlickrEndpoints, Fetcher, RadiusUnits};
pub use record::{MAX_TITLE_CHARS, Point, SearchRecord};
pub use search::{
    ChannelSink, Degradation, LocationError, PhotoDescriptor, ResponseError, ResultSink,
    SearchError, SearchEvent, SearchOrchestrator,
};
pub use session::{SearchHandle, SearchSession, SessionError, SessionState};
pub use thumbnail::{ImageDecoder, ImageError, PLACEHOLDER_SIZE, RasterDecoder, Thumbnail};
pub use tokio_util::sync::CancellationToken;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for poifinder.
///
/// Installs a `tracing` subscriber filtered by `RUST_LOG` when set, or by `level`
/// otherwise. Safe to call more than once; only the first call has an effect.
///
/// # Examples
///
/// ```rust
/// use poifinder::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), poifinder::error::PoiFinderError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::PoiFinderError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("hyper_util=warn".parse()?)
            .add_directive("reqwest=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}
