//! Executes one search-and-enrich run.
//!
//! The run is a three stage pipeline: the photo search itself, then for every hit a
//! geolocation lookup and an image fetch. Only the first stage can fail the run. A hit
//! whose lookup or image fails is still delivered, without a location or with the
//! placeholder thumbnail, so one bad photo never costs the caller the rest of the page.

use std::{sync::Arc, time::Instant};

use futures::{StreamExt, stream};
use poifinder_transport::Fetcher;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::{
    LocationError, SearchError,
    response::{self, GeoLocationResponse, PhotoDescriptor, PhotoSearchPage},
    sink::{ChannelSink, Degradation, ResultSink, SearchEvent},
};
use crate::{
    config::SearchConfig,
    record::{Point, SearchRecord},
    thumbnail::{ImageDecoder, ImageError, Thumbnail},
};

enum Outcome {
    Completed(Vec<SearchRecord>),
    Cancelled(Vec<SearchRecord>),
}

struct EnrichedHit {
    record: SearchRecord,
    degradations: Vec<Degradation>,
}

/// Runs searches against a [`Fetcher`] and streams the enriched hits to a [`ResultSink`].
///
/// Hits are enriched in response order. With `enrichment_concurrency` above one, several
/// hits are in flight at once but results are still handed to the sink strictly in
/// response order.
///
/// # Examples
///
/// ```rust,no_run
/// use poifinder::{Point, SearchConfig, SearchEvent, SearchOrchestrator};
/// use std::sync::Arc;
///
/// # async fn demo() -> poifinder::error::Result<()> {
/// let config = SearchConfig::from_env()?;
/// let orchestrator = Arc::new(SearchOrchestrator::over_http(config)?);
///
/// let (task, mut events) = orchestrator.stream("cats", Point::from_lng_lat(-122.4, 37.7));
/// while let Some(event) = events.recv().await {
///     if let SearchEvent::Update(record) = event {
///         println!("{record}");
///     }
/// }
/// task.await?;
/// # Ok(())
/// # }
/// ```
pub struct SearchOrchestrator {
    fetcher: Arc<dyn Fetcher>,
    decoder: Arc<dyn ImageDecoder>,
    config: SearchConfig,
}

impl SearchOrchestrator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        decoder: Arc<dyn ImageDecoder>,
        config: SearchConfig,
    ) -> Self {
        Self {
            fetcher,
            decoder,
            config,
        }
    }

    /// An orchestrator talking HTTP through reqwest and decoding with the `image` crate.
    #[cfg(feature = "http")]
    pub fn over_http(config: SearchConfig) -> crate::error::Result<Self> {
        let fetcher = poifinder_transport::HttpFetcher::new(config.request_timeout)?;
        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(crate::thumbnail::RasterDecoder),
            config,
        ))
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Search for `query` around `center`, reporting everything through `sink`.
    pub async fn run(&self, query: &str, center: Point, sink: &mut dyn ResultSink) {
        self.run_cancellable(query, center, sink, &CancellationToken::new())
            .await;
    }

    /// Like [`run`](Self::run), but stops before the next hit once `cancel` fires and
    /// ends with `cancelled` instead of `complete`.
    #[instrument(name = "Search run", skip(self, sink, cancel), level = "info")]
    pub async fn run_cancellable(
        &self,
        query: &str,
        center: Point,
        sink: &mut dyn ResultSink,
        cancel: &CancellationToken,
    ) {
        let t_run = Instant::now();
        match self.execute(query, center, sink, cancel).await {
            Ok(Outcome::Completed(records)) => {
                info!(records = records.len(), elapsed = ?t_run.elapsed(), "Search complete");
                sink.complete(records);
            }
            Ok(Outcome::Cancelled(records)) => {
                info!(records = records.len(), elapsed = ?t_run.elapsed(), "Search cancelled");
                sink.cancelled(records);
            }
            Err(e) => {
                error!(error = %e, elapsed = ?t_run.elapsed(), "Search failed");
                sink.fail(e.to_string());
            }
        }
    }

    /// Run on the current tokio runtime.
    pub fn spawn(
        self: &Arc<Self>,
        query: impl Into<String>,
        center: Point,
        mut sink: impl ResultSink + 'static,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let query = query.into();
        tokio::spawn(async move {
            this.run_cancellable(&query, center, &mut sink, &cancel)
                .await;
        })
    }

    /// Run on the current tokio runtime, delivering events over a channel.
    ///
    /// The channel closes after the terminal event.
    pub fn stream(
        self: &Arc<Self>,
        query: impl Into<String>,
        center: Point,
    ) -> (JoinHandle<()>, UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = self.spawn(query, center, ChannelSink::new(tx), CancellationToken::new());
        (task, rx)
    }

    async fn execute(
        &self,
        query: &str,
        center: Point,
        sink: &mut dyn ResultSink,
        cancel: &CancellationToken,
    ) -> Result<Outcome, SearchError> {
        if cancel.is_cancelled() {
            return Ok(Outcome::Cancelled(Vec::new()));
        }

        let hits = self.search(query, center).await?;
        info!(hits = hits.len(), "Search returned hits");

        let mut records = Vec::with_capacity(hits.len());
        // `buffered` yields in input order however the futures finish.
        let mut enriched = stream::iter(hits)
            .map(move |hit| async move {
                if cancel.is_cancelled() {
                    return None;
                }
                Some(self.enrich(hit).await)
            })
            .buffered(self.config.enrichment_concurrency.max(1));

        while let Some(next) = enriched.next().await {
            let Some(EnrichedHit {
                record,
                degradations,
            }) = next
            else {
                return Ok(Outcome::Cancelled(records));
            };

            for degradation in degradations {
                sink.degraded(record.photo_id(), degradation);
            }
            sink.update(record.clone());
            records.push(record);
        }

        Ok(Outcome::Completed(records))
    }

    async fn search(&self, query: &str, center: Point) -> Result<Vec<PhotoDescriptor>, SearchError> {
        let url = self
            .config
            .endpoints
            .search_url(&self.config.search_params(query, center));
        let document = self.fetcher.fetch_json(&url).await?;
        let page: PhotoSearchPage = response::parse(document)?;

        let mut hits = page.photos.photo;
        hits.truncate(self.config.per_page as usize);
        if let Some(index) = hits.iter().position(|hit| hit.id.trim().is_empty()) {
            return Err(SearchError::InvalidHit {
                index,
                reason: "empty photo id",
            });
        }
        Ok(hits)
    }

    #[instrument(name = "Enrich hit", skip_all, fields(photo_id = %hit.id), level = "debug")]
    async fn enrich(&self, hit: PhotoDescriptor) -> EnrichedHit {
        let mut degradations = Vec::new();

        let location = match self.locate(&hit.id).await {
            Ok(point) => Some(point),
            Err(e) => {
                warn!(photo_id = %hit.id, error = %e, "Geolocation failed, continuing without location");
                degradations.push(Degradation::LocationUnavailable(e.to_string()));
                None
            }
        };

        let thumbnail = match self.thumbnail(&hit).await {
            Ok(thumbnail) => thumbnail,
            Err(e) => {
                warn!(photo_id = %hit.id, error = %e, "Image unavailable, substituting placeholder");
                degradations.push(Degradation::PlaceholderImage(e.to_string()));
                Thumbnail::placeholder(self.config.placeholder_size)
            }
        };

        debug!(
            located = location.is_some(),
            placeholder = thumbnail.is_placeholder(),
            "Hit enriched"
        );
        EnrichedHit {
            record: SearchRecord::new(
                &hit.title, hit.id, hit.server, hit.secret, location, thumbnail,
            ),
            degradations,
        }
    }

    async fn locate(&self, photo_id: &str) -> Result<Point, LocationError> {
        let url = self.config.endpoints.geo_location_url(photo_id);
        let document = self.fetcher.fetch_json(&url).await?;
        let response: GeoLocationResponse = response::parse(document)?;
        Ok(response.into())
    }

    async fn thumbnail(&self, hit: &PhotoDescriptor) -> Result<Thumbnail, ImageError> {
        let url = self
            .config
            .endpoints
            .image_url(&hit.server, &hit.id, &hit.secret)?;
        let bytes = self.fetcher.fetch_bytes(&url).await?;
        let decoder = Arc::clone(&self.decoder);
        tokio::task::spawn_blocking(move || decoder.decode(&bytes)).await?
    }
}
