//! At most one search in flight.
//!
//! [`SearchSession`] sits between a UI and the [`SearchOrchestrator`]. It refuses to start
//! a search while the previous one has not reached its terminal event, keeps the records
//! of the current search, and lets the caller cancel the run it started.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::{
    record::{Point, SearchRecord},
    search::{Degradation, ResultSink, SearchOrchestrator},
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("A search is already in flight; wait for it to finish or cancel it")]
    SearchInFlight,
}

/// Lifecycle of the session's current search.
///
/// `Completed`, `Failed` and `Cancelled` behave like `Idle`: a new search may start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Running)
    }
}

#[derive(Debug, Default)]
struct Shared {
    state: SessionState,
    results: Vec<SearchRecord>,
    cancel: Option<CancellationToken>,
    /// Bumped on every start so a finished run can never touch its successor's state.
    generation: u64,
}

/// Guards a single in-flight search and accumulates its results.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
///
/// use poifinder::{ChannelSink, Point, SearchConfig, SearchOrchestrator, SearchSession};
///
/// # async fn demo() -> poifinder::error::Result<()> {
/// let orchestrator = Arc::new(SearchOrchestrator::over_http(SearchConfig::from_env()?)?);
/// let session = SearchSession::new(orchestrator, tokio::runtime::Handle::current());
///
/// let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
/// let handle = session.start("cats", Point::from_lng_lat(-122.4, 37.7), ChannelSink::new(tx))?;
///
/// // Rejected: the first search has not finished yet.
/// assert!(session.start("dogs", Point::from_lng_lat(-122.4, 37.7), ChannelSink::new(
///     tokio::sync::mpsc::unbounded_channel().0,
/// )).is_err());
///
/// while let Some(event) = events.recv().await {
///     println!("{event:?}");
/// }
/// handle.wait().await?;
/// println!("{} results", session.results().len());
/// # Ok(())
/// # }
/// ```
pub struct SearchSession {
    orchestrator: Arc<SearchOrchestrator>,
    runtime: Handle,
    shared: Arc<Mutex<Shared>>,
}

impl SearchSession {
    pub fn new(orchestrator: Arc<SearchOrchestrator>, runtime: Handle) -> Self {
        Self {
            orchestrator,
            runtime,
            shared: Arc::default(),
        }
    }

    pub const fn orchestrator(&self) -> &Arc<SearchOrchestrator> {
        &self.orchestrator
    }

    /// Start a search unless one is already in flight.
    ///
    /// On success the previous results are cleared and the run is spawned on the
    /// session's runtime; its events reach `sink` after the session has recorded them.
    /// A rejected start has no effect on the search in flight.
    pub fn start(
        &self,
        query: impl Into<String>,
        center: Point,
        sink: impl ResultSink + 'static,
    ) -> Result<SearchHandle, SessionError> {
        let query = query.into();
        let cancel = CancellationToken::new();
        let generation = {
            let mut shared = self.shared.lock();
            if shared.state.is_in_flight() {
                warn!(%query, "Rejected search start, another search is in flight");
                return Err(SessionError::SearchInFlight);
            }
            shared.state = SessionState::Running;
            shared.results.clear();
            shared.cancel = Some(cancel.clone());
            shared.generation += 1;
            shared.generation
        };
        info!(%query, %center, generation, "Starting search");

        let mut observer = SessionSink {
            shared: Arc::clone(&self.shared),
            generation,
            inner: sink,
        };
        let orchestrator = Arc::clone(&self.orchestrator);
        let run_cancel = cancel.clone();
        let task = self.runtime.spawn(async move {
            orchestrator
                .run_cancellable(&query, center, &mut observer, &run_cancel)
                .await;
        });

        Ok(SearchHandle { task, cancel })
    }

    /// Request cancellation of the search in flight. Returns `false` when there is none.
    pub fn cancel(&self) -> bool {
        let shared = self.shared.lock();
        match (&shared.cancel, shared.state.is_in_flight()) {
            (Some(token), true) => {
                token.cancel();
                true
            }
            _ => false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.lock().state
    }

    pub fn is_in_flight(&self) -> bool {
        self.state().is_in_flight()
    }

    /// Records delivered so far by the current (or last) search.
    pub fn results(&self) -> Vec<SearchRecord> {
        self.shared.lock().results.clone()
    }
}

/// Handle on a started search.
#[derive(Debug)]
pub struct SearchHandle {
    task: JoinHandle<()>,
    cancel: CancellationToken,
}

impl SearchHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait until the run has delivered its terminal event.
    pub async fn wait(self) -> crate::error::Result<()> {
        Ok(self.task.await?)
    }
}

/// Records events into the session, then forwards them.
///
/// The session state changes before the caller's terminal hook runs, so the caller may
/// start the next search from inside `complete` or `fail`.
struct SessionSink<S> {
    shared: Arc<Mutex<Shared>>,
    generation: u64,
    inner: S,
}

impl<S> SessionSink<S> {
    fn finish(&self, state: SessionState) {
        let mut shared = self.shared.lock();
        if shared.generation == self.generation {
            shared.state = state;
            shared.cancel = None;
        }
    }
}

impl<S: ResultSink> ResultSink for SessionSink<S> {
    fn update(&mut self, record: SearchRecord) {
        {
            let mut shared = self.shared.lock();
            if shared.generation == self.generation {
                shared.results.push(record.clone());
            }
        }
        self.inner.update(record);
    }

    fn complete(&mut self, records: Vec<SearchRecord>) {
        self.finish(SessionState::Completed);
        self.inner.complete(records);
    }

    fn fail(&mut self, reason: String) {
        self.finish(SessionState::Failed);
        self.inner.fail(reason);
    }

    fn cancelled(&mut self, records: Vec<SearchRecord>) {
        self.finish(SessionState::Cancelled);
        self.inner.cancelled(records);
    }

    fn degraded(&mut self, photo_id: &str, degradation: Degradation) {
        self.inner.degraded(photo_id, degradation);
    }
}

// A run that never reached its terminal event (panicking sink, aborted task) must not
// leave the session stuck in flight.
impl<S> Drop for SessionSink<S> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        if shared.generation == self.generation && shared.state.is_in_flight() {
            warn!(generation = self.generation, "Search ended without a terminal event");
            shared.state = SessionState::Failed;
            shared.cancel = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, RgbaImage};
    use poifinder_transport::mock::{MockFetcher, MockResponse};
    use serde_json::json;
    use tokio::sync::{
        Notify,
        mpsc::{self, UnboundedReceiver},
    };

    use super::*;
    use crate::{
        config::SearchConfig,
        search::{ChannelSink, SearchEvent},
        thumbnail::RasterDecoder,
    };

    fn png() -> bytes::Bytes {
        let mut buffer = Cursor::new(Vec::new());
        RgbaImage::new(2, 2)
            .write_to(&mut buffer, ImageFormat::Png)
            .unwrap();
        buffer.into_inner().into()
    }

    fn session(search: MockResponse) -> SearchSession {
        let fetcher = MockFetcher::new()
            .on("flickr.photos.search", search)
            .on(
                "photo_id=",
                MockResponse::Json(json!({"photo": {"location": {"latitude": 1, "longitude": 2}}, "stat": "ok"})),
            )
            .on("images.test", MockResponse::Body(png()));
        let config = SearchConfig::builder("k")
            .rest_base("http://flickr.test/rest/")
            .image_base("http://images.test/")
            .build()
            .unwrap();
        let orchestrator =
            SearchOrchestrator::new(Arc::new(fetcher), Arc::new(RasterDecoder), config);
        SearchSession::new(Arc::new(orchestrator), Handle::current())
    }

    fn page(ids: &[&str]) -> MockResponse {
        let photos: Vec<_> = ids
            .iter()
            .map(|id| json!({"id": id, "server": "1", "secret": "s", "title": id}))
            .collect();
        MockResponse::Json(json!({"photos": {"photo": photos}, "stat": "ok"}))
    }

    fn channel() -> (ChannelSink, UnboundedReceiver<SearchEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink::new(tx), rx)
    }

    async fn drain(mut rx: UnboundedReceiver<SearchEvent>) -> Vec<SearchEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_start_runs_to_completion() {
        let session = session(page(&["1", "2"]));
        assert_eq!(session.state(), SessionState::Idle);

        let (sink, rx) = channel();
        let handle = session.start("cats", Point::from_lng_lat(0.0, 0.0), sink).unwrap();
        assert!(session.is_in_flight());

        handle.wait().await.unwrap();
        let events = drain(rx).await;

        assert_eq!(session.state(), SessionState::Completed);
        assert_eq!(session.results().len(), 2);
        assert_eq!(events.len(), 3);
        assert!(events[2].is_terminal());
    }

    #[tokio::test]
    async fn test_start_while_in_flight_is_rejected() {
        let gate = Arc::new(Notify::new());
        let session = session(MockResponse::gated(Arc::clone(&gate), page(&["1"])));

        let (first_sink, first_rx) = channel();
        let first = session.start("cats", Point::from_lng_lat(0.0, 0.0), first_sink).unwrap();

        let (second_sink, second_rx) = channel();
        let rejected = session.start("dogs", Point::from_lng_lat(0.0, 0.0), second_sink);
        assert_eq!(rejected.err(), Some(SessionError::SearchInFlight));
        assert_eq!(session.state(), SessionState::Running);

        gate.notify_one();
        first.wait().await.unwrap();

        let events = drain(first_rx).await;
        assert!(matches!(&events[..], [SearchEvent::Update(r), SearchEvent::Complete(all)]
            if r.photo_id() == "1" && all.len() == 1));
        // The rejected sink was dropped without ever receiving an event.
        assert!(drain(second_rx).await.is_empty());

        // Idle again: a new search may start and the old results are cleared on start.
        let (third_sink, third_rx) = channel();
        let third = session.start("birds", Point::from_lng_lat(0.0, 0.0), third_sink).unwrap();
        assert!(session.results().is_empty());
        gate.notify_one();
        third.wait().await.unwrap();
        assert_eq!(drain(third_rx).await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_search_returns_to_startable() {
        let session = session(MockResponse::Status(500));

        let (sink, rx) = channel();
        session
            .start("cats", Point::from_lng_lat(0.0, 0.0), sink)
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(session.state(), SessionState::Failed);
        assert!(matches!(&drain(rx).await[..], [SearchEvent::Fail(_)]));
        assert!(!session.is_in_flight());
    }

    #[tokio::test]
    async fn test_cancel_in_flight_search() {
        let gate = Arc::new(Notify::new());
        let session = session(MockResponse::gated(Arc::clone(&gate), page(&["1", "2"])));
        assert!(!session.cancel());

        let (sink, rx) = channel();
        let handle = session.start("cats", Point::from_lng_lat(0.0, 0.0), sink).unwrap();
        assert!(session.cancel());
        gate.notify_one();
        handle.wait().await.unwrap();

        assert_eq!(session.state(), SessionState::Cancelled);
        assert!(matches!(&drain(rx).await[..], [SearchEvent::Cancelled(records)] if records.is_empty()));
    }

    struct Panicking;

    impl ResultSink for Panicking {
        fn update(&mut self, _record: SearchRecord) {
            panic!("sink blew up");
        }
        fn complete(&mut self, _records: Vec<SearchRecord>) {}
        fn fail(&mut self, _reason: String) {}
    }

    #[tokio::test]
    async fn test_panicking_sink_does_not_wedge_session() {
        let session = session(page(&["1"]));
        let handle = session.start("cats", Point::from_lng_lat(0.0, 0.0), Panicking).unwrap();

        assert!(handle.wait().await.is_err());
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.start("again", Point::from_lng_lat(0.0, 0.0), channel().0).is_ok());
    }
}
