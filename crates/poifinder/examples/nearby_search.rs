//! Live search around a point
//!
//! This example demonstrates the streaming pipeline against the real API:
//! - Building a configuration from the environment (`FLICKR_API_KEY`)
//! - Guarding the search with a session
//! - Printing each photo as soon as it resolves
//!
//! ```text
//! FLICKR_API_KEY=... cargo run --example nearby_search -- cats -122.4 37.7
//! ```

use std::sync::Arc;

use anyhow::Context;
use poifinder::{
    ChannelSink, Point, SearchConfig, SearchEvent, SearchOrchestrator, SearchSession,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    poifinder::init_logging(tracing::Level::INFO)?;

    let mut args = std::env::args().skip(1);
    let query = args.next().unwrap_or_else(|| "cats".to_string());
    let longitude: f64 = args.next().map_or(Ok(-122.4), |s| s.parse()).context("longitude")?;
    let latitude: f64 = args.next().map_or(Ok(37.7), |s| s.parse()).context("latitude")?;
    let center = Point::from_lng_lat(longitude, latitude);

    let config = SearchConfig::from_env()?;
    let orchestrator = Arc::new(SearchOrchestrator::over_http(config)?);
    let session = SearchSession::new(orchestrator, tokio::runtime::Handle::current());

    println!("Searching for {query:?} images around {center}...");
    let (tx, mut events) = tokio::sync::mpsc::unbounded_channel();
    let handle = session.start(query, center, ChannelSink::new(tx))?;

    while let Some(event) = events.recv().await {
        match event {
            SearchEvent::Update(record) => {
                let thumb = record.thumbnail();
                println!(
                    "  {record} - {}x{}{}",
                    thumb.width(),
                    thumb.height(),
                    if thumb.is_placeholder() { " (placeholder)" } else { "" }
                );
            }
            SearchEvent::Degraded {
                photo_id,
                degradation,
            } => println!("  ! {photo_id}: {degradation}"),
            SearchEvent::Complete(records) => {
                let located = records.iter().filter(|r| r.location().is_some()).count();
                println!("Search complete: {} photos, {located} located", records.len());
            }
            SearchEvent::Fail(reason) => println!("Search failed: {reason}"),
            SearchEvent::Cancelled(records) => println!("Search cancelled after {} photos", records.len()),
        }
    }

    handle.wait().await?;
    Ok(())
}
