use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoiFinderError {
    #[error("Search error: {0}")]
    SearchError(#[from] crate::search::SearchError),
    #[error("Session error: {0}")]
    SessionError(#[from] crate::session::SessionError),
    #[error("Transport error: {0}")]
    TransportError(#[from] poifinder_transport::TransportError),
    #[error("Image error: {0}")]
    ImageError(#[from] crate::thumbnail::ImageError),
    #[error("Join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PoiFinderError>;
