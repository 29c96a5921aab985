//! Centralized error types for the tracker

use thiserror::Error;

/// Top-level tracker error
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("command rejected: {0}")]
    Command(#[from] CommandError),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Durable-store / cache errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("subscriber not found: {chat_id}")]
    SubscriberNotFound { chat_id: i64 },

    #[error("migration failed: {0}")]
    MigrationFailed(String),
}

/// Upstream HTTP/WebSocket errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("upstream error: status={status:?}, cause={cause}")]
    Upstream {
        status: Option<u16>,
        cause: String,
    },

    #[error("timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("rate limited, retry after {0:?}")]
    RateLimited(std::time::Duration),

    #[error("websocket error: {0}")]
    WebSocket(String),
}

/// Event-decode failures — these never bubble past the decoder; they make it
/// emit `SemanticEvent::Unknown` instead, but are useful for unit tests.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("payload too short: {0} bytes")]
    PayloadTooShort(usize),

    #[error("unrecognized discriminator")]
    UnrecognizedDiscriminator,

    #[error("invalid base64/base58 encoding: {0}")]
    InvalidEncoding(String),
}

/// Rejections at the command-API boundary — never mutate state
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("invalid wallet address: {0}")]
    InvalidWallet(String),

    #[error("wallet cap reached ({max})")]
    WalletCapReached { max: usize },

    #[error("watchlist cap reached ({max})")]
    WatchlistCapReached { max: usize },

    #[error("portfolio wallet cap reached ({max})")]
    PortfolioWalletCapReached { max: usize },

    #[error("unknown subscriber: {chat_id}")]
    UnknownSubscriber { chat_id: i64 },

    #[error("invalid quiet hours: start={start:?}, end={end:?}")]
    InvalidQuietHours { start: Option<u8>, end: Option<u8> },
}

pub type TrackerResult<T> = Result<T, TrackerError>;

impl From<sqlx::Error> for TrackerError {
    fn from(err: sqlx::Error) -> Self {
        TrackerError::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        TrackerError::Network(NetworkError::ConnectionFailed(err.to_string()))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for TrackerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        TrackerError::Network(NetworkError::WebSocket(err.to_string()))
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Decode(DecodeError::InvalidEncoding(err.to_string()))
    }
}
