use thiserror::Error;

/// Errors raised by the ingestion pipeline.
///
/// Upstream transport failures never show up here: the clients report them
/// as absent data. What remains are fatal setup problems and per-item
/// failures that the batch runner counts and skips.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A payload lacks an identifier the pipeline cannot work without.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The upstream provider returned nothing usable for a request.
    #[error("No data from {provider}: {what}")]
    NoData { provider: &'static str, what: String },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl IngestError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        IngestError::InvalidPayload(msg.into())
    }

    pub fn no_data(provider: &'static str, what: impl Into<String>) -> Self {
        IngestError::NoData {
            provider,
            what: what.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
