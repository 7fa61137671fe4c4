use serde_json::Error as SerdeJsonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Endpoint returned HTTP {status}")]
    Fetch { status: u16 },

    #[error("Endpoint reported error: {0}")]
    Endpoint(String),

    #[error("JSON error: {0}")]
    Parse(#[from] SerdeJsonError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Renderer '{kind}' failed to initialize: {reason}")]
    RenderInit { kind: String, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // Errors handed out by a single-flight fetch are shared between all the
    // callers that awaited it.
    #[error(transparent)]
    Shared(#[from] std::sync::Arc<AppError>),

    #[error("Not found: {0}")]
    NotFound(String),
}
