// crates/geopost-core/src/error.rs

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupplierError {
    #[error("location supplier unavailable: {0}")]
    Unavailable(String),

    #[error("fix file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fix file is not a valid position: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no location providers configured")]
    NoProviders,

    #[error("every location provider failed: {0:?}")]
    AllProvidersFailed(Vec<String>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("coordinates must be finite, got ({latitude}, {longitude})")]
    NonFinite { latitude: f64, longitude: f64 },

    #[error("latitude {0} is outside -90..=90")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside -180..=180")]
    LongitudeOutOfRange(f64),
}

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("http client could not be built: {0}")]
    Client(String),

    #[error("invalid upload endpoint: {0}")]
    InvalidUrl(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upload timed out after {0:?}")]
    Timeout(Duration),

    #[error("server responded with status {status}")]
    Server { status: u16 },

    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl UploadError {
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failures that happen before an upload is dispatched.
#[derive(Error, Debug)]
pub enum WorkError {
    #[error("location supplier failed: {0}")]
    Supplier(#[from] SupplierError),

    #[error("location reading rejected: {0}")]
    Sample(#[from] SampleError),

    #[error("uploader setup failed: {0}")]
    Client(#[from] UploadError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} is not a valid URL: {value}")]
    InvalidUrl { name: &'static str, value: String },

    #[error("{name} must be a positive number of seconds, got {value:?}")]
    InvalidTimeout { name: &'static str, value: String },
}
