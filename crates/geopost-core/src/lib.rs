//! Uploads a device's last known location to a fixed ingest endpoint.

pub mod config;
pub mod error;
pub mod sample;
pub mod supplier;
pub mod uploader;
pub mod work;

pub use config::UploaderConfig;
pub use error::{ConfigError, SampleError, SupplierError, UploadError, WorkError};
pub use sample::{LocationSample, Position, DEVICE_ID};
pub use supplier::{FixFileSupplier, LocationSupplier, ProviderSet, StaticSupplier};
pub use uploader::{HttpUploader, Uploader};
pub use work::{trigger, DispatchMode, LocationWork, RunMetadata, UploadDisposition, WorkReport, WorkResult};
