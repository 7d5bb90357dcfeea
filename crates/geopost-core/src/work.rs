//! The schedulable unit of work: read the last known fix, upload it, report.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::UploaderConfig;
use crate::error::{UploadError, WorkError};
use crate::sample::LocationSample;
use crate::supplier::LocationSupplier;
use crate::uploader::{HttpUploader, Uploader};

/// What the work unit reports back to its scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkResult {
    Success,
    Failure,
}

/// Whether the work unit waits for the upload before reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DispatchMode {
    #[default]
    Await,
    /// Spawn the upload and report immediately. The reported result then
    /// says nothing about delivery; join the returned handle to learn it.
    Detach,
}

/// Opaque metadata handed over by the scheduler for one invocation.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub attempt: u32,
    pub triggered_at: DateTime<Utc>,
}

impl RunMetadata {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            attempt: 1,
            triggered_at: Utc::now(),
        }
    }
}

impl Default for RunMetadata {
    fn default() -> Self {
        Self::new()
    }
}

pub enum UploadDisposition {
    /// The supplier had no cached fix; nothing was sent.
    NoLocation,
    /// Setup failed before anything was dispatched.
    SetupFailed(WorkError),
    Delivered,
    Failed(UploadError),
    Detached(JoinHandle<Result<(), UploadError>>),
}

impl fmt::Debug for UploadDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoLocation => f.write_str("NoLocation"),
            Self::SetupFailed(err) => f.debug_tuple("SetupFailed").field(err).finish(),
            Self::Delivered => f.write_str("Delivered"),
            Self::Failed(err) => f.debug_tuple("Failed").field(err).finish(),
            Self::Detached(handle) => f
                .debug_struct("Detached")
                .field("finished", &handle.is_finished())
                .finish(),
        }
    }
}

#[derive(Debug)]
pub struct WorkReport {
    pub run_id: Uuid,
    pub result: WorkResult,
    pub sample: Option<LocationSample>,
    pub upload: UploadDisposition,
}

impl WorkReport {
    fn failed(run_id: Uuid, err: WorkError) -> Self {
        Self {
            run_id,
            result: WorkResult::Failure,
            sample: None,
            upload: UploadDisposition::SetupFailed(err),
        }
    }
}

pub struct LocationWork {
    supplier: Arc<dyn LocationSupplier>,
    uploader: Arc<dyn Uploader>,
    mode: DispatchMode,
}

impl LocationWork {
    pub fn new(supplier: Arc<dyn LocationSupplier>, uploader: Arc<dyn Uploader>) -> Self {
        Self {
            supplier,
            uploader,
            mode: DispatchMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub async fn run(&self, meta: &RunMetadata) -> WorkReport {
        let span = info_span!(
            "work_unit",
            run_id = %meta.run_id,
            attempt = meta.attempt,
            triggered_at = %meta.triggered_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        self.run_inner(meta).instrument(span).await
    }

    async fn run_inner(&self, meta: &RunMetadata) -> WorkReport {
        let run_id = meta.run_id;
        info!(mode = ?self.mode, "work unit started");

        let position = match self.supplier.last_known_location().await {
            Ok(position) => position,
            Err(err) => {
                let err = WorkError::from(err);
                error!("work unit setup failed: {err}");
                return WorkReport::failed(run_id, err);
            }
        };

        let Some(position) = position else {
            info!("no last known location available, skipping upload");
            return WorkReport {
                run_id,
                result: WorkResult::Success,
                sample: None,
                upload: UploadDisposition::NoLocation,
            };
        };

        let sample = match LocationSample::try_from_position(&position) {
            Ok(sample) => sample,
            Err(err) => {
                let err = WorkError::from(err);
                error!("work unit setup failed: {err}");
                return WorkReport::failed(run_id, err);
            }
        };
        info!(
            latitude = sample.latitude(),
            longitude = sample.longitude(),
            accuracy_m = ?position.usable_accuracy(),
            fix_age_secs = ?position.age_secs(meta.triggered_at),
            "dispatching location upload"
        );

        let upload = match self.mode {
            DispatchMode::Await => match self.uploader.upload(&sample).await {
                Ok(()) => UploadDisposition::Delivered,
                Err(err) => {
                    warn!("location upload failed: {err}");
                    UploadDisposition::Failed(err)
                }
            },
            DispatchMode::Detach => {
                let uploader = Arc::clone(&self.uploader);
                let handle = tokio::spawn(
                    async move {
                        let outcome = uploader.upload(&sample).await;
                        if let Err(err) = &outcome {
                            warn!("detached location upload failed: {err}");
                        }
                        outcome
                    }
                    .in_current_span(),
                );
                UploadDisposition::Detached(handle)
            }
        };

        info!("work unit finished");
        WorkReport {
            run_id,
            result: WorkResult::Success,
            sample: Some(sample),
            upload,
        }
    }
}

/// Entry point for the host scheduler: builds the HTTP uploader on the
/// shared client and runs one work unit.
pub async fn trigger(
    supplier: Arc<dyn LocationSupplier>,
    config: &UploaderConfig,
    mode: DispatchMode,
    meta: &RunMetadata,
) -> WorkReport {
    let uploader = match HttpUploader::new(config) {
        Ok(uploader) => uploader,
        Err(err) => {
            let err = WorkError::from(err);
            error!(run_id = %meta.run_id, "work unit setup failed: {err}");
            return WorkReport::failed(meta.run_id, err);
        }
    };

    LocationWork::new(supplier, Arc::new(uploader))
        .with_mode(mode)
        .run(meta)
        .await
}
