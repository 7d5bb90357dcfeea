//! HTTP delivery of location samples.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use crate::config::UploaderConfig;
use crate::error::UploadError;
use crate::sample::LocationSample;

pub const UPLOAD_PATH: &str = "/api/upload";

static SHARED_CLIENT: OnceCell<Client> = OnceCell::new();

/// The process-wide HTTP client, built on first use and reused afterwards.
pub fn shared_client() -> Result<&'static Client, UploadError> {
    SHARED_CLIENT.get_or_try_init(|| {
        Client::builder()
            .user_agent(concat!("geopost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|err| UploadError::Client(err.to_string()))
    })
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, sample: &LocationSample) -> Result<(), UploadError>;
}

#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpUploader {
    pub fn new(config: &UploaderConfig) -> Result<Self, UploadError> {
        let endpoint = upload_endpoint(&config.base_url)?;
        Ok(Self {
            client: shared_client()?.clone(),
            endpoint,
            timeout: config.timeout,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn upload_endpoint(base_url: &str) -> Result<Url, UploadError> {
    let joined = format!("{}{UPLOAD_PATH}", base_url.trim_end_matches('/'));
    Url::parse(&joined).map_err(|err| UploadError::InvalidUrl(format!("{joined}: {err}")))
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, sample: &LocationSample) -> Result<(), UploadError> {
        let body = sample.to_json()?;
        debug!(endpoint = %self.endpoint, bytes = body.len(), "posting location sample");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|err| UploadError::from_reqwest(err, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "location sample uploaded");
            Ok(())
        } else {
            warn!(status = status.as_u16(), "upload endpoint rejected location sample");
            Err(UploadError::Server {
                status: status.as_u16(),
            })
        }
    }
}
