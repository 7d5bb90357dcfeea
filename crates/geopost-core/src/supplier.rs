//! Sources of the device's last known position.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::SupplierError;
use crate::sample::Position;

#[async_trait]
pub trait LocationSupplier: Send + Sync {
    /// Returns the most recent cached fix.
    ///
    /// `Ok(None)` means the platform has no fix yet and is not an error.
    /// `Err` means the supplier itself could not be reached.
    async fn last_known_location(&self) -> Result<Option<Position>, SupplierError>;
}

/// Always answers with the same reading.
#[derive(Debug, Clone, Default)]
pub struct StaticSupplier {
    position: Option<Position>,
}

impl StaticSupplier {
    pub fn new(position: Position) -> Self {
        Self {
            position: Some(position),
        }
    }

    pub fn empty() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl LocationSupplier for StaticSupplier {
    async fn last_known_location(&self) -> Result<Option<Position>, SupplierError> {
        Ok(self.position)
    }
}

/// Reads a cached fix from a JSON file such as one written by a GPS daemon.
///
/// A missing file means no fix has been recorded yet.
#[derive(Debug, Clone)]
pub struct FixFileSupplier {
    path: PathBuf,
}

impl FixFileSupplier {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LocationSupplier for FixFileSupplier {
    async fn last_known_location(&self) -> Result<Option<Position>, SupplierError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "fix file not present");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let position: Position = serde_json::from_slice(&bytes)?;
        Ok(Some(position))
    }
}

/// Queries several providers and keeps the most accurate fix.
#[derive(Default, Clone)]
pub struct ProviderSet {
    providers: Vec<(String, Arc<dyn LocationSupplier>)>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        supplier: Arc<dyn LocationSupplier>,
    ) -> Self {
        self.providers.push((name.into(), supplier));
        self
    }
}

fn is_more_accurate(candidate: &Position, best: &Position) -> bool {
    match (candidate.usable_accuracy(), best.usable_accuracy()) {
        (Some(c), Some(b)) => c < b,
        (Some(_), None) => true,
        _ => false,
    }
}

#[async_trait]
impl LocationSupplier for ProviderSet {
    async fn last_known_location(&self) -> Result<Option<Position>, SupplierError> {
        if self.providers.is_empty() {
            return Err(SupplierError::NoProviders);
        }

        let mut failures = Vec::new();
        let mut best: Option<(&str, Position)> = None;

        for (name, supplier) in &self.providers {
            match supplier.last_known_location().await {
                Ok(Some(position)) => {
                    let replace = match &best {
                        Some((_, current)) => is_more_accurate(&position, current),
                        None => true,
                    };
                    if replace {
                        best = Some((name.as_str(), position));
                    }
                }
                Ok(None) => debug!(provider = %name, "provider has no fix"),
                Err(err) => {
                    warn!(provider = %name, "location provider failed: {err}");
                    failures.push(format!("{name}: {err}"));
                }
            }
        }

        if failures.len() == self.providers.len() {
            return Err(SupplierError::AllProvidersFailed(failures));
        }

        match best {
            Some((name, position)) => {
                debug!(
                    provider = %name,
                    accuracy_m = ?position.usable_accuracy(),
                    "selected most accurate fix"
                );
                Ok(Some(position))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    struct Broken;

    #[async_trait]
    impl LocationSupplier for Broken {
        async fn last_known_location(&self) -> Result<Option<Position>, SupplierError> {
            Err(SupplierError::Unavailable("permission denied".into()))
        }
    }

    fn fix_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("create fix file");
        file.write_all(contents.as_bytes()).expect("write fix file");
        file.flush().expect("flush fix file");
        file
    }

    #[tokio::test]
    async fn static_supplier_returns_its_reading() {
        let position = Position::new(1.0, 2.0);
        assert_eq!(
            StaticSupplier::new(position).last_known_location().await.unwrap(),
            Some(position)
        );
        assert_eq!(StaticSupplier::empty().last_known_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn provider_set_prefers_smallest_accuracy() {
        let coarse = Position::new(10.0, 10.0).with_accuracy(500.0);
        let fine = Position::new(10.001, 10.001).with_accuracy(8.0);
        let set = ProviderSet::new()
            .with_provider("network", Arc::new(StaticSupplier::new(coarse)))
            .with_provider("gps", Arc::new(StaticSupplier::new(fine)));

        assert_eq!(set.last_known_location().await.unwrap(), Some(fine));
    }

    #[tokio::test]
    async fn provider_set_keeps_first_on_tie_and_prefers_known_accuracy() {
        let first = Position::new(1.0, 1.0).with_accuracy(20.0);
        let second = Position::new(2.0, 2.0).with_accuracy(20.0);
        let unknown = Position::new(3.0, 3.0);
        let set = ProviderSet::new()
            .with_provider("unknown", Arc::new(StaticSupplier::new(unknown)))
            .with_provider("a", Arc::new(StaticSupplier::new(first)))
            .with_provider("b", Arc::new(StaticSupplier::new(second)));

        assert_eq!(set.last_known_location().await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn provider_set_ignores_meaningless_accuracy() {
        let unknown = Position::new(1.0, 1.0);
        let nan = Position::new(2.0, 2.0).with_accuracy(f32::NAN);
        let negative = Position::new(3.0, 3.0).with_accuracy(-5.0);
        let set = ProviderSet::new()
            .with_provider("unknown", Arc::new(StaticSupplier::new(unknown)))
            .with_provider("nan", Arc::new(StaticSupplier::new(nan)))
            .with_provider("negative", Arc::new(StaticSupplier::new(negative)));
        assert_eq!(set.last_known_location().await.unwrap(), Some(unknown));

        let fine = Position::new(4.0, 4.0).with_accuracy(30.0);
        let set = ProviderSet::new()
            .with_provider("nan", Arc::new(StaticSupplier::new(nan)))
            .with_provider("gps", Arc::new(StaticSupplier::new(fine)));
        assert_eq!(set.last_known_location().await.unwrap(), Some(fine));
    }

    #[tokio::test]
    async fn provider_set_skips_failing_providers() {
        let fix = Position::new(5.0, 6.0);
        let set = ProviderSet::new()
            .with_provider("broken", Arc::new(Broken))
            .with_provider("passive", Arc::new(StaticSupplier::new(fix)));

        assert_eq!(set.last_known_location().await.unwrap(), Some(fix));
    }

    #[tokio::test]
    async fn provider_set_without_any_fix_is_absent() {
        let set = ProviderSet::new()
            .with_provider("broken", Arc::new(Broken))
            .with_provider("gps", Arc::new(StaticSupplier::empty()));

        assert_eq!(set.last_known_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn provider_set_errors_when_every_provider_fails() {
        let set = ProviderSet::new()
            .with_provider("gps", Arc::new(Broken))
            .with_provider("network", Arc::new(Broken));

        match set.last_known_location().await {
            Err(SupplierError::AllProvidersFailed(reasons)) => {
                assert_eq!(reasons.len(), 2);
                assert!(reasons[0].starts_with("gps:"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(matches!(
            ProviderSet::new().last_known_location().await,
            Err(SupplierError::NoProviders)
        ));
    }

    #[tokio::test]
    async fn fix_file_supplier_reads_cached_fix() {
        let file = fix_file(r#"{"latitude": 37.7749, "longitude": -122.4194, "accuracy_m": 12.5}"#);

        let position = FixFileSupplier::new(file.path())
            .last_known_location()
            .await
            .expect("read fix")
            .expect("fix present");

        assert_eq!(position.latitude, 37.7749);
        assert_eq!(position.longitude, -122.4194);
        assert_eq!(position.accuracy_m, Some(12.5));
    }

    #[tokio::test]
    async fn fix_file_supplier_treats_missing_file_as_no_fix() {
        let dir = tempfile::tempdir().expect("temp dir");
        let supplier = FixFileSupplier::new(dir.path().join("missing.json"));
        assert_eq!(supplier.last_known_location().await.unwrap(), None);
    }

    #[tokio::test]
    async fn fix_file_supplier_rejects_malformed_file() {
        let file = fix_file("not json");
        let result = FixFileSupplier::new(file.path()).last_known_location().await;

        assert!(matches!(result, Err(SupplierError::Parse(_))));
    }
}
