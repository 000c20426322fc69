// Store startup orchestration
use crate::domain::Store;
use crate::port::StoreLifecycle;
use std::sync::Arc;
use tracing::{error, info};

/// Outcome of starting every store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupReport {
    /// Stores started, with the schema version found
    pub started: Vec<(Store, i64)>,
    /// Stores that failed, with the reason
    pub failed: Vec<(Store, String)>,
}

impl StartupReport {
    pub fn is_healthy(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Startup service
///
/// On daemon startup, brings every store to open and schema-verified.
/// A store that fails stays down (the lifecycle raises the device fault);
/// the remaining stores are still started.
pub struct StartupService {
    lifecycle: Arc<dyn StoreLifecycle>,
}

impl StartupService {
    pub fn new(lifecycle: Arc<dyn StoreLifecycle>) -> Self {
        Self { lifecycle }
    }

    /// Start every store in `Store::ALL` order
    ///
    /// Never retries: a failed store needs an explicit start or reset.
    pub async fn start_all(&self) -> StartupReport {
        info!("Starting stores");

        let mut report = StartupReport::default();
        for store in Store::ALL {
            match self.lifecycle.start(store).await {
                Ok(schema) => {
                    info!(store = %store, version = schema.version, "Store started");
                    report.started.push((store, schema.version));
                }
                Err(e) => {
                    error!(store = %store, error = %e, "Store failed to start");
                    report.failed.push((store, e.to_string()));
                }
            }
        }

        info!(
            started = report.started.len(),
            failed = report.failed.len(),
            "Store startup complete"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SchemaRecord;
    use crate::error::AppError;
    use crate::port::lifecycle::MockStoreLifecycle;
    use mockall::predicate::eq;
    use mockall::Sequence;

    #[tokio::test]
    async fn test_starts_stores_in_order() {
        let mut lifecycle = MockStoreLifecycle::new();
        let mut seq = Sequence::new();
        lifecycle
            .expect_start()
            .with(eq(Store::PrimaryData))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|s| Ok(SchemaRecord::new(s.expected_schema_version())));
        lifecycle
            .expect_start()
            .with(eq(Store::OutboundQueue))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|s| Ok(SchemaRecord::new(s.expected_schema_version())));

        let report = StartupService::new(Arc::new(lifecycle)).start_all().await;

        assert!(report.is_healthy());
        assert_eq!(
            report.started,
            vec![
                (Store::PrimaryData, Store::PrimaryData.expected_schema_version()),
                (
                    Store::OutboundQueue,
                    Store::OutboundQueue.expected_schema_version()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_store_does_not_block_others() {
        let mut lifecycle = MockStoreLifecycle::new();
        lifecycle
            .expect_start()
            .with(eq(Store::PrimaryData))
            .times(1)
            .returning(|_| Err(AppError::Schema("no schema row".to_string())));
        lifecycle
            .expect_start()
            .with(eq(Store::OutboundQueue))
            .times(1)
            .returning(|s| Ok(SchemaRecord::new(s.expected_schema_version())));

        let report = StartupService::new(Arc::new(lifecycle)).start_all().await;

        assert!(!report.is_healthy());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, Store::PrimaryData);
        assert!(report.failed[0].1.contains("no schema row"));
        assert_eq!(report.started.len(), 1);
    }
}
