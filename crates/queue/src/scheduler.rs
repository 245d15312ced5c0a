//! Scheduled jobs for periodic maintenance tasks.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mercado_common::{DisputeConfig, get_metrics};
use mercado_core::DisputeService;
use tokio::{
    task::JoinHandle,
    time::{MissedTickBehavior, interval},
};

/// Disputes closed per database round trip.
const EXPIRY_BATCH_SIZE: u64 = 100;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Whether the SLA sweep runs at all.
    pub expiry_enabled: bool,
    /// Interval between sweeps (default: 5 minutes).
    pub expiry_interval: Duration,
    /// Hours a deadline may be overdue before the dispute is closed.
    pub expiry_grace_hours: i64,
    /// Disputes loaded per batch.
    pub expiry_batch_size: u64,
}

impl From<&DisputeConfig> for SchedulerConfig {
    fn from(config: &DisputeConfig) -> Self {
        Self {
            expiry_enabled: config.expiry_sweep_enabled,
            expiry_interval: Duration::from_secs(config.expiry_sweep_interval_secs.max(1)),
            expiry_grace_hours: config.expiry_grace_hours.max(0),
            expiry_batch_size: EXPIRY_BATCH_SIZE,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&DisputeConfig::default())
    }
}

/// Job executor trait for scheduled jobs.
#[async_trait::async_trait]
pub trait JobExecutor: Send + Sync {
    /// Close up to `batch` disputes overdue by more than `grace_hours`.
    async fn expire_overdue_disputes(
        &self,
        grace_hours: i64,
        batch: u64,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>>;
}

/// Runs scheduled jobs against the dispute service.
#[derive(Clone)]
pub struct DisputeJobExecutor {
    disputes: DisputeService,
}

impl DisputeJobExecutor {
    #[must_use]
    pub const fn new(disputes: DisputeService) -> Self {
        Self { disputes }
    }
}

#[async_trait::async_trait]
impl JobExecutor for DisputeJobExecutor {
    async fn expire_overdue_disputes(
        &self,
        grace_hours: i64,
        batch: u64,
    ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
        let expired = self
            .disputes
            .expire_overdue(Utc::now(), grace_hours, batch)
            .await?;
        Ok(expired as u64)
    }
}

/// Run one SLA sweep, draining full batches. Returns how many disputes were closed.
pub async fn run_sweep<E: JobExecutor + ?Sized>(config: &SchedulerConfig, executor: &E) -> u64 {
    let metrics = get_metrics();
    let mut total = 0;

    loop {
        match executor
            .expire_overdue_disputes(config.expiry_grace_hours, config.expiry_batch_size)
            .await
        {
            Ok(count) => {
                total += count;
                if count < config.expiry_batch_size {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Dispute expiry sweep failed");
                metrics.record_sweep(total, false);
                return total;
            }
        }
    }

    if total > 0 {
        tracing::info!(count = total, "Expired overdue disputes");
    }
    metrics.record_sweep(total, true);
    total
}

/// Spawn the scheduler. Returns `None` when every job is disabled.
pub fn run_scheduler<E: JobExecutor + 'static>(
    config: SchedulerConfig,
    executor: Arc<E>,
) -> Option<JoinHandle<()>> {
    if !config.expiry_enabled {
        tracing::info!("Dispute expiry sweep disabled");
        return None;
    }

    tracing::info!(
        interval_secs = config.expiry_interval.as_secs(),
        grace_hours = config.expiry_grace_hours,
        "Starting dispute expiry sweep"
    );

    Some(tokio::spawn(async move {
        let mut interval = interval(config.expiry_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            run_sweep(&config, executor.as_ref()).await;
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercado_core::{AttachmentService, NoOpStorage, NotificationService};
    use mercado_db::{
        entities::dispute,
        repositories::{
            DisputeRepository, NotificationRepository, SubjectRepository, UserRepository,
        },
    };
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Mutex;

    /// Executor that hands out a scripted sequence of results.
    #[derive(Default)]
    struct ScriptedExecutor {
        results: Mutex<Vec<Result<u64, String>>>,
        calls: Mutex<Vec<(i64, u64)>>,
    }

    impl ScriptedExecutor {
        fn new(mut results: Vec<Result<u64, String>>) -> Self {
            results.reverse();
            Self {
                results: Mutex::new(results),
                calls: Mutex::default(),
            }
        }

        fn calls(&self) -> Vec<(i64, u64)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl JobExecutor for ScriptedExecutor {
        async fn expire_overdue_disputes(
            &self,
            grace_hours: i64,
            batch: u64,
        ) -> Result<u64, Box<dyn std::error::Error + Send + Sync>> {
            self.calls.lock().unwrap().push((grace_hours, batch));
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Ok(0))
                .map_err(Into::into)
        }
    }

    fn config(batch: u64) -> SchedulerConfig {
        SchedulerConfig {
            expiry_enabled: true,
            expiry_interval: Duration::from_secs(60),
            expiry_grace_hours: 2,
            expiry_batch_size: batch,
        }
    }

    #[test]
    fn test_scheduler_config_from_dispute_config() {
        let config = SchedulerConfig::default();
        assert!(config.expiry_enabled);
        assert_eq!(config.expiry_interval, Duration::from_secs(300));
        assert_eq!(config.expiry_grace_hours, 0);
        assert_eq!(config.expiry_batch_size, EXPIRY_BATCH_SIZE);
    }

    #[test]
    fn test_scheduler_config_clamps_values() {
        let disputes = DisputeConfig {
            expiry_sweep_interval_secs: 0,
            expiry_grace_hours: -5,
            ..DisputeConfig::default()
        };
        let config = SchedulerConfig::from(&disputes);
        assert_eq!(config.expiry_interval, Duration::from_secs(1));
        assert_eq!(config.expiry_grace_hours, 0);
    }

    #[tokio::test]
    async fn test_sweep_drains_full_batches() {
        let executor = ScriptedExecutor::new(vec![Ok(10), Ok(10), Ok(3)]);

        let total = run_sweep(&config(10), &executor).await;

        assert_eq!(total, 23);
        assert_eq!(executor.calls(), vec![(2, 10), (2, 10), (2, 10)]);
    }

    #[tokio::test]
    async fn test_sweep_stops_on_error() {
        let before = get_metrics().snapshot().expiry_sweep_failures;
        let executor = ScriptedExecutor::new(vec![Ok(10), Err("database down".to_string())]);

        let total = run_sweep(&config(10), &executor).await;

        assert_eq!(total, 10);
        assert_eq!(executor.calls().len(), 2);
        assert!(get_metrics().snapshot().expiry_sweep_failures > before);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_spawns_nothing() {
        let config = SchedulerConfig {
            expiry_enabled: false,
            ..config(10)
        };
        assert!(run_scheduler(config, Arc::new(ScriptedExecutor::default())).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_runs_on_interval() {
        let executor = Arc::new(ScriptedExecutor::default());
        let handle = run_scheduler(config(10), executor.clone()).unwrap();

        // First tick fires immediately, then once per interval.
        tokio::time::sleep(Duration::from_secs(125)).await;
        handle.abort();

        assert_eq!(executor.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_dispute_executor_with_nothing_overdue() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<dispute::Model>::new()])
                .into_connection(),
        );
        let config = DisputeConfig::default();
        let service = DisputeService::new(
            DisputeRepository::new(db.clone()),
            UserRepository::new(db.clone()),
            SubjectRepository::new(db.clone()),
            NotificationService::new(NotificationRepository::new(db)),
            AttachmentService::new(Arc::new(NoOpStorage::new(String::new())), &config),
            config,
        );
        let executor = DisputeJobExecutor::new(service);

        assert_eq!(executor.expire_overdue_disputes(0, 10).await.unwrap(), 0);
    }
}
