//! Background work for mercado.
//!
//! - **Scheduler**: periodic SLA sweep closing overdue disputes
//! - **Pub/Sub**: Redis fan-out of user events across server instances

pub mod pubsub;
pub mod scheduler;

pub use pubsub::{PubSubBridge, RedisPubSub, user_events_channel};
pub use scheduler::{DisputeJobExecutor, JobExecutor, SchedulerConfig, run_scheduler, run_sweep};
