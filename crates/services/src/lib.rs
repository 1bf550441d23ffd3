#![forbid(unsafe_code)]

pub mod app_services;
pub mod cascade_service;
pub mod config;
pub mod error;
pub mod progress_service;
pub mod sync;

pub use linguify_core::Clock;

pub use app_services::AppServices;
pub use cascade_service::{CascadeCalculator, CascadeContext, CascadeOutcome};
pub use config::{ApiConfig, ReplaySchedule, RetryPolicy, SyncConfig};
pub use error::{AppServicesError, ConfigError, SubmitError};
pub use progress_service::{
    ProgressService, ProgressUpdate, RecordOutcome, ReconcilePolicy, SnapshotUpdate,
};
pub use sync::{
    Connectivity, HttpProgressApi, PendingCounts, PendingQueue, ProgressApi, ReplayReport,
    SubmitOutcome, SyncDispatcher, SyncNotice, SyncQueue,
};
