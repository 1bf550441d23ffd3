mod api;
mod dispatcher;
mod lifecycle;
mod queue;

// Public API of the sync subsystem.
pub use api::{HttpProgressApi, ProgressApi};
pub use dispatcher::{PendingCounts, ReplayReport, SubmitOutcome, SyncDispatcher, SyncNotice};
pub use lifecycle::{Connectivity, SyncQueue};
pub use queue::PendingQueue;
