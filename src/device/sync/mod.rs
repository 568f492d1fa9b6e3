pub mod orchestrator;
pub mod report;
pub mod scheduler;

pub use orchestrator::{backoff_delay, SyncOptions, SyncOrchestrator};
pub use report::{SyncError, SyncPhase, SyncReport};
pub use scheduler::BackgroundSyncScheduler;
