//! The sync engine: call policies, bookkeeping, the fetch cycle and its scheduler.

pub mod cycle;
pub mod gap_detector;
pub mod rate_limiter;
pub mod retry;
pub mod scheduler;
pub mod season;
pub mod status;
pub mod update_tracker;

pub use cycle::{CycleSettings, FetchCycle};
pub use gap_detector::GapDetector;
pub use rate_limiter::RateLimiter;
pub use retry::RetryPolicy;
pub use scheduler::Scheduler;
pub use status::{CycleOutcome, CycleReport, ServiceStatus, Stage, StageResult};
pub use update_tracker::UpdateTracker;
