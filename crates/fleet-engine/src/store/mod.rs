//! In-memory stores the scheduler/runner operate on. Each store guards its
//! own `std::sync::Mutex`/`RwLock` and never holds the guard across an
//! `.await`.

pub mod health_store;
pub mod job_store;
pub mod snapshot_store;

pub use health_store::HostHealthStore;
pub use job_store::JobStore;
pub use snapshot_store::SnapshotStore;
