//! Shared domain types for the snapshot/job orchestration engine: the
//! vocabulary the engine, its persistence bridge, and (externally) the HTTP
//! layer and LLM tools all agree on.

pub mod adapter;
pub mod config;
pub mod error;
pub mod health;
pub mod job;
pub mod provider;
pub mod scope;
pub mod snapshot;

pub use adapter::{Adapter, CollectContext, CollectedRecords};
pub use config::ProviderSettings;
pub use error::{AdapterError, EngineError};
pub use health::HostHealthRecord;
pub use job::{HostJobState, HostJobStatus, Job, JobId, JobProgress, JobState};
pub use provider::Provider;
pub use scope::{Level, Scope, ScopeKey};
pub use snapshot::{SnapshotData, SnapshotHostState, SnapshotHostStatus, SnapshotPayload, SnapshotSource};
