#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Per-(provider, scope) job orchestration engine: schedules inventory
//! refresh jobs against a pluggable [`fleet_core::Adapter`], tracks per-host
//! health/cooldown, and maintains the latest snapshot for each scope.

pub mod core;
pub mod host_lock;
pub mod persistence;
pub mod refresh_policy;
pub mod runner;
pub mod scheduler;
pub mod store;
pub mod warmup;

pub use core::{Core, CoreHandle};
pub use host_lock::HostLockRegistry;
pub use persistence::{NullPersistence, SnapshotPersistence};
pub use warmup::HostListResolver;
