//! The two-level pacing scheduler: per-host queues under one manager,
//! with disk-backed overflow for large inputs.

pub mod host;
pub mod manager;
pub mod spill;

pub use host::PerHostQueue;
pub use manager::QueueManager;
pub use spill::DiskSpillQueue;
