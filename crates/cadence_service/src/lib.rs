pub mod export;
pub mod service;

pub use crate::export::{read_snapshots, write_snapshots, SnapshotSink};
pub use crate::service::{TaskService, TaskServiceBuilder};
