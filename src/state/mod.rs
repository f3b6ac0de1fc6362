pub mod memory;
pub mod snapshots;

pub use memory::MemoryHistoryStore;
pub use snapshots::SnapshotCache;
