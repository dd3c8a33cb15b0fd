pub mod memory_snapshot;
