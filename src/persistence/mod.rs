//! Working directory persistence
//!
//! Restore on boot, snapshot on finalize.

pub mod archive;
pub mod manager;

pub use archive::{ArchiveCodec, CompressionLevel, TarGzCodec};
pub use manager::{
    Persistence, PersistenceConfig, RestoreOrigin, SnapshotInfo, Snapshotter, WorkingDirectory,
};
