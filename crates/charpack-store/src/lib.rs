//! Deterministic content archiving and the content-addressed package store.
//!
//! This crate provides the storage layer: an explicit [`FileSet`] keyed by
//! archive name, reproducible tar construction via [`pack_content`], the
//! [`DigestAlgorithm`]/[`PackDigest`] content addressing scheme, the
//! [`PackageStore`] with atomic stage-then-rename publish, and whole-store
//! integrity verification.

pub mod archive;
pub mod digest;
pub mod integrity;
pub mod layout;
pub mod publish;

pub use archive::{pack_content, FileSet};
pub use digest::{DigestAlgorithm, PackDigest};
pub use integrity::{verify_store, IntegrityFailure, IntegrityReport};
pub use layout::{StoreLayout, STORE_FORMAT_VERSION};
pub use publish::{PackageStore, CONTENT_FILE, INFO_FILE};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Fsync a directory to ensure that a preceding `rename()` is durable.
///
/// On Linux with ext4 `data=ordered` (the default), renames are usually
/// durable without an explicit dir fsync, but POSIX does not guarantee this.
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error(
        "source file for archive entry '{archive_name}' cannot be opened ({}): {source}",
        .path.display()
    )]
    MissingSourceFile {
        archive_name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(
        "archive name '{archive_name}' already maps to {}, refusing {}",
        .existing.display(),
        .incoming.display()
    )]
    DivergentEntry {
        archive_name: String,
        existing: PathBuf,
        incoming: PathBuf,
    },
    #[error("package not found: {0}")]
    PackageNotFound(String),
    #[error("failed to publish package {digest}: {detail}")]
    PublishFailure { digest: String, detail: String },
    #[error("store format version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
