//! Conversion engine for charpack.
//!
//! Ties the schema layer and the package store together: scanning a
//! character bundle, resolving externally-sourced assets against the shared
//! installation and the standard base, sequencing one conversion run with
//! progress reporting, and fanning a batch of conversions over a bounded
//! worker pool.

pub mod batch;
pub mod convert;
pub mod resolver;
pub mod scan;

pub use batch::{
    install_ctrlc, run_batch, BatchOutcome, CancelToken, ProgressEvent, StoreLock,
    DEFAULT_WORKERS,
};
pub use convert::{
    convert, ConvertOptions, ConvertOutcome, NullProgress, ProgressSink, Stage, DEFINITION_FILE,
};
pub use resolver::{AssetResolver, Disposition};
pub use scan::{find_emotions_folder, find_shared_assets, scan_character_dir};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("definition error: {0}")]
    Definition(#[from] charpack_schema::DefinitionError),
    #[error("base manifest error: {0}")]
    BaseManifest(#[from] charpack_schema::BaseManifestError),
    #[error("store error: {0}")]
    Store(#[from] charpack_store::StoreError),
    #[error("no emotions folder in {}", .0.display())]
    EmotionsFolderMissing(PathBuf),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
