use crate::digest::PackDigest;
use crate::layout::StoreLayout;
use crate::{fsync_dir, StoreError};
use charpack_schema::ManifestInfo;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Manifest filename inside a published package.
pub const INFO_FILE: &str = "info.json";

/// Content archive filename inside a published package.
pub const CONTENT_FILE: &str = "content.tar";

/// Disambiguates staging directories of same-digest publishes racing within
/// one process; the pid handles races across processes.
static STAGE_SEQ: AtomicU64 = AtomicU64::new(0);

/// Content-addressed package store.
///
/// Packages are directories named by their digest hex. Publish is atomic:
/// the package is assembled under `staging/` and renamed into place, so a
/// reader never observes a half-written package, and publishing a digest
/// that already exists is a harmless no-op.
pub struct PackageStore {
    layout: StoreLayout,
}

impl PackageStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    /// Create a store rooted at `root`, initializing the layout and
    /// checking the format version.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let layout = StoreLayout::new(root);
        layout.initialize()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Move a fully-assembled workspace into the store under `digest`.
    ///
    /// Returns the published package path. Two concurrent publishes of the
    /// same digest are commutative: whichever rename lands first wins and
    /// the loser discards its staging copy.
    pub fn publish(&self, digest: &PackDigest, workspace: &Path) -> Result<PathBuf, StoreError> {
        let dest = self.layout.package_path(digest.hex());
        if dest.exists() {
            debug!("package {digest} already published, skipping");
            return Ok(dest);
        }

        let stage = self.layout.staging_dir().join(format!(
            "{}.{}.{}",
            digest.hex(),
            std::process::id(),
            STAGE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let staged = stage_workspace(workspace, &stage);
        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&stage);
            return Err(StoreError::PublishFailure {
                digest: digest.hex().to_owned(),
                detail: e.to_string(),
            });
        }

        match fs::rename(&stage, &dest) {
            Ok(()) => {
                fsync_dir(&self.layout.packages_dir())?;
                info!("published package {digest}");
                Ok(dest)
            }
            Err(_) if dest.exists() => {
                // Lost a same-digest race; identical content is already there.
                let _ = fs::remove_dir_all(&stage);
                Ok(dest)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&stage);
                Err(StoreError::PublishFailure {
                    digest: digest.hex().to_owned(),
                    detail: e.to_string(),
                })
            }
        }
    }

    pub fn exists(&self, digest_hex: &str) -> bool {
        self.layout.package_path(digest_hex).exists()
    }

    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.layout.packages_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_owned());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn read_manifest(&self, digest_hex: &str) -> Result<ManifestInfo, StoreError> {
        let path = self.layout.package_path(digest_hex).join(INFO_FILE);
        if !path.exists() {
            return Err(StoreError::PackageNotFound(digest_hex.to_owned()));
        }
        let content = fs::read_to_string(&path)?;
        Ok(charpack_schema::parse_manifest_str(&content)?)
    }

    pub fn archive_path(&self, digest_hex: &str) -> PathBuf {
        self.layout.package_path(digest_hex).join(CONTENT_FILE)
    }
}

fn stage_workspace(workspace: &Path, stage: &Path) -> Result<(), std::io::Error> {
    fs::create_dir_all(stage)?;
    for entry in fs::read_dir(workspace)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::copy(entry.path(), stage.join(entry.file_name()))?;
        }
    }
    Ok(())
}
