use crate::digest::PackDigest;
use crate::publish::{PackageStore, CONTENT_FILE, INFO_FILE};
use crate::StoreError;
use std::fs;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct IntegrityFailure {
    pub package: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct IntegrityReport {
    pub checked: usize,
    pub failures: Vec<IntegrityFailure>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Re-derive every published package's content digest and compare it against
/// the manifest's recorded digest and the package's directory name.
///
/// Individual damaged packages are reported, never fatal: the scan always
/// covers the whole store.
pub fn verify_store(store: &PackageStore) -> Result<IntegrityReport, StoreError> {
    let mut report = IntegrityReport::default();

    for package in store.list()? {
        report.checked += 1;
        debug!("verifying package {package}");
        if let Some(reason) = check_package(store, &package) {
            report.failures.push(IntegrityFailure { package, reason });
        }
    }

    Ok(report)
}

fn check_package(store: &PackageStore, package: &str) -> Option<String> {
    let manifest = match store.read_manifest(package) {
        Ok(m) => m,
        Err(e) => return Some(format!("unreadable {INFO_FILE}: {e}")),
    };

    let recorded = match PackDigest::parse(&manifest.digest) {
        Ok(d) => d,
        Err(e) => return Some(format!("bad digest field: {e}")),
    };

    let archive = match fs::read(store.archive_path(package)) {
        Ok(bytes) => bytes,
        Err(e) => return Some(format!("unreadable {CONTENT_FILE}: {e}")),
    };

    let actual = recorded.algorithm().digest(&archive);
    if actual != recorded {
        return Some(format!("digest mismatch: manifest records {recorded}, archive is {actual}"));
    }
    if actual.hex() != package {
        return Some(format!("directory name does not match digest {actual}"));
    }
    None
}
