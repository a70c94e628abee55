use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Namespace prefix under which the shared base registers sound effects.
pub const SFX_NAMESPACE: &str = "sfx";

#[derive(Debug, Error)]
pub enum BaseManifestError {
    #[error("cannot read base manifest: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("base manifest is not valid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("base manifest has an empty id")]
    MissingId,
}

/// Index of the shared "standard base" asset pack: files assumed already
/// present in the target runtime, keyed by filename with blake3 hex values.
/// Read-only; the converter never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StandardBaseManifest {
    pub id: String,
    pub files: BTreeMap<String, String>,
}

impl StandardBaseManifest {
    /// Look up a filename, tolerating the base's storage casing and the
    /// `sfx/` namespace. Returns the name as the base registers it, plus
    /// the registered content hash.
    pub fn lookup(&self, name: &str) -> Option<(&str, &str)> {
        let lower = name.to_lowercase();
        let namespaced = format!("{SFX_NAMESPACE}/{name}");
        let namespaced_lower = namespaced.to_lowercase();
        for candidate in [name, lower.as_str(), namespaced.as_str(), namespaced_lower.as_str()] {
            if let Some((stored, hash)) = self.files.get_key_value(candidate) {
                return Some((stored.as_str(), hash.as_str()));
            }
        }
        None
    }

    /// The registered content hash for a filename, if the base carries it.
    pub fn hash_of(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|(_, hash)| hash)
    }
}

pub fn parse_base_manifest(input: &str) -> Result<StandardBaseManifest, BaseManifestError> {
    let manifest: StandardBaseManifest = serde_json::from_str(input)?;
    if manifest.id.trim().is_empty() {
        return Err(BaseManifestError::MissingId);
    }
    Ok(manifest)
}

pub fn load_base_manifest(
    path: impl AsRef<Path>,
) -> Result<StandardBaseManifest, BaseManifestError> {
    let content = fs::read_to_string(path)?;
    parse_base_manifest(&content)
}
