use crate::StoreError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The finalized set of files going into a content archive, keyed by
/// archive-internal name.
///
/// Names are normalized on insert (forward slashes, no leading `./`).
/// Inserting the same name with a different source path is rejected rather
/// than silently deduplicated; re-inserting an identical pair is a no-op.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    entries: BTreeMap<String, PathBuf>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw relative path into an archive name.
    pub fn normalize_name(raw: &str) -> String {
        let name = raw.replace('\\', "/");
        match name.strip_prefix("./") {
            Some(stripped) => stripped.to_owned(),
            None => name,
        }
    }

    pub fn insert(
        &mut self,
        archive_name: &str,
        source: impl Into<PathBuf>,
    ) -> Result<(), StoreError> {
        let name = Self::normalize_name(archive_name);
        let source = source.into();
        match self.entries.get(&name) {
            Some(existing) if *existing == source => Ok(()),
            Some(existing) => Err(StoreError::DivergentEntry {
                archive_name: name,
                existing: existing.clone(),
                incoming: source,
            }),
            None => {
                self.entries.insert(name, source);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, archive_name: &str) -> Option<PathBuf> {
        self.entries.remove(&Self::normalize_name(archive_name))
    }

    pub fn contains(&self, archive_name: &str) -> bool {
        self.entries.contains_key(&Self::normalize_name(archive_name))
    }

    /// Case-insensitive lookup; returns the name as stored.
    pub fn find_ignore_case(&self, archive_name: &str) -> Option<&str> {
        let wanted = Self::normalize_name(archive_name).to_lowercase();
        self.entries
            .keys()
            .find(|name| name.to_lowercase() == wanted)
            .map(String::as_str)
    }

    pub fn source_of(&self, archive_name: &str) -> Option<&Path> {
        self.entries
            .get(&Self::normalize_name(archive_name))
            .map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    /// Archive names in their final (sorted) order, as listed in the manifest.
    pub fn file_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Build a deterministic tar archive from the file set.
///
/// Determinism guarantees:
/// - Entries appear in archive-name order
/// - All timestamps set to 0 (Unix epoch)
/// - All ownership set to 0:0 with empty owner/group names
/// - Mode fixed at 0644 so the host umask never reaches the byte stream
///
/// `on_entry(done, total)` fires after each appended file, for progress
/// reporting. A source that cannot be opened fails the whole archive with
/// [`StoreError::MissingSourceFile`].
pub fn pack_content(
    files: &FileSet,
    mut on_entry: impl FnMut(usize, usize),
) -> Result<Vec<u8>, StoreError> {
    let total = files.len();
    let mut ar = tar::Builder::new(Vec::new());
    ar.follow_symlinks(true);

    for (done, (name, path)) in files.iter().enumerate() {
        let data = fs::read(path).map_err(|source| StoreError::MissingSourceFile {
            archive_name: name.to_owned(),
            path: path.to_path_buf(),
            source,
        })?;

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_mode(0o644);
        header.set_username("")?;
        header.set_groupname("")?;
        header.set_size(data.len() as u64);
        header.set_cksum();
        ar.append_data(&mut header, name, data.as_slice())?;

        on_entry(done + 1, total);
    }

    let data = ar.into_inner()?;
    Ok(data)
}
