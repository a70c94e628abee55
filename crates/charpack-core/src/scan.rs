use crate::ConvertError;
use charpack_store::FileSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Recursively collect every regular file in the character bundle into a
/// [`FileSet`], with archive names relative to the bundle root.
pub fn scan_character_dir(char_dir: &Path) -> Result<FileSet, ConvertError> {
    let mut files = FileSet::new();
    collect(char_dir, char_dir, &mut files)?;
    Ok(files)
}

fn collect(root: &Path, current: &Path, files: &mut FileSet) -> Result<(), ConvertError> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let full = entry.path();
        if entry.file_type()?.is_dir() {
            collect(root, &full, files)?;
        } else {
            let rel = full
                .strip_prefix(root)
                .map_err(|e| std::io::Error::other(format!("path strip: {e}")))?
                .to_string_lossy()
                .into_owned();
            files.insert(&rel, full)?;
        }
    }
    Ok(())
}

/// Resolve the on-disk name of the bundle's emote-icon folder with a
/// case-insensitive scan. Entries are sorted first so "first match" is
/// deterministic across platforms and readdir orders.
pub fn find_emotions_folder(char_dir: &Path) -> Result<String, ConvertError> {
    let mut names: Vec<String> = fs::read_dir(char_dir)?
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_str().map(ToOwned::to_owned))
        .collect();
    names.sort();

    names
        .into_iter()
        .find(|name| name.to_lowercase() == "emotions")
        .ok_or_else(|| ConvertError::EmotionsFolderMissing(char_dir.to_path_buf()))
}

/// Guess the shared-assets installation from a character directory: two
/// levels up, accepted when a `sounds` subdirectory exists there.
pub fn find_shared_assets(char_dir: &Path) -> Option<PathBuf> {
    let base = char_dir.parent()?.parent()?;
    base.join("sounds").is_dir().then(|| base.to_path_buf())
}
