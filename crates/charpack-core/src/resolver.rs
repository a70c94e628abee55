use charpack_schema::{InterjectionOverride, StandardBaseManifest, BLIP_FILE};
use charpack_store::{FileSet, StoreError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// There is no generic blip in the legacy sound set.
pub const DEFAULT_GENDER: &str = "male";

/// Canonical interjection keys and the filename stems they match.
const INTERJECTIONS: [(&str, &str); 4] = [
    ("hold_it", "holdit"),
    ("objection", "objection"),
    ("take_that", "takethat"),
    ("custom", "custom"),
];

/// Where a referenced sound comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Already part of the scanned bundle.
    Local,
    /// Registered by the standard base under the carried name; not copied.
    BaseSatisfied(String),
    /// Appended to the file set, sourced from the shared installation.
    NeedsCopy,
}

/// Decides, per externally-sourced sound file, whether bytes must travel
/// into the archive at all.
pub struct AssetResolver<'a> {
    shared_sounds: PathBuf,
    base: Option<&'a StandardBaseManifest>,
}

impl<'a> AssetResolver<'a> {
    pub fn new(shared_dir: &Path, base: Option<&'a StandardBaseManifest>) -> Self {
        Self {
            shared_sounds: shared_dir.join("sounds").join("general"),
            base,
        }
    }

    /// Resolve a plain sound file (preanim sfx). On `NeedsCopy` the file set
    /// gains an entry pointing at the shared installation's sound pool; the
    /// source's existence is only checked later, by the archiver.
    pub fn resolve_sound(
        &self,
        file_name: &str,
        files: &mut FileSet,
    ) -> Result<Disposition, StoreError> {
        if files.find_ignore_case(file_name).is_some() {
            debug!("'{file_name}' satisfied by the bundle itself");
            return Ok(Disposition::Local);
        }
        if let Some(base) = self.base {
            if let Some((stored, _)) = base.lookup(file_name) {
                debug!("'{file_name}' satisfied by base as '{stored}'");
                return Ok(Disposition::BaseSatisfied(stored.to_owned()));
            }
        }
        files.insert(file_name, self.shared_sounds.join(file_name))?;
        Ok(Disposition::NeedsCopy)
    }

    /// Resolve the blip sound. Returns the name the manifest should record
    /// alongside the disposition.
    pub fn resolve_blip(
        &self,
        gender: Option<&str>,
        files: &mut FileSet,
    ) -> Result<(String, Disposition), StoreError> {
        if files.find_ignore_case(BLIP_FILE).is_some() {
            return Ok((BLIP_FILE.to_owned(), Disposition::Local));
        }

        let gender = gender.unwrap_or_else(|| {
            warn!("definition has no gender, assuming '{DEFAULT_GENDER}' blip");
            DEFAULT_GENDER
        });
        let blip_sfx = format!("sfx-blip{gender}.wav");

        if let Some(base) = self.base {
            if let Some((stored, _)) = base.lookup(&blip_sfx) {
                return Ok((stored.to_owned(), Disposition::BaseSatisfied(stored.to_owned())));
            }
        }
        files.insert(BLIP_FILE, self.shared_sounds.join(&blip_sfx))?;
        Ok((BLIP_FILE.to_owned(), Disposition::NeedsCopy))
    }

    /// Scan the bundle's file set for interjection overrides.
    ///
    /// Matching is case-insensitive on the four canonical stems. A local
    /// sound byte-identical to the base's registered copy is dropped from
    /// the file set; the override still references it by name. Hashing
    /// problems are logged and skipped, never fatal.
    pub fn resolve_interjections(
        &self,
        files: &mut FileSet,
    ) -> BTreeMap<String, InterjectionOverride> {
        let mut overrides = BTreeMap::new();

        for (key, stem) in INTERJECTIONS {
            let Some(sound) = files
                .find_ignore_case(&format!("{stem}.wav"))
                .map(ToOwned::to_owned)
            else {
                continue;
            };

            let anim = files
                .find_ignore_case(&format!("{stem}_bubble.gif"))
                .map_or_else(|| format!("{stem}.gif"), ToOwned::to_owned);

            if self.matches_base_copy(&sound, files) {
                info!("dropping '{sound}': byte-identical to the base copy");
                files.remove(&sound);
            }

            overrides.insert(key.to_owned(), InterjectionOverride { sound, anim });
        }

        overrides
    }

    fn matches_base_copy(&self, sound: &str, files: &FileSet) -> bool {
        let Some(registered) = self.base.and_then(|b| b.hash_of(sound)) else {
            return false;
        };
        let Some(source) = files.source_of(sound) else {
            return false;
        };
        match fs::read(source) {
            Ok(bytes) => blake3::hash(&bytes).to_hex().as_str() == registered,
            Err(e) => {
                debug!("cannot hash '{sound}' for base comparison: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use charpack_schema::parse_base_manifest;

    fn base_with(entries: &[(&str, &str)]) -> StandardBaseManifest {
        let files: Vec<String> = entries
            .iter()
            .map(|(k, v)| format!("\"{k}\": \"{v}\""))
            .collect();
        parse_base_manifest(&format!(
            "{{ \"id\": \"base-1\", \"files\": {{ {} }} }}",
            files.join(", ")
        ))
        .unwrap()
    }

    #[test]
    fn local_sound_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = FileSet::new();
        files.insert("Beep.wav", dir.path().join("Beep.wav")).unwrap();

        let resolver = AssetResolver::new(Path::new("/shared"), None);
        let d = resolver.resolve_sound("beep.wav", &mut files).unwrap();
        assert_eq!(d, Disposition::Local);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn base_satisfied_sound_is_not_copied() {
        let base = base_with(&[("sfx/beep.wav", "aa")]);
        let mut files = FileSet::new();
        let resolver = AssetResolver::new(Path::new("/shared"), Some(&base));

        let d = resolver.resolve_sound("beep.wav", &mut files).unwrap();
        assert_eq!(d, Disposition::BaseSatisfied("sfx/beep.wav".to_owned()));
        assert!(files.is_empty());
    }

    #[test]
    fn unknown_sound_needs_copy_from_shared_pool() {
        let mut files = FileSet::new();
        let resolver = AssetResolver::new(Path::new("/shared"), None);

        let d = resolver.resolve_sound("beep.wav", &mut files).unwrap();
        assert_eq!(d, Disposition::NeedsCopy);
        assert_eq!(
            files.source_of("beep.wav").unwrap(),
            Path::new("/shared/sounds/general/beep.wav")
        );
    }

    #[test]
    fn blip_defaults_to_male() {
        let mut files = FileSet::new();
        let resolver = AssetResolver::new(Path::new("/shared"), None);

        let (name, d) = resolver.resolve_blip(None, &mut files).unwrap();
        assert_eq!(name, "blip.wav");
        assert_eq!(d, Disposition::NeedsCopy);
        assert_eq!(
            files.source_of("blip.wav").unwrap(),
            Path::new("/shared/sounds/general/sfx-blipmale.wav")
        );
    }

    #[test]
    fn blip_uses_declared_gender() {
        let mut files = FileSet::new();
        let resolver = AssetResolver::new(Path::new("/shared"), None);
        resolver.resolve_blip(Some("female"), &mut files).unwrap();
        assert_eq!(
            files.source_of("blip.wav").unwrap(),
            Path::new("/shared/sounds/general/sfx-blipfemale.wav")
        );
    }

    #[test]
    fn blip_can_be_base_satisfied() {
        let base = base_with(&[("sfx/sfx-blipmale.wav", "aa")]);
        let mut files = FileSet::new();
        let resolver = AssetResolver::new(Path::new("/shared"), Some(&base));

        let (name, d) = resolver.resolve_blip(None, &mut files).unwrap();
        assert_eq!(name, "sfx/sfx-blipmale.wav");
        assert_eq!(d, Disposition::BaseSatisfied("sfx/sfx-blipmale.wav".to_owned()));
        assert!(files.is_empty());
    }

    #[test]
    fn interjections_detected_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("HoldIt.wav"), "sound").unwrap();
        let mut files = FileSet::new();
        files
            .insert("HoldIt.wav", dir.path().join("HoldIt.wav"))
            .unwrap();

        let resolver = AssetResolver::new(Path::new("/shared"), None);
        let overrides = resolver.resolve_interjections(&mut files);

        let hold_it = overrides.get("hold_it").unwrap();
        assert_eq!(hold_it.sound, "HoldIt.wav");
        assert_eq!(hold_it.anim, "holdit.gif");
        assert!(!overrides.contains_key("objection"));
    }

    #[test]
    fn bubble_variant_preferred_for_anim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("objection.wav"), "sound").unwrap();
        std::fs::write(dir.path().join("Objection_bubble.gif"), "anim").unwrap();
        let mut files = FileSet::new();
        files
            .insert("objection.wav", dir.path().join("objection.wav"))
            .unwrap();
        files
            .insert("Objection_bubble.gif", dir.path().join("Objection_bubble.gif"))
            .unwrap();

        let resolver = AssetResolver::new(Path::new("/shared"), None);
        let overrides = resolver.resolve_interjections(&mut files);
        assert_eq!(overrides["objection"].anim, "Objection_bubble.gif");
    }

    #[test]
    fn base_identical_interjection_dropped_from_file_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("objection.wav"), "same bytes").unwrap();
        let hash = blake3::hash(b"same bytes").to_hex().to_string();
        let base = base_with(&[("objection.wav", hash.as_str())]);

        let mut files = FileSet::new();
        files
            .insert("objection.wav", dir.path().join("objection.wav"))
            .unwrap();

        let resolver = AssetResolver::new(Path::new("/shared"), Some(&base));
        let overrides = resolver.resolve_interjections(&mut files);

        assert_eq!(overrides["objection"].sound, "objection.wav");
        assert!(!files.contains("objection.wav"));
    }

    #[test]
    fn differing_interjection_stays_in_file_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("objection.wav"), "local bytes").unwrap();
        let base_hash = blake3::hash(b"different base bytes").to_hex().to_string();
        let base = base_with(&[("objection.wav", base_hash.as_str())]);

        let mut files = FileSet::new();
        files
            .insert("objection.wav", dir.path().join("objection.wav"))
            .unwrap();

        let resolver = AssetResolver::new(Path::new("/shared"), Some(&base));
        resolver.resolve_interjections(&mut files);
        assert!(files.contains("objection.wav"));
    }
}
