use crate::resolver::{AssetResolver, Disposition};
use crate::scan::{find_emotions_folder, scan_character_dir};
use crate::ConvertError;
use charpack_schema::{
    build_emotes, parse_definition, DialectStrictness, EmoteSet, ManifestInfo, PackageMeta,
    StandardBaseManifest, BuildWarning, CHAR_ICON,
};
use charpack_store::{
    pack_content, DigestAlgorithm, PackDigest, PackageStore, CONTENT_FILE, INFO_FILE,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Filename of the legacy character definition inside a bundle.
pub const DEFINITION_FILE: &str = "char.ini";

/// The linear stages of one conversion run, in execution order. Progress is
/// monotone: each stage reports its percentage on completion, and archiving
/// fills the 30–85 window proportionally to the entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Parse,
    ScanFiles,
    ResolveBlip,
    BuildEmotes,
    WriteManifest,
    Hash,
    Publish,
    Done,
}

const ARCHIVE_START: u8 = 30;
const ARCHIVE_END: u8 = 85;

impl Stage {
    pub fn percent(self) -> u8 {
        match self {
            Self::Parse => 5,
            Self::ScanFiles => 10,
            Self::ResolveBlip => 18,
            Self::BuildEmotes => 20,
            Self::WriteManifest => 25,
            Self::Hash => 85,
            Self::Publish => 95,
            Self::Done => 100,
        }
    }
}

fn archive_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return ARCHIVE_END;
    }
    let window = u64::from(ARCHIVE_END - ARCHIVE_START);
    ARCHIVE_START + (done as u64 * window / total as u64) as u8
}

/// Observer for conversion progress (0–100). Implementations must not
/// block: in a batch, updates are delivered from worker threads.
pub trait ProgressSink {
    fn update(&self, percent: u8);
}

impl<F: Fn(u8)> ProgressSink for F {
    fn update(&self, percent: u8) {
        self(percent);
    }
}

/// Sink that discards all updates.
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _percent: u8) {}
}

#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub digest: DigestAlgorithm,
    pub strictness: DialectStrictness,
    /// Enables dedup against the shared base; `None` means every externally
    /// sourced sound is copied.
    pub base_manifest: Option<StandardBaseManifest>,
    /// Where scoped conversion workspaces are created; the system temp
    /// directory when unset.
    pub scratch_dir: Option<PathBuf>,
    pub author: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug)]
pub struct ConvertOutcome {
    pub digest: PackDigest,
    pub package_path: PathBuf,
    pub warnings: Vec<BuildWarning>,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Convert one character bundle into a published content-addressed package.
///
/// All intermediate output lives in a scoped temporary workspace that is
/// released on every exit path; the store only ever sees the final atomic
/// publish. Re-converting identical input yields the same digest and is a
/// safe no-op.
pub fn convert(
    char_dir: &Path,
    shared_dir: &Path,
    store: &PackageStore,
    options: &ConvertOptions,
    progress: &dyn ProgressSink,
) -> Result<ConvertOutcome, ConvertError> {
    let character = display_name(char_dir);
    info!("-- conversion started for {character}");

    let text = fs::read_to_string(char_dir.join(DEFINITION_FILE))?;
    let def = parse_definition(&text)?;
    progress.update(Stage::Parse.percent());

    let mut files = scan_character_dir(char_dir)?;
    debug!("scanned {} files in {character}", files.len());
    progress.update(Stage::ScanFiles.percent());

    let resolver = AssetResolver::new(shared_dir, options.base_manifest.as_ref());
    let (blip, _) = resolver.resolve_blip(def.gender.as_deref(), &mut files)?;
    progress.update(Stage::ResolveBlip.percent());

    let emotions_folder = find_emotions_folder(char_dir)?;
    let EmoteSet {
        emotes,
        mut preanims,
        warnings,
    } = build_emotes(&def, &emotions_folder, options.strictness)?;
    for warning in &warnings {
        warn!("{character}: {warning}");
    }
    for preanim in preanims.values_mut() {
        if let Some(sfx) = preanim.sfx.as_mut() {
            if let Disposition::BaseSatisfied(stored) =
                resolver.resolve_sound(&sfx.file, &mut files)?
            {
                sfx.file = stored;
            }
        }
    }
    progress.update(Stage::BuildEmotes.percent());

    let objection_override = resolver.resolve_interjections(&mut files);
    let mut manifest = ManifestInfo {
        name: def.name.clone(),
        chatbox_name: def.showname.clone(),
        side: def.side.clone(),
        icon: CHAR_ICON.to_owned(),
        blip,
        emotes,
        preanims,
        objection_override,
        files: files.file_names(),
        parent: options.base_manifest.as_ref().map(|b| b.id.clone()),
        meta: Some(PackageMeta {
            author: options.author.clone(),
            desc: options.description.clone(),
            date: chrono::Local::now().to_rfc3339(),
        }),
        digest: String::new(),
    };
    progress.update(Stage::WriteManifest.percent());

    let archive = pack_content(&files, |done, total| {
        progress.update(archive_percent(done, total));
    })?;

    let digest = options.digest.digest(&archive);
    manifest.digest = digest.to_string();
    progress.update(Stage::Hash.percent());

    let workspace = match &options.scratch_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            tempfile::Builder::new().prefix("charpack-").tempdir_in(dir)?
        }
        None => tempfile::Builder::new().prefix("charpack-").tempdir()?,
    };
    fs::write(workspace.path().join(CONTENT_FILE), &archive)?;
    fs::write(workspace.path().join(INFO_FILE), manifest.to_canonical_json()?)?;

    let package_path = store.publish(&digest, workspace.path())?;
    progress.update(Stage::Publish.percent());

    info!("-- conversion complete for {character}: {digest}");
    progress.update(Stage::Done.percent());

    Ok(ConvertOutcome {
        digest,
        package_path,
        warnings,
    })
}
