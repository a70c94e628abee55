use charpack_core::{convert, run_batch, CancelToken, ConvertError, ConvertOptions, NullProgress};
use charpack_schema::{parse_base_manifest, parse_manifest_str, DialectStrictness, ManifestInfo};
use charpack_store::{DigestAlgorithm, PackageStore, StoreError, CONTENT_FILE, INFO_FILE};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

fn write_character(root: &Path, name: &str, ini: &str) -> PathBuf {
    let dir = root.join("characters").join(name);
    fs::create_dir_all(dir.join("emotions")).unwrap();
    fs::write(dir.join("char.ini"), ini).unwrap();
    fs::write(dir.join("char_icon.png"), "icon bytes").unwrap();
    fs::write(dir.join("emotions").join("button1_on.png"), "button bytes").unwrap();
    dir
}

fn write_shared(root: &Path) -> PathBuf {
    let sounds = root.join("sounds").join("general");
    fs::create_dir_all(&sounds).unwrap();
    fs::write(sounds.join("sfx-blipmale.wav"), "male blip bytes").unwrap();
    fs::write(sounds.join("sfx-blipfemale.wav"), "female blip bytes").unwrap();
    fs::write(sounds.join("beep.wav"), "beep bytes").unwrap();
    root.to_path_buf()
}

fn read_manifest(package: &Path) -> ManifestInfo {
    let json = fs::read_to_string(package.join(INFO_FILE)).unwrap();
    parse_manifest_str(&json).unwrap()
}

fn archive_entries(package: &Path) -> BTreeMap<String, Vec<u8>> {
    let data = fs::read(package.join(CONTENT_FILE)).unwrap();
    let mut ar = tar::Archive::new(data.as_slice());
    let mut out = BTreeMap::new();
    for entry in ar.entries().unwrap() {
        let mut entry = entry.unwrap();
        let name = entry.path().unwrap().to_string_lossy().into_owned();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut entry, &mut bytes).unwrap();
        out.insert(name, bytes);
    }
    out
}

const MINIMAL_INI: &str = "\
[Options]
name = Test
side = def

[Emotions]
number = 1
1 = Smile#-#happy#0
";

const PREANIM_INI: &str = "\
[Options]
name = Test
side = def

[Emotions]
number = 1
1 = Talk#think#busy#0

[Time]
think = 10

[SoundN]
1 = beep

[SoundT]
1 = 5
";

#[test]
fn minimal_conversion_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", MINIMAL_INI);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let outcome = convert(
        &char_dir,
        &shared,
        &store,
        &ConvertOptions::default(),
        &NullProgress,
    )
    .unwrap();

    assert!(outcome.digest.to_string().starts_with("crc32:"));
    assert!(store.exists(outcome.digest.hex()));

    let manifest = read_manifest(&outcome.package_path);
    assert_eq!(manifest.name, "Test");
    assert_eq!(manifest.side, "def");
    assert_eq!(manifest.icon, "char_icon.png");
    assert_eq!(manifest.blip, "blip.wav");
    assert_eq!(manifest.emotes.len(), 1);

    let emote = &manifest.emotes[0];
    assert_eq!(emote.name, "Smile");
    assert_eq!(emote.idle, "(a)happy.gif");
    assert_eq!(emote.talking, "(b)happy.gif");
    assert_eq!(emote.icon, "emotions/button1_on.png");
    assert_eq!(emote.talking_preanim, None);
    assert!(manifest.preanims.is_empty());

    // The blip was copied in from the shared pool under its archive name.
    let entries = archive_entries(&outcome.package_path);
    assert_eq!(entries["blip.wav"], b"male blip bytes");
    assert!(entries.contains_key("char.ini"));
    assert!(entries.contains_key("emotions/button1_on.png"));
    assert_eq!(manifest.files, entries.keys().cloned().collect::<Vec<_>>());
    assert_eq!(manifest.digest, outcome.digest.to_string());
}

#[test]
fn preanim_with_sfx_end_to_end() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", PREANIM_INI);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let outcome = convert(
        &char_dir,
        &shared,
        &store,
        &ConvertOptions::default(),
        &NullProgress,
    )
    .unwrap();

    let manifest = read_manifest(&outcome.package_path);
    assert_eq!(manifest.emotes[0].talking_preanim.as_deref(), Some("think"));

    let preanim = &manifest.preanims["think"];
    assert_eq!(preanim.anim, "think.gif");
    assert_eq!(preanim.duration, Some(600));
    let sfx = preanim.sfx.as_ref().unwrap();
    assert_eq!(sfx.file, "beep.wav");
    assert_eq!(sfx.delay, 300);

    let entries = archive_entries(&outcome.package_path);
    assert_eq!(entries["beep.wav"], b"beep bytes");
}

#[test]
fn reconversion_is_idempotent_and_byte_stable() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", PREANIM_INI);
    let shared = write_shared(root.path());

    let store_a = PackageStore::open(root.path().join("store-a")).unwrap();
    let store_b = PackageStore::open(root.path().join("store-b")).unwrap();
    let options = ConvertOptions::default();

    let a = convert(&char_dir, &shared, &store_a, &options, &NullProgress).unwrap();
    let b = convert(&char_dir, &shared, &store_b, &options, &NullProgress).unwrap();

    assert_eq!(a.digest, b.digest);
    assert_eq!(
        fs::read(a.package_path.join(CONTENT_FILE)).unwrap(),
        fs::read(b.package_path.join(CONTENT_FILE)).unwrap()
    );

    // Republishing into the same store is a safe no-op.
    let again = convert(&char_dir, &shared, &store_a, &options, &NullProgress).unwrap();
    assert_eq!(again.digest, a.digest);
}

#[test]
fn blake3_digest_selectable() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", MINIMAL_INI);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let options = ConvertOptions {
        digest: DigestAlgorithm::Blake3,
        ..ConvertOptions::default()
    };
    let outcome = convert(&char_dir, &shared, &store, &options, &NullProgress).unwrap();
    assert!(outcome.digest.to_string().starts_with("blake3:"));
    assert_eq!(outcome.digest.hex().len(), 64);
}

#[test]
fn declared_gender_selects_blip() {
    let root = tempfile::tempdir().unwrap();
    let ini = MINIMAL_INI.replace("side = def", "side = def\ngender = female");
    let char_dir = write_character(root.path(), "test", &ini);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let outcome = convert(
        &char_dir,
        &shared,
        &store,
        &ConvertOptions::default(),
        &NullProgress,
    )
    .unwrap();
    let entries = archive_entries(&outcome.package_path);
    assert_eq!(entries["blip.wav"], b"female blip bytes");
}

#[test]
fn base_identical_interjection_left_out_of_archive() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", MINIMAL_INI);
    fs::write(char_dir.join("Objection.wav"), "stock objection bytes").unwrap();
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let hash = blake3::hash(b"stock objection bytes").to_hex().to_string();
    let base = parse_base_manifest(&format!(
        r#"{{ "id": "vanilla-1.0", "files": {{ "objection.wav": "{hash}" }} }}"#
    ))
    .unwrap();

    let options = ConvertOptions {
        base_manifest: Some(base),
        ..ConvertOptions::default()
    };
    let outcome = convert(&char_dir, &shared, &store, &options, &NullProgress).unwrap();

    let manifest = read_manifest(&outcome.package_path);
    assert_eq!(manifest.parent.as_deref(), Some("vanilla-1.0"));
    let objection = &manifest.objection_override["objection"];
    assert_eq!(objection.sound, "Objection.wav");

    let entries = archive_entries(&outcome.package_path);
    assert!(!entries.contains_key("Objection.wav"));
    assert!(!manifest.files.iter().any(|f| f == "Objection.wav"));
}

#[test]
fn base_satisfied_sfx_not_copied() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", PREANIM_INI);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let base = parse_base_manifest(
        r#"{ "id": "vanilla-1.0", "files": { "sfx/beep.wav": "aa11" } }"#,
    )
    .unwrap();
    let options = ConvertOptions {
        base_manifest: Some(base),
        ..ConvertOptions::default()
    };
    let outcome = convert(&char_dir, &shared, &store, &options, &NullProgress).unwrap();

    let manifest = read_manifest(&outcome.package_path);
    let sfx = manifest.preanims["think"].sfx.as_ref().unwrap();
    assert_eq!(sfx.file, "sfx/beep.wav");

    let entries = archive_entries(&outcome.package_path);
    assert!(!entries.contains_key("beep.wav"));
}

#[test]
fn strict_durations_make_missing_time_fatal() {
    let root = tempfile::tempdir().unwrap();
    let ini = "[Options]\nname = Test\nside = def\n[Emotions]\nnumber = 1\n1 = Talk#think#busy#0\n[SoundN]\n1 = beep\n[SoundT]\n1 = 5\n";
    let char_dir = write_character(root.path(), "test", ini);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let options = ConvertOptions {
        strictness: DialectStrictness::Strict,
        ..ConvertOptions::default()
    };
    let err = convert(&char_dir, &shared, &store, &options, &NullProgress).unwrap_err();
    assert!(matches!(err, ConvertError::Definition(_)));
    assert_eq!(store.list().unwrap().len(), 0);
}

#[test]
fn missing_shared_sound_fails_at_archive_time() {
    let root = tempfile::tempdir().unwrap();
    let ini = PREANIM_INI.replace("1 = beep", "1 = nosuchsound");
    let char_dir = write_character(root.path(), "test", &ini);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let err = convert(
        &char_dir,
        &shared,
        &store,
        &ConvertOptions::default(),
        &NullProgress,
    )
    .unwrap_err();
    match err {
        ConvertError::Store(StoreError::MissingSourceFile { archive_name, .. }) => {
            assert_eq!(archive_name, "nosuchsound.wav");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.list().unwrap().len(), 0);
}

#[test]
fn progress_is_monotone_and_completes() {
    let root = tempfile::tempdir().unwrap();
    let char_dir = write_character(root.path(), "test", PREANIM_INI);
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let seen = std::sync::Mutex::new(Vec::new());
    let sink = |percent: u8| seen.lock().unwrap().push(percent);
    convert(&char_dir, &shared, &store, &ConvertOptions::default(), &sink).unwrap();

    let seen = seen.into_inner().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*seen.last().unwrap(), 100);
}

#[test]
fn batch_isolates_per_character_failures() {
    let root = tempfile::tempdir().unwrap();
    let good = write_character(root.path(), "good", MINIMAL_INI);
    // Broken: missing the required side key.
    let bad = write_character(
        root.path(),
        "bad",
        "[Options]\nname = Bad\n[Emotions]\nnumber = 0\n",
    );
    let shared = write_shared(root.path());
    let store = PackageStore::open(root.path().join("store")).unwrap();

    let (tx, rx) = mpsc::channel();
    let outcomes = run_batch(
        &[good, bad],
        &shared,
        &store,
        &ConvertOptions::default(),
        3,
        &CancelToken::new(),
        &tx,
    );
    drop(tx);

    assert_eq!(outcomes.len(), 2);
    let ok = outcomes.iter().find(|o| o.character == "good").unwrap();
    let failed = outcomes.iter().find(|o| o.character == "bad").unwrap();
    assert!(ok.result.is_ok());
    assert!(failed.result.is_err());

    // The failed sibling must not stop the good one from publishing.
    assert_eq!(store.list().unwrap().len(), 1);

    // Progress events arrived from the worker, ending at 100 for the good run.
    let events: Vec<_> = rx.try_iter().collect();
    assert!(events
        .iter()
        .any(|e| e.character == "good" && e.percent == 100));
}
