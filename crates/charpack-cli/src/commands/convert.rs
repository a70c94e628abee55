use super::{convert_options, json_pretty, percent_bar, EXIT_SUCCESS};
use crate::ConvertArgs;
use charpack_core::{convert, find_shared_assets, NullProgress, StoreLock, DEFINITION_FILE};
use charpack_store::{PackageStore, StoreLayout};
use std::path::{Path, PathBuf};

pub fn run(
    store_path: &Path,
    char_dir: &Path,
    args: &ConvertArgs,
    json: bool,
) -> Result<u8, String> {
    let char_dir = char_dir
        .canonicalize()
        .map_err(|e| format!("cannot access {}: {e}", char_dir.display()))?;
    if !char_dir.join(DEFINITION_FILE).is_file() {
        return Err(format!("no {DEFINITION_FILE} in {}", char_dir.display()));
    }
    let assets = resolve_assets(args, &char_dir)?;
    let options = convert_options(args)?;

    let layout = StoreLayout::new(store_path);
    let _lock = StoreLock::acquire(&layout.lock_file()).map_err(|e| format!("store lock: {e}"))?;
    let store = PackageStore::open(store_path).map_err(|e| format!("store error: {e}"))?;

    let character = char_dir
        .file_name()
        .map_or_else(|| char_dir.display().to_string(), |n| n.to_string_lossy().into_owned());

    let result = if json {
        convert(&char_dir, &assets, &store, &options, &NullProgress)
    } else {
        let pb = percent_bar(&character);
        let sink = |percent: u8| pb.set_position(u64::from(percent));
        let result = convert(&char_dir, &assets, &store, &options, &sink);
        match &result {
            Ok(_) => pb.finish(),
            Err(_) => pb.abandon(),
        }
        result
    };
    let outcome = result.map_err(|e| e.to_string())?;

    if json {
        let payload = serde_json::json!({
            "character": character,
            "digest": outcome.digest.to_string(),
            "package": outcome.package_path,
            "warnings": outcome.warnings.iter().map(ToString::to_string).collect::<Vec<_>>(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("converted '{character}' -> {}", outcome.digest);
        println!("package: {}", outcome.package_path.display());
        if !outcome.warnings.is_empty() {
            println!("{} warning(s), see log output", outcome.warnings.len());
        }
    }
    Ok(EXIT_SUCCESS)
}

/// Explicit --assets wins; otherwise look for a shared installation around
/// the bundle (a grandparent directory carrying sounds/).
fn resolve_assets(args: &ConvertArgs, char_dir: &Path) -> Result<PathBuf, String> {
    if let Some(assets) = &args.assets {
        return Ok(assets.clone());
    }
    find_shared_assets(char_dir).ok_or_else(|| {
        format!(
            "cannot auto-detect the shared assets directory for {}; pass --assets",
            char_dir.display()
        )
    })
}
