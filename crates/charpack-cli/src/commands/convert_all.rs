use super::{convert_options, json_pretty, percent_bar, EXIT_FAILURE, EXIT_SUCCESS};
use crate::ConvertArgs;
use charpack_core::{install_ctrlc, run_batch, CancelToken, StoreLock};
use charpack_store::{PackageStore, StoreLayout};
use indicatif::{MultiProgress, ProgressBar};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;

pub fn run(
    store_path: &Path,
    chars_dir: &Path,
    args: &ConvertArgs,
    jobs: usize,
    json: bool,
) -> Result<u8, String> {
    let chars_dir = chars_dir
        .canonicalize()
        .map_err(|e| format!("cannot access {}: {e}", chars_dir.display()))?;
    let char_dirs = list_character_dirs(&chars_dir)?;
    if char_dirs.is_empty() {
        return Err(format!("no character directories under {}", chars_dir.display()));
    }

    let assets = resolve_assets(args, &chars_dir)?;
    let options = convert_options(args)?;

    let layout = StoreLayout::new(store_path);
    let _lock = StoreLock::acquire(&layout.lock_file()).map_err(|e| format!("store lock: {e}"))?;
    let store = PackageStore::open(store_path).map_err(|e| format!("store error: {e}"))?;

    let cancel = CancelToken::new();
    install_ctrlc(&cancel);

    let (tx, rx) = mpsc::channel();
    let outcomes = std::thread::scope(|scope| {
        let dirs = &char_dirs;
        let assets = &assets;
        let store = &store;
        let options = &options;
        let cancel = &cancel;
        let handle =
            scope.spawn(move || run_batch(dirs, assets, store, options, jobs, cancel, &tx));

        if !json {
            render_progress(&rx);
        }
        // Drain remaining events so workers never see a closed channel as
        // anything but harmless.
        for _ in &rx {}

        handle.join().map_err(|_| "batch worker panicked".to_owned())
    })?;

    let total = char_dirs.len();
    let converted: Vec<_> = outcomes.iter().filter(|o| o.result.is_ok()).collect();
    let failed: Vec<_> = outcomes.iter().filter(|o| o.result.is_err()).collect();
    let skipped = total - outcomes.len();

    if json {
        let entries: Vec<_> = outcomes
            .iter()
            .map(|o| match &o.result {
                Ok(out) => serde_json::json!({
                    "character": o.character,
                    "status": "converted",
                    "digest": out.digest.to_string(),
                }),
                Err(e) => serde_json::json!({
                    "character": o.character,
                    "status": "failed",
                    "error": e.to_string(),
                }),
            })
            .collect();
        let payload = serde_json::json!({
            "total": total,
            "skipped": skipped,
            "results": entries,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("converted {} of {total} characters", converted.len());
        for outcome in &failed {
            if let Err(e) = &outcome.result {
                println!("  ✗ {}: {e}", outcome.character);
            }
        }
        if skipped > 0 {
            println!("{skipped} not started (cancelled)");
        }
    }

    Ok(if failed.is_empty() { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn list_character_dirs(chars_dir: &Path) -> Result<Vec<PathBuf>, String> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(chars_dir)
        .map_err(|e| format!("cannot read {}: {e}", chars_dir.display()))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn resolve_assets(args: &ConvertArgs, chars_dir: &Path) -> Result<PathBuf, String> {
    if let Some(assets) = &args.assets {
        return Ok(assets.clone());
    }
    chars_dir
        .parent()
        .filter(|p| p.join("sounds").is_dir())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            format!(
                "cannot auto-detect the shared assets directory above {}; pass --assets",
                chars_dir.display()
            )
        })
}

/// One bar per in-flight conversion, retired as each reaches 100%.
fn render_progress(rx: &mpsc::Receiver<charpack_core::ProgressEvent>) {
    let multi = MultiProgress::new();
    let mut bars: HashMap<String, ProgressBar> = HashMap::new();

    for event in rx {
        let bar = bars
            .entry(event.character.clone())
            .or_insert_with(|| multi.add(percent_bar(&event.character)));
        bar.set_position(u64::from(event.percent));
        if event.percent >= 100 {
            if let Some(bar) = bars.remove(&event.character) {
                bar.finish_and_clear();
                multi.remove(&bar);
            }
        }
    }

    for bar in bars.values() {
        bar.abandon();
    }
}
