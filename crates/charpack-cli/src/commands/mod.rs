pub mod completions;
pub mod convert;
pub mod convert_all;
pub mod inspect;
pub mod list;
pub mod verify;

use charpack_core::ConvertOptions;
use charpack_schema::load_base_manifest;
use charpack_store::PackageStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_DEFINITION_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// A 0–100 bar for one character conversion.
pub fn percent_bar(name: &str) -> ProgressBar {
    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::with_template("{msg:>20} [{bar:40.cyan/blue}] {pos:>3}%")
            .expect("valid template")
            .progress_chars("=> "),
    );
    pb.set_message(name.to_owned());
    pb
}

/// Build [`ConvertOptions`] from the shared command-line arguments.
pub fn convert_options(args: &crate::ConvertArgs) -> Result<ConvertOptions, String> {
    let base_manifest = match &args.base_manifest {
        Some(path) => Some(load_base_manifest(path).map_err(|e| format!("base manifest error: {e}"))?),
        None => None,
    };
    Ok(ConvertOptions {
        digest: args.digest,
        strictness: if args.strict_durations {
            charpack_schema::DialectStrictness::Strict
        } else {
            charpack_schema::DialectStrictness::Lenient
        },
        base_manifest,
        scratch_dir: args.scratch.clone(),
        author: args.author.clone(),
        description: args.description.clone(),
    })
}

/// Resolve user input (full digest, bare hex, or hex prefix) to a package.
pub fn resolve_digest(store: &PackageStore, input: &str) -> Result<String, String> {
    let hex = input.split_once(':').map_or(input, |(_, hex)| hex);

    let packages = store.list().map_err(|e| e.to_string())?;
    if packages.iter().any(|p| p == hex) {
        return Ok(hex.to_owned());
    }

    let matches: Vec<_> = packages.iter().filter(|p| p.starts_with(hex)).collect();
    match matches.len() {
        0 => Err(format!("no package matching '{input}'")),
        1 => Ok(matches[0].clone()),
        n => Err(format!("ambiguous digest prefix '{input}': matches {n} packages")),
    }
}
