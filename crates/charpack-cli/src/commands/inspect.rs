use super::{json_pretty, resolve_digest, EXIT_SUCCESS};
use charpack_store::PackageStore;
use std::path::Path;

pub fn run(store_path: &Path, digest: &str, _json: bool) -> Result<u8, String> {
    let store = PackageStore::open(store_path).map_err(|e| format!("store error: {e}"))?;
    let hex = resolve_digest(&store, digest)?;
    let manifest = store
        .read_manifest(&hex)
        .map_err(|e| format!("store error: {e}"))?;

    // The manifest is already a JSON document; print it either way.
    println!("{}", json_pretty(&manifest)?);
    Ok(EXIT_SUCCESS)
}
