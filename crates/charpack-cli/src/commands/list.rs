use super::{json_pretty, EXIT_SUCCESS};
use charpack_store::PackageStore;
use console::Style;
use std::path::Path;

pub fn run(store_path: &Path, json: bool) -> Result<u8, String> {
    let store = PackageStore::open(store_path).map_err(|e| format!("store error: {e}"))?;
    let packages = store.list().map_err(|e| format!("store error: {e}"))?;

    if json {
        let entries: Vec<_> = packages
            .iter()
            .map(|hex| match store.read_manifest(hex) {
                Ok(m) => serde_json::json!({
                    "digest": m.digest,
                    "name": m.name,
                    "side": m.side,
                    "date": m.meta.as_ref().map(|meta| meta.date.clone()),
                }),
                Err(_) => serde_json::json!({ "digest": hex, "unreadable": true }),
            })
            .collect();
        println!("{}", json_pretty(&entries)?);
        return Ok(EXIT_SUCCESS);
    }

    if packages.is_empty() {
        println!("no packages found");
        return Ok(EXIT_SUCCESS);
    }

    let dim = Style::new().dim();
    println!("{:<20} {:<8} {:<27} DIGEST", "NAME", "SIDE", "DATE");
    for hex in &packages {
        match store.read_manifest(hex) {
            Ok(m) => {
                let date = m.meta.as_ref().map_or("", |meta| meta.date.as_str());
                println!("{:<20} {:<8} {:<27} {}", m.name, m.side, date, dim.apply_to(hex));
            }
            Err(e) => println!("{:<20} {:<8} {:<27} {}", "(unreadable)", "", e, dim.apply_to(hex)),
        }
    }
    Ok(EXIT_SUCCESS)
}
