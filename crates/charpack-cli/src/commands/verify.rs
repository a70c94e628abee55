use super::{json_pretty, spin_fail, spin_ok, spinner, EXIT_FAILURE, EXIT_SUCCESS};
use charpack_store::{verify_store, PackageStore};
use std::path::Path;

pub fn run(store_path: &Path, json: bool) -> Result<u8, String> {
    let store = PackageStore::open(store_path).map_err(|e| format!("store error: {e}"))?;

    let pb = if json { None } else { Some(spinner("verifying packages...")) };
    let report = match verify_store(&store) {
        Ok(r) => r,
        Err(e) => {
            if let Some(ref pb) = pb {
                spin_fail(pb, "verification aborted");
            }
            return Err(format!("store error: {e}"));
        }
    };

    if let Some(ref pb) = pb {
        if report.is_clean() {
            spin_ok(pb, &format!("{} package(s) verified", report.checked));
        } else {
            spin_fail(
                pb,
                &format!("{} of {} package(s) damaged", report.failures.len(), report.checked),
            );
        }
    }

    if json {
        let failures: Vec<_> = report
            .failures
            .iter()
            .map(|f| serde_json::json!({ "package": f.package, "reason": f.reason }))
            .collect();
        let payload = serde_json::json!({
            "checked": report.checked,
            "clean": report.is_clean(),
            "failures": failures,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        for failure in &report.failures {
            println!("  ✗ {}: {}", failure.package, failure.reason);
        }
    }

    Ok(if report.is_clean() { EXIT_SUCCESS } else { EXIT_FAILURE })
}
