use std::path::Path;

use coingro_common::response::print_warning;
use coingro_types::StrategyManifest;

use crate::error::Error;

/// Scans `directory` for strategy plugin manifests (`*.json`), optionally
/// descending into subdirectories. Pure over the filesystem: unreadable or
/// invalid entries are logged and skipped, a missing directory yields an
/// empty list. The result is sorted by name so reconcile passes are stable.
pub fn search_strategies(
    directory: &Path,
    recursive: bool,
) -> Result<Vec<StrategyManifest>, Error> {
    let mut manifests = Vec::new();
    if !directory.is_dir() {
        print_warning(anyhow::anyhow!(
            "Strategy directory {} does not exist.",
            directory.display()
        ));
        return Ok(manifests);
    }
    scan_directory(directory, recursive, &mut manifests);
    manifests.sort_by(|a, b| a.name.cmp(&b.name));
    manifests.dedup_by(|a, b| a.name == b.name);
    Ok(manifests)
}

fn scan_directory(directory: &Path, recursive: bool, manifests: &mut Vec<StrategyManifest>) {
    let entries = match std::fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            print_warning(anyhow::anyhow!(
                "Could not read strategy directory {}: {}",
                directory.display(),
                e
            ));
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            if recursive {
                scan_directory(&path, recursive, manifests);
            }
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        match read_manifest(&path) {
            Ok(manifest) => manifests.push(manifest),
            Err(e) => print_warning(anyhow::anyhow!(
                "Skipping invalid strategy manifest {}: {}",
                path.display(),
                e
            )),
        }
    }
}

fn read_manifest(path: &Path) -> Result<StrategyManifest, Error> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::operational(format!("unreadable: {}", e)))?;
    let manifest: StrategyManifest = serde_json::from_str(&raw)?;
    if manifest.name.trim().is_empty() {
        return Err(Error::operational("manifest has no name"));
    }
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_manifest(dir: &Path, file: &str, body: &str) {
        let mut f = std::fs::File::create(dir.join(file)).unwrap();
        f.write_all(body.as_bytes()).unwrap();
    }

    #[test]
    fn discovers_sorted_manifests_and_skips_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(
            dir.path(),
            "b.json",
            r#"{"name": "Strategy02", "tags": ["trend"]}"#,
        );
        write_manifest(
            dir.path(),
            "a.json",
            r#"{"name": "Strategy01", "category": "scalping"}"#,
        );
        write_manifest(dir.path(), "broken.json", "{ not json");
        write_manifest(dir.path(), "notes.txt", "ignored");

        let manifests = search_strategies(dir.path(), false).unwrap();
        let names: Vec<&str> = manifests.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Strategy01", "Strategy02"]);
        assert_eq!(manifests[0].category.as_deref(), Some("scalping"));
    }

    #[test]
    fn recursive_search_is_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        write_manifest(&nested, "deep.json", r#"{"name": "DeepStrategy"}"#);

        assert!(search_strategies(dir.path(), false).unwrap().is_empty());
        let found = search_strategies(dir.path(), true).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "DeepStrategy");
    }

    #[test]
    fn missing_directory_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(search_strategies(&missing, true).unwrap().is_empty());
    }
}
