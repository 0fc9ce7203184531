//! Authoring Loader - Deterministic Document Discovery
//!
//! Compile order decides manifest/pointer write order for same-key collisions
//! within one run, so discovery must be stable across machines.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::AUTHORING_EXT;

/// Recursively collect every authoring document under `root`, sorted in
/// lexicographic path order.
///
/// A missing root is the caller's concern (the orchestrator treats it as an
/// empty run); any walk error during traversal propagates.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_authoring = entry
            .file_name()
            .to_str()
            .map_or(false, |name| name.ends_with(AUTHORING_EXT));
        if is_authoring {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovery_is_recursive_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/nested")).unwrap();
        fs::write(dir.path().join("b/nested/z.page.xml"), "<page/>").unwrap();
        fs::write(dir.path().join("b/a.page.xml"), "<page/>").unwrap();
        fs::write(dir.path().join("a.page.xml"), "<page/>").unwrap();
        fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let files = discover(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.page.xml", "b/a.page.xml", "b/nested/z.page.xml"]);
    }

    #[test]
    fn missing_root_is_an_error_for_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(discover(&missing).is_err());
    }
}
