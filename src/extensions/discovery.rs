//! Discovery of extension directories on disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, warn};

use super::error::{ExtensionError, ExtensionResult};
use super::manifest::MANIFEST_FILE;
use super::notify::{HostNotifier, PopupIcon};

/// List candidate extension directories under `root`.
///
/// A candidate is a directory with a manifest file at its top level. Other
/// entries are skipped without comment. Order is whatever the file system
/// enumeration yields.
pub fn scan(root: &Path) -> ExtensionResult<Vec<PathBuf>> {
    let entries = fs::read_dir(root).map_err(|source| ExtensionError::Discovery {
        path: root.to_path_buf(),
        source,
    })?;

    let mut candidates = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if !path.join(MANIFEST_FILE).is_file() {
            debug!(path = %path.display(), "Skipping directory without manifest");
            continue;
        }
        candidates.push(path);
    }
    Ok(candidates)
}

/// Like [`scan`], but an unreadable root is reported to the user and treated
/// as holding no extensions.
pub fn discover(root: &Path, notifier: &dyn HostNotifier) -> Vec<PathBuf> {
    match scan(root) {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(path = %root.display(), error = %e, "Extension discovery failed");
            notifier.popup(PopupIcon::Error, e.user_message().to_string());
            Vec::new()
        }
    }
}

/// Create the external extensions root if it does not exist yet.
///
/// Best-effort: failure is logged and never aborts startup.
pub fn ensure_root(root: &Path) {
    if root.is_dir() {
        return;
    }
    match fs::create_dir_all(root) {
        Ok(()) => debug!(path = %root.display(), "Created extensions directory"),
        Err(e) => warn!(path = %root.display(), error = %e, "Unable to create extensions directory"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extensions::notify::testing::RecordingNotifier;
    use tempfile::tempdir;

    fn create_extension(root: &Path, name: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(MANIFEST_FILE),
            format!(r#"{{"name": "{name}", "version": "1.0.0"}}"#),
        )
        .unwrap();
    }

    #[test]
    fn test_scan_only_directories_with_manifest() {
        let temp = tempdir().unwrap();
        create_extension(temp.path(), "one");
        create_extension(temp.path(), "two");
        fs::create_dir(temp.path().join("empty")).unwrap();
        fs::write(temp.path().join("stray.txt"), "hello").unwrap();

        let mut found: Vec<_> = scan(temp.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        found.sort();

        assert_eq!(found, vec!["one", "two"]);
    }

    #[test]
    fn test_discover_missing_root_shows_popup() {
        let temp = tempdir().unwrap();
        let notifier = RecordingNotifier::default();

        let found = discover(&temp.path().join("nope"), &notifier);

        assert!(found.is_empty());
        assert_eq!(notifier.popups(), 1);
    }

    #[test]
    fn test_discover_empty_root_is_silent() {
        let temp = tempdir().unwrap();
        let notifier = RecordingNotifier::default();

        assert!(discover(temp.path(), &notifier).is_empty());
        assert!(notifier.events().is_empty());
    }

    #[test]
    fn test_ensure_root_is_idempotent() {
        let temp = tempdir().unwrap();
        let root = temp.path().join("a").join("extensions");

        ensure_root(&root);
        ensure_root(&root);

        assert!(root.is_dir());
    }
}
