//! Module resolution for `require` inside an extension isolate.
//!
//! Extensions may load their own files and the packages under their own
//! `node_modules`, transitively. Nothing outside the extension's install root
//! is reachable, and there are no built-in host modules.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::extensions::error::{ExtensionError, ExtensionResult};
use crate::extensions::manifest::{DEFAULT_ENTRY, MANIFEST_FILE};

const EXTENSIONS: [&str; 2] = ["js", "json"];

/// Canonicalize `path` and make sure it stays under `root`.
pub(crate) fn confine(root: &Path, path: &Path) -> ExtensionResult<PathBuf> {
    let root = root.canonicalize()?;
    let resolved = path.canonicalize()?;
    if resolved.starts_with(&root) {
        Ok(resolved)
    } else {
        Err(ExtensionError::ModuleOutsideRoot(resolved))
    }
}

/// How the loader should evaluate a resolved module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Script,
    Json,
}

/// A module file found by [`ModuleResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedModule {
    pub path: String,
    pub dirname: String,
    pub kind: ModuleKind,
}

/// Resolves `require` specifiers within one extension root.
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    root: PathBuf,
}

impl ModuleResolver {
    pub fn new(install_root: &Path) -> ExtensionResult<Self> {
        Ok(Self {
            root: install_root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `specifier` as required from a module living in `from_dir`.
    pub fn resolve(&self, from_dir: &Path, specifier: &str) -> ExtensionResult<ResolvedModule> {
        let not_found = || ExtensionError::ModuleNotFound {
            specifier: specifier.to_string(),
            from: from_dir.to_path_buf(),
        };

        if specifier.is_empty() || Path::new(specifier).has_root() || specifier.contains(':') {
            return Err(not_found());
        }

        let from_dir = confine(&self.root, from_dir)?;

        let found = if is_relative(specifier) {
            self.load_as_file_or_dir(&from_dir.join(specifier))?
        } else {
            self.load_from_node_modules(&from_dir, specifier)?
        };

        let path = found.ok_or_else(not_found)?;
        let kind = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => ModuleKind::Json,
            _ => ModuleKind::Script,
        };
        let dirname = path.parent().unwrap_or(&self.root).to_path_buf();

        Ok(ResolvedModule {
            path: path.to_string_lossy().into_owned(),
            dirname: dirname.to_string_lossy().into_owned(),
            kind,
        })
    }

    /// Read a resolved module's source.
    pub fn read(&self, path: &Path) -> ExtensionResult<String> {
        let path = confine(&self.root, path)?;
        Ok(std::fs::read_to_string(path)?)
    }

    fn load_from_node_modules(&self, from_dir: &Path, specifier: &str) -> ExtensionResult<Option<PathBuf>> {
        // Reject `pkg/../../escape` before touching the disk.
        if Path::new(specifier)
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Ok(None);
        }

        let mut dir = Some(from_dir);
        while let Some(current) = dir {
            if !current.starts_with(&self.root) {
                break;
            }
            let candidate = current.join("node_modules").join(specifier);
            if let Some(found) = self.load_as_file_or_dir(&candidate)? {
                return Ok(Some(found));
            }
            dir = current.parent();
        }
        Ok(None)
    }

    fn load_as_file_or_dir(&self, candidate: &Path) -> ExtensionResult<Option<PathBuf>> {
        if let Some(found) = self.load_as_file(candidate)? {
            return Ok(Some(found));
        }
        if candidate.is_dir() {
            return self.load_as_dir(candidate);
        }
        Ok(None)
    }

    fn load_as_file(&self, candidate: &Path) -> ExtensionResult<Option<PathBuf>> {
        if candidate.is_file() {
            return confine(&self.root, candidate).map(Some);
        }
        for ext in EXTENSIONS {
            let mut with_ext = candidate.as_os_str().to_owned();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return confine(&self.root, &with_ext).map(Some);
            }
        }
        Ok(None)
    }

    fn load_as_dir(&self, dir: &Path) -> ExtensionResult<Option<PathBuf>> {
        let manifest = dir.join(MANIFEST_FILE);
        if manifest.is_file() {
            let main = std::fs::read_to_string(&manifest)
                .ok()
                .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
                .and_then(|pkg| pkg.get("main").and_then(|m| m.as_str()).map(str::to_string));
            if let Some(main) = main {
                let target = dir.join(main);
                if let Some(found) = self.load_as_file(&target)? {
                    return Ok(Some(found));
                }
                if target.is_dir() {
                    if let Some(found) = self.load_as_file(&target.join(DEFAULT_ENTRY))? {
                        return Ok(Some(found));
                    }
                }
            }
        }
        self.load_as_file(&dir.join("index"))
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}
