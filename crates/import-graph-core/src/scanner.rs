//! Filesystem discovery: walks a package root and yields every source
//! module it contains, together with its derived dotted name.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::ScanError;

/// One named, on-disk package root to scan.
///
/// Resolving a root *name* to an on-disk *path* is delegated entirely to
/// the caller: this crate never consults the host language's
/// own import machinery to find packages.
#[derive(Debug, Clone)]
pub struct PackageRoot {
    pub name: String,
    pub path: PathBuf,
}

/// A single discovered source module.
#[derive(Debug, Clone)]
pub struct ScannedModule {
    /// Fully qualified dotted name, e.g. `pkg.sub.module`.
    pub name: String,
    pub path: PathBuf,
    pub mtime: SystemTime,
    /// `true` if this module is a package (backed by an `__init__` file).
    pub is_package: bool,
}

const SOURCE_EXTENSION: &str = "py";
const INIT_STEM: &str = "__init__";

/// Walk `root` and return every module beneath it, following symlinks.
///
/// Returns [`ScanError::NamespacePackageEncountered`] if the root has no
/// `__init__` file at its top level *and* contains no source files at all
/// anywhere beneath it (a pure namespace package, which this crate refuses
/// to treat as a scannable root).
pub fn scan_root(root: &PackageRoot) -> Result<Vec<ScannedModule>, ScanError> {
    let mut modules = Vec::new();
    let mut has_top_level_init = false;

    for entry in WalkDir::new(&root.path).follow_links(true) {
        let entry = entry.map_err(|e| ScanError::Io {
            path: e.path().unwrap_or(&root.path).to_path_buf(),
            source: std::io::Error::other(e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem.contains('.') {
            warn!(path = %path.display(), "skipping file with extra dots in its basename");
            continue;
        }

        let rel = path
            .strip_prefix(&root.path)
            .expect("walked entry must be under root")
            .with_extension("");
        let mut segments: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();

        let is_package = segments.last().map(|s| s.as_str()) == Some(INIT_STEM);
        if is_package {
            segments.pop();
        }

        let mut name_parts = vec![root.name.clone()];
        name_parts.extend(segments);
        let name = name_parts.join(".");

        if is_package && name == root.name {
            has_top_level_init = true;
        }

        let mtime = entry
            .metadata()
            .map_err(|e| ScanError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?
            .modified()
            .unwrap_or(SystemTime::UNIX_EPOCH);

        modules.push(ScannedModule {
            name,
            path: path.to_path_buf(),
            mtime,
            is_package,
        });
    }

    if !has_top_level_init && modules.is_empty() {
        return Err(ScanError::NamespacePackageEncountered(root.path.clone()));
    }

    Ok(modules)
}

/// Read a file's modification time without doing a full scan; used by the
/// cache to cheaply check for staleness.
pub fn file_mtime(path: &Path) -> Result<SystemTime, ScanError> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|source| ScanError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn scans_package_with_submodules() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "__init__.py", "");
        write(tmp.path(), "a.py", "");
        write(tmp.path(), "sub/__init__.py", "");
        write(tmp.path(), "sub/b.py", "");

        let root = PackageRoot {
            name: "pkg".into(),
            path: tmp.path().to_path_buf(),
        };
        let modules = scan_root(&root).unwrap();
        let names: std::collections::HashSet<_> = modules.iter().map(|m| m.name.clone()).collect();
        assert_eq!(
            names,
            ["pkg", "pkg.a", "pkg.sub", "pkg.sub.b"]
                .into_iter()
                .map(String::from)
                .collect()
        );
    }

    #[test]
    fn skips_files_with_extra_dots() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "__init__.py", "");
        write(tmp.path(), "weird.module.py", "");

        let root = PackageRoot {
            name: "pkg".into(),
            path: tmp.path().to_path_buf(),
        };
        let modules = scan_root(&root).unwrap();
        assert_eq!(modules.len(), 1);
    }

    #[test]
    fn namespace_portion_without_init_is_scanned_normally() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "a.py", "");

        let root = PackageRoot {
            name: "pkg".into(),
            path: tmp.path().to_path_buf(),
        };
        let modules = scan_root(&root).unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name, "pkg.a");
    }

    #[test]
    fn pure_namespace_root_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let root = PackageRoot {
            name: "pkg".into(),
            path: tmp.path().to_path_buf(),
        };
        assert!(matches!(
            scan_root(&root),
            Err(ScanError::NamespacePackageEncountered(_))
        ));
    }
}
