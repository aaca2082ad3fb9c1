//! # Catalog Loader
//!
//! Reads and writes the catalog directory. Every regular file in the directory
//! is one catalog, named after the file. Files are parsed in parallel and the
//! whole load fails if any single file is unreadable or carries a schema version
//! other than [`CATALOG_SPEC_VERSION`].
use crate::{
    constants::CATALOG_SPEC_VERSION,
    core::{
        catalog::{CatalogError, Pack},
        paths,
    },
    models::Catalog,
};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

#[derive(Deserialize)]
struct VersionProbe {
    version: u32,
}

/// Parses one catalog document, checking its schema version before anything else.
pub fn parse_catalog(data: &str, file: &str) -> Result<Catalog, CatalogError> {
    let parse_err = |source| CatalogError::Parse {
        file: file.to_string(),
        source,
    };
    let probe: VersionProbe = serde_json::from_str(data).map_err(parse_err)?;
    if probe.version != CATALOG_SPEC_VERSION {
        return Err(CatalogError::VersionMismatch {
            file: file.to_string(),
            expected: CATALOG_SPEC_VERSION,
            actual: probe.version,
        });
    }
    serde_json::from_str(data).map_err(parse_err)
}

fn catalog_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                log::warn!("Skipping unreadable catalog entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.into_path())
        .collect();
    files.sort();
    files
}

/// Loads every catalog in `dir` into a pack. A missing directory is created
/// and yields an empty pack.
pub fn load_pack(dir: &Path) -> Result<Pack, CatalogError> {
    paths::ensure_dir(dir)?;
    let files = catalog_files(dir);
    log::debug!("Loading {} catalog file(s) from '{}'", files.len(), dir.display());

    let loaded: Vec<(String, Catalog)> = files
        .par_iter()
        .map(|path| -> Result<(String, Catalog), CatalogError> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let data = fs::read_to_string(path)?;
            let catalog = parse_catalog(&data, &name)?;
            log::trace!("Loaded catalog '{}' ({} accounts)", name, catalog.accounts.len());
            Ok((name, catalog))
        })
        .collect::<Result<_, _>>()?;

    let mut pack = Pack::new();
    for (name, catalog) in loaded {
        pack.insert(name, catalog);
    }
    Ok(pack)
}

/// Writes every catalog of the pack into `dir`, one file per catalog,
/// readable only by the owner.
pub fn write_pack(pack: &Pack, dir: &Path) -> Result<(), CatalogError> {
    paths::ensure_dir(dir)?;
    for (name, catalog) in pack.catalogs() {
        let path = dir.join(name);
        let data = serde_json::to_string_pretty(catalog)?;
        write_private(&path, &data)?;
        log::debug!("Wrote catalog '{}'", path.display());
    }
    Ok(())
}

/// Replaces `path` with `contents` so that no other user can ever read them
/// and a crash never leaves a truncated file behind.
pub(crate) fn write_private(path: &Path, contents: &str) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    // 1. Stage a sibling temp file, owner-only before any byte lands in it.
    let mut staged = NamedTempFile::new_in(dir)?;
    restrict_permissions(staged.as_file())?;

    // 2. Write and flush the contents.
    staged.write_all(contents.as_bytes())?;
    staged.as_file().sync_all()?;

    // 3. Swap it into place.
    staged.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &fs::File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &fs::File) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{account, role};

    const SAMPLE: &str = r#"{
        "version": 1,
        "accounts": [
            {
                "account": "111111111111",
                "region": "eu-west-1",
                "tags": {"env": "prod"},
                "roles": [
                    {"name": "admin", "mfa": true, "sources": [{"path": "work"}]}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = parse_catalog(SAMPLE, "main").unwrap();
        let acc = catalog.accounts.first().unwrap();
        assert_eq!(acc.id, "111111111111");
        assert_eq!(acc.region(), Some("eu-west-1"));
        assert!(acc.lookup_role("admin").unwrap().mfa);
    }

    #[test]
    fn test_version_mismatch_is_distinct() {
        let result = parse_catalog(r#"{"version": 7, "accounts": []}"#, "old");
        assert!(matches!(
            result,
            Err(CatalogError::VersionMismatch { expected: 1, actual: 7, .. })
        ));
    }

    #[test]
    fn test_load_missing_dir_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("catalogs");
        let pack = load_pack(&target).unwrap();
        assert!(pack.is_empty());
        assert!(target.is_dir());
    }

    #[test]
    fn test_load_fails_whole_pack_on_bad_version() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("good"), SAMPLE).unwrap();
        fs::write(dir.path().join("bad"), r#"{"version": 0, "accounts": []}"#).unwrap();
        assert!(matches!(
            load_pack(dir.path()),
            Err(CatalogError::VersionMismatch { .. })
        ));
    }

    #[test]
    fn test_write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut pack = Pack::new();
        pack.insert(
            "team",
            Catalog::new(vec![account(
                "222222222222",
                &[("env", "dev")],
                vec![role("read", false, &["222222222222/admin"])],
            )]),
        );
        write_pack(&pack, dir.path()).unwrap();

        let loaded = load_pack(dir.path()).unwrap();
        assert_eq!(loaded, pack);
    }

    #[cfg(unix)]
    #[test]
    fn test_write_private_replaces_readable_file() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets");
        fs::write(&path, "old").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        write_private(&path, "new").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let leftovers: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn test_hidden_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".swp"), "garbage").unwrap();
        fs::write(dir.path().join("main"), SAMPLE).unwrap();
        let pack = load_pack(dir.path()).unwrap();
        assert_eq!(pack.catalogs().count(), 1);
    }
}
