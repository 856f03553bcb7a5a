//! Source reader: finds unprocessed catalog files, parses them and marks them
//! consumed.
//!
//! Progress across restarts is recorded only in file names: a consumed file
//! is renamed in place to `<stem><marker>.<ext>` (for example
//! `trade_done.xml`), and discovery skips every file whose stem ends with the
//! marker.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::error::{CatalogError, Result};
use crate::models::RawImportDocument;

/// Walk `config.root` and return every input file that has not been consumed.
///
/// Each call re-walks the tree. Results are sorted by path so a pass is
/// reproducible. Entries below the root that cannot be read are skipped with a
/// warning; only an unreadable root fails the walk.
pub fn discover_unprocessed(config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let root = &config.root;
    if !root.exists() {
        return Err(CatalogError::Config(format!(
            "ingest root does not exist: {}",
            root.display()
        )));
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => return Err(CatalogError::Io(e.into())),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }
        if is_consumed(path, &config.done_marker) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// Whether `path` carries the consumed marker at the end of its stem.
pub fn is_consumed(path: &Path, marker: &str) -> bool {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().ends_with(marker))
        .unwrap_or(false)
}

/// Read and decode one catalog file.
pub fn parse(path: &Path) -> Result<RawImportDocument> {
    let content =
        std::fs::read_to_string(path).map_err(|e| CatalogError::parse(path, e.to_string()))?;
    parse_str(path, &content)
}

/// Decode catalog XML. `path` is only used for error context.
pub fn parse_str(path: &Path, content: &str) -> Result<RawImportDocument> {
    quick_xml::de::from_str(content).map_err(|e| CatalogError::parse(path, e.to_string()))
}

/// Rename `path` so later discovery passes skip it. Returns the new path.
///
/// Fails without touching either file when the consumed name is already taken.
pub fn mark_consumed(path: &Path, marker: &str) -> Result<PathBuf> {
    let target = consumed_path(path, marker);
    if target.exists() {
        return Err(CatalogError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{} already exists", target.display()),
        )));
    }
    std::fs::rename(path, &target)?;
    Ok(target)
}

/// The name `path` gets once consumed: the marker goes between stem and
/// extension.
pub fn consumed_path(path: &Path, marker: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}{}.{}", stem, marker, ext.to_string_lossy()),
        None => format!("{}{}", stem, marker),
    };
    path.with_file_name(name)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .map_err(|e| CatalogError::Config(format!("invalid glob '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| CatalogError::Config(format!("invalid glob set: {}", e)))
}
