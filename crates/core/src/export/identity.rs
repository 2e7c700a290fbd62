use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{EventSoundError, Result};

/// One media item in the destination's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Destination-side handle.
    pub id: String,
    /// Display name, usually the file name.
    pub name: String,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CatalogEntry {
    fn file_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|name| name.to_str())
            .or(Some(self.name.as_str()))
    }
}

/// Which lookup tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchTier {
    Path,
    FileName,
    Stem,
    Substring,
}

/// Finds the catalog entry for `asset`.
///
/// Tries, in order: the same resolved path, the same file name, the same
/// file name without extension, and finally either file name containing the
/// other (ignoring case). The first tier with any match wins and within a
/// tier the earliest entry wins.
pub fn resolve_identity<'a>(
    asset: &Path,
    catalog: &'a [CatalogEntry],
) -> Result<(&'a CatalogEntry, MatchTier)> {
    let resolved = resolve_path(asset);
    if let Some(entry) = catalog.iter().find(|entry| {
        entry
            .path
            .as_deref()
            .map(|path| resolve_path(path) == resolved)
            .unwrap_or(false)
    }) {
        return Ok((entry, MatchTier::Path));
    }

    let unresolved = || EventSoundError::IdentityResolutionFailed(asset.display().to_string());
    let file_name = asset
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(unresolved)?;

    if let Some(entry) = catalog
        .iter()
        .find(|entry| entry.file_name() == Some(file_name))
    {
        return Ok((entry, MatchTier::FileName));
    }

    let stem = stem_of(file_name);
    if let Some(entry) = catalog
        .iter()
        .find(|entry| entry.file_name().map(stem_of) == Some(stem))
    {
        return Ok((entry, MatchTier::Stem));
    }

    let lowered = file_name.to_lowercase();
    if let Some(entry) = catalog.iter().find(|entry| {
        entry
            .file_name()
            .map(|other| {
                let other = other.to_lowercase();
                !other.is_empty() && (other.contains(&lowered) || lowered.contains(&other))
            })
            .unwrap_or(false)
    }) {
        return Ok((entry, MatchTier::Substring));
    }

    Err(unresolved())
}

fn resolve_path(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn stem_of(file_name: &str) -> &str {
    Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name)
}
