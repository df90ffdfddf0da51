//! Per-camera frame manifests and wholesale publishing.
//!
//! A manifest is `frames.json` inside a camera directory: a JSON array of
//! the frame file names present there, sorted. Frame names are timestamps,
//! so lexical order is chronological. Manifests are regenerated from the
//! directory listing every time, never patched.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::storage::{copy_preserving, write_atomic};
use crate::MANIFEST_FILE;

/// Which camera directories under the index root get a manifest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManifestScope {
    /// Only these camera ids.
    Touched(Vec<String>),
    /// Every directory directly under the root.
    All,
}

/// Sorted names of the frame files directly inside `dir`.
pub fn list_frames(dir: &Path) -> Result<Vec<String>> {
    let mut frames = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || !crate::is_frame_file(&path) {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
            frames.push(name.to_string());
        }
    }
    frames.sort();
    Ok(frames)
}

/// Rewrite `dir/frames.json` from the current listing; returns the listing.
pub fn write_manifest(dir: &Path) -> Result<Vec<String>> {
    let frames = list_frames(dir)?;
    let json = serde_json::to_vec(&frames)?;
    write_atomic(&dir.join(MANIFEST_FILE), &json)?;
    Ok(frames)
}

/// Rebuild manifests under `root`; returns the ids that were indexed.
///
/// Camera directories that do not exist are skipped. A failure on one
/// camera is logged and does not stop the others.
pub fn rebuild(root: &Path, scope: &ManifestScope) -> Result<Vec<String>> {
    let ids = match scope {
        ManifestScope::Touched(ids) => ids.clone(),
        ManifestScope::All => camera_dirs(root)?,
    };

    let mut indexed = Vec::new();
    for id in ids {
        let cam_dir = root.join(&id);
        if !cam_dir.is_dir() {
            continue;
        }
        match write_manifest(&cam_dir) {
            Ok(frames) => {
                log::debug!("indexed {} frame(s) for {}", frames.len(), id);
                indexed.push(id);
            }
            Err(e) => log::error!("failed to write manifest for {}: {:#}", id, e),
        }
    }
    Ok(indexed)
}

fn camera_dirs(root: &Path) -> Result<Vec<String>> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut ids = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read dir {}", root.display()))? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            ids.push(name.to_string());
        }
    }
    ids.sort();
    Ok(ids)
}

/// Replace `dst` with a copy of `src`: delete, recreate, copy every file.
///
/// Returns the number of files copied.
pub fn mirror_tree(src: &Path, dst: &Path) -> Result<usize> {
    if dst.exists() {
        fs::remove_dir_all(dst).with_context(|| format!("remove {}", dst.display()))?;
    }
    fs::create_dir_all(dst).with_context(|| format!("create {}", dst.display()))?;

    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry?;
        let rel = entry.path().strip_prefix(src)?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            copy_preserving(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
