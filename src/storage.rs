//! Filesystem helpers shared by capture, publishing and manifests.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Copy `src` to `dst`, keeping permissions and the modification time.
pub fn copy_preserving(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .with_context(|| format!("copy {} -> {}", src.display(), dst.display()))?;
    let modified = fs::metadata(src)
        .and_then(|meta| meta.modified())
        .with_context(|| format!("read mtime of {}", src.display()))?;
    let file = OpenOptions::new()
        .write(true)
        .open(dst)
        .with_context(|| format!("open {}", dst.display()))?;
    file.set_modified(modified)
        .with_context(|| format!("set mtime of {}", dst.display()))?;
    Ok(())
}

/// Write through a sibling temp file and rename into place.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)
            .with_context(|| format!("create {}", tmp_path.display()))?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)
        .with_context(|| format!("rename {} -> {}", tmp_path.display(), path.display()))?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("remove {}", path.display())),
    }
}
