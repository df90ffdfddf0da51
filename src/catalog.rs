//! Camera catalog.
//!
//! The catalog file is a JSON array of regions, each carrying a `cams`
//! array of `{ "id", "stream" }` objects. Region fields other than `cams`
//! are ignored. Selection flattens regions in file order and applies the
//! capture limit before any per-entry validation, so an invalid entry still
//! consumes a limit slot.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

/// A camera that passed validation and can be captured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Camera {
    /// Unique id, used verbatim as the camera's directory name.
    pub id: String,
    pub stream_url: String,
}

/// Raw catalog entry; either field may be absent.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
pub struct CameraEntry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub stream: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Region {
    #[serde(default)]
    pub cams: Vec<CameraEntry>,
}

#[derive(Clone, Debug, Default)]
pub struct Catalog {
    regions: Vec<Region>,
}

impl Catalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("failed to read catalog {}: {}", path.display(), e))?;
        Self::from_json(&raw).map_err(|e| anyhow!("invalid catalog {}: {}", path.display(), e))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let regions: Vec<Region> = serde_json::from_str(raw)?;
        Ok(Self { regions })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    /// Every entry across all regions, in file order.
    pub fn entries(&self) -> impl Iterator<Item = &CameraEntry> + '_ {
        self.regions.iter().flat_map(|region| region.cams.iter())
    }

    /// Flattened entries truncated to `limit` (unlimited when `None`).
    pub fn select(&self, limit: Option<usize>) -> impl Iterator<Item = &CameraEntry> + '_ {
        self.entries().take(limit.unwrap_or(usize::MAX))
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CameraEntry {
    /// The validated camera, or `None` when the entry must be skipped.
    ///
    /// Empty ids or streams count as missing. Ids that would escape the
    /// camera's directory are rejected with a warning.
    pub fn camera(&self) -> Option<Camera> {
        let id = self.id.as_deref().filter(|id| !id.is_empty())?;
        let stream_url = self.stream.as_deref().filter(|url| !url.is_empty())?;
        if !is_safe_dir_name(id) {
            log::warn!("skipping camera with unusable id {:?}", id);
            return None;
        }
        Some(Camera {
            id: id.to_string(),
            stream_url: stream_url.to_string(),
        })
    }
}

fn is_safe_dir_name(id: &str) -> bool {
    id != "." && id != ".." && !id.contains('/') && !id.contains('\\') && !id.contains('\0')
}
