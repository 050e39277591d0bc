//! The media catalog: maps the ids used in `/stream/{id}` to files on disk.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const NO_SYNOPSIS: &str = "No synopsis available.";
pub const NO_POSTER: &str = "https://via.placeholder.com/500x750?text=No+Poster";

/// One video in the library, as stored in the catalog JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Zero means "not yet assigned"; [`Library::new`] fills it in.
    #[serde(default)]
    pub id: u64,
    pub title: String,
    pub year: Option<String>,
    pub filename: String,
    pub path: PathBuf,
    pub size_mb: f64,
    pub extension: String,
    #[serde(default = "no_synopsis")]
    pub description: String,
    #[serde(default = "no_poster")]
    pub poster_url: String,
    #[serde(default)]
    pub backdrop_url: String,
    /// Average vote out of 10, when metadata lookup found one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

fn no_synopsis() -> String {
    NO_SYNOPSIS.to_string()
}

fn no_poster() -> String {
    NO_POSTER.to_string()
}

/// Lookup from a logical media id to the file that backs it.
pub trait Catalog: Send + Sync {
    /// `None` when no entry carries this id.
    fn resolve(&self, id: &str) -> Option<PathBuf>;

    fn entries(&self) -> &[MediaEntry];
}

/// An in-memory catalog, persisted as a JSON array.
#[derive(Debug, Clone, Default)]
pub struct Library {
    entries: Vec<MediaEntry>,
    by_id: HashMap<u64, usize>,
}

impl Library {
    /// Entries without an id get the next free ones, in order. Entries that
    /// cannot get one because the id space above the maximum is used up are
    /// dropped.
    pub fn new(mut entries: Vec<MediaEntry>) -> Self {
        let mut next = entries.iter().map(|e| e.id).max().unwrap_or(0);
        entries.retain_mut(|entry| {
            if entry.id != 0 {
                return true;
            }
            match next.checked_add(1) {
                Some(id) => {
                    next = id;
                    entry.id = id;
                    true
                }
                None => {
                    tracing::warn!(title = %entry.title, "no free catalog id left, skipping entry");
                    false
                }
            }
        });

        let mut by_id = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if by_id.insert(entry.id, index).is_some() {
                tracing::warn!(id = entry.id, "duplicate catalog id, later entry wins");
            }
        }

        Library { entries, by_id }
    }

    /// Loads a catalog file. A missing file is an empty library.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("no catalog at {}, starting empty", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let entries: Vec<MediaEntry> = serde_json::from_slice(&data)
            .map_err(|source| Error::CatalogParse { path: path.to_path_buf(), source })?;
        let library = Self::new(entries);
        tracing::info!(entries = library.entries.len(), "loaded catalog {}", path.display());
        Ok(library)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.entries)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Catalog for Library {
    fn resolve(&self, id: &str) -> Option<PathBuf> {
        let id: u64 = id.parse().ok()?;
        self.by_id.get(&id).map(|&index| self.entries[index].path.clone())
    }

    fn entries(&self) -> &[MediaEntry] {
        &self.entries
    }
}
