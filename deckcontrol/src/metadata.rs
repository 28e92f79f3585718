//! Metadata registry lookup and media entry construction.
//!
//! Entries are built from a file path; when the filename carries a trailing
//! catalog id, the registry is queried for start/end offsets, a volume
//! override and a canonical title. A failed lookup never blocks the entry:
//! it stays usable with default segment bounds and `metadata_loaded` false.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::errors::DeckError;
use crate::filename;
use crate::model::{MediaEntry, MediaMetadata};

/// Per-item lookup of start/end offsets, volume override and tags.
pub trait MetadataProvider: Send + Sync {
    fn lookup(&self, key: &str) -> Result<Option<MediaMetadata>, DeckError>;
}

/// Metadata provider backed by a YAML catalog file mapping catalog ids to
/// [`MediaMetadata`] records.
///
/// The file is re-read on every lookup so catalog edits are picked up
/// without a restart. A missing file is an empty catalog, not an error.
pub struct YamlCatalogProvider {
    path: PathBuf,
}

impl YamlCatalogProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &deckconfig::Config) -> Self {
        Self::new(config.get_catalog_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetadataProvider for YamlCatalogProvider {
    fn lookup(&self, key: &str) -> Result<Option<MediaMetadata>, DeckError> {
        if !self.path.exists() {
            debug!(catalog = %self.path.display(), "Catalog file not present, treating as empty");
            return Ok(None);
        }

        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            DeckError::catalog(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let catalog: HashMap<String, MediaMetadata> =
            serde_yaml::from_str(&raw).map_err(|e| {
                DeckError::catalog(format!("cannot parse {}: {}", self.path.display(), e))
            })?;

        Ok(catalog.get(key).cloned())
    }
}

/// Builds a [`MediaEntry`] for a file, applying catalog metadata when the
/// filename carries a catalog id.
pub fn build_entry(path: &str, provider: &dyn MetadataProvider) -> MediaEntry {
    let mut entry = MediaEntry::new(path, filename::display_title(path));
    entry.added_at = Some(Local::now());

    let Some(id) = filename::catalog_id(path) else {
        debug!(file = %path, "No catalog id in filename");
        return entry;
    };

    match provider.lookup(&id) {
        Ok(Some(meta)) => {
            entry.start_secs = meta.start_secs.unwrap_or(0);
            entry.end_secs = meta.end_secs.unwrap_or(0);
            if let Some(title) = meta.title.as_deref() {
                entry.title = format_title_with_year(title, meta.year);
            }
            entry.metadata = Some(meta);
            entry.metadata_loaded = true;
            debug!(file = %path, catalog_id = %id, "Applied catalog metadata");
        }
        Ok(None) => {
            debug!(file = %path, catalog_id = %id, "Catalog has no record for id");
        }
        Err(err) => {
            warn!(file = %path, catalog_id = %id, error = %err, "Catalog lookup failed");
            entry.metadata_error = Some(err.to_string());
        }
    }

    entry
}

/// Formats a title as "Title (Year)", or just the title when the year is
/// missing.
fn format_title_with_year(title: &str, year: Option<u32>) -> String {
    let title = title.trim();
    let title = if title.is_empty() { "Untitled" } else { title };
    match year {
        Some(year) if year > 0 => format!("{} ({})", title, year),
        _ => title.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubProvider(Result<Option<MediaMetadata>, ()>);

    impl MetadataProvider for StubProvider {
        fn lookup(&self, _key: &str) -> Result<Option<MediaMetadata>, DeckError> {
            match &self.0 {
                Ok(meta) => Ok(meta.clone()),
                Err(_) => Err(DeckError::catalog("registry unreachable")),
            }
        }
    }

    #[test]
    fn entry_with_metadata_applied() {
        let provider = StubProvider(Ok(Some(MediaMetadata {
            title: Some("The Feature".to_string()),
            year: Some(2019),
            start_secs: Some(12),
            end_secs: Some(5400),
            volume: Some(80),
            tags: vec!["main".to_string()],
        })));

        let entry = build_entry("/deck/The.Feature.(2019) [ULT-3].mkv", &provider);
        assert!(entry.metadata_loaded);
        assert_eq!(entry.title, "The Feature (2019)");
        assert_eq!(entry.start_secs, 12);
        assert_eq!(entry.end_secs, 5400);
        assert_eq!(entry.metadata.as_ref().unwrap().volume, Some(80));
        assert!(entry.metadata_error.is_none());
    }

    #[test]
    fn entry_without_catalog_id_skips_lookup() {
        let provider = StubProvider(Err(()));
        let entry = build_entry("/deck/Plain.Movie.(2001).mkv", &provider);

        // The failing provider was never consulted
        assert!(!entry.metadata_loaded);
        assert!(entry.metadata_error.is_none());
        assert_eq!(entry.title, "Plain Movie (2001)");
        assert_eq!(entry.end_secs, 0);
    }

    #[test]
    fn lookup_failure_leaves_entry_usable() {
        let provider = StubProvider(Err(()));
        let entry = build_entry("/deck/Movie (2001) [ULT-9].mkv", &provider);

        assert!(!entry.metadata_loaded);
        assert!(entry.metadata_error.is_some());
        assert_eq!(entry.start_secs, 0);
        assert_eq!(entry.end_secs, 0);
    }

    #[test]
    fn missing_record_is_not_an_error() {
        let provider = StubProvider(Ok(None));
        let entry = build_entry("/deck/Movie (2001) [ULT-9].mkv", &provider);

        assert!(!entry.metadata_loaded);
        assert!(entry.metadata_error.is_none());
    }

    #[test]
    fn yaml_catalog_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog_path = dir.path().join("catalog.yaml");
        std::fs::write(
            &catalog_path,
            "ULT-20:\n  title: Night Show\n  year: 2017\n  start_secs: 30\n  end_secs: 600\n  volume: 120\n  tags: [late]\n",
        )
        .unwrap();

        let provider = YamlCatalogProvider::new(&catalog_path);
        let meta = provider.lookup("ULT-20").unwrap().unwrap();
        assert_eq!(meta.title.as_deref(), Some("Night Show"));
        assert_eq!(meta.volume, Some(120));
        assert_eq!(provider.lookup("ULT-99").unwrap(), None);
    }

    #[test]
    fn missing_catalog_file_is_empty() {
        let provider = YamlCatalogProvider::new("/nonexistent/catalog.yaml");
        assert!(provider.lookup("ULT-1").unwrap().is_none());
    }

    #[test]
    fn title_year_formatting() {
        assert_eq!(format_title_with_year("Movie", Some(1999)), "Movie (1999)");
        assert_eq!(format_title_with_year(" Movie ", None), "Movie");
        assert_eq!(format_title_with_year("", Some(2000)), "Untitled (2000)");
    }
}
