//! Import of scraped listing JSON into a record store.
//!
//! The scraper emits either a single listing object or an array of them.
//! Entries that fail to parse are logged and skipped; the rest are inserted.

use crate::storage::{MemoryRecordStore, StoreError, StoreResult};
use crate::types::{Record, RecordId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// One listing as produced by the scraper.
#[derive(Debug, Deserialize)]
struct ScrapedListing {
    title: Option<String>,
    description: Option<String>,
    location: Option<String>,
    property_type: Option<String>,
    condition: Option<String>,
    #[serde(default)]
    amenities: Option<Vec<String>>,
    price_cop: Option<u64>,
    area_m2: Option<f64>,
    rooms: Option<u32>,
    bathrooms: Option<u32>,
    parking_spaces: Option<u32>,
    estrato: Option<u8>,
    pets_allowed: Option<bool>,
    furnished: Option<bool>,
    listing_url: Option<String>,
}

impl ScrapedListing {
    fn into_record(self) -> Record {
        let non_empty = |s: Option<String>| s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let mut record = Record::new(RecordId(1));
        record.title = non_empty(self.title);
        record.description = non_empty(self.description);
        record.location = non_empty(self.location);
        record.property_type = non_empty(self.property_type);
        record.condition = non_empty(self.condition);
        record.amenities = self
            .amenities
            .unwrap_or_default()
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        record.price = self.price_cop;
        record.area_m2 = self.area_m2.filter(|a| a.is_finite() && *a >= 0.0);
        record.rooms = self.rooms;
        record.bathrooms = self.bathrooms;
        record.parking_spaces = self.parking_spaces;
        record.stratum = self.estrato;
        record.pets_allowed = self.pets_allowed;
        record.furnished = self.furnished;
        record.listing_url = non_empty(self.listing_url);
        record
    }
}

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub ids: Vec<RecordId>,
}

/// Imports the listings in `path` into `store`.
///
/// # Errors
/// Fails only when the file cannot be read or is not JSON at all; malformed
/// entries are counted in `skipped`.
pub fn import_listings(path: &Path, store: &MemoryRecordStore) -> StoreResult<ImportReport> {
    let json = std::fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let data: Value = serde_json::from_str(&json).map_err(|source| StoreError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let entries = match data {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut report = ImportReport::default();
    for (position, entry) in entries.into_iter().enumerate() {
        let label = entry
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("(untitled)")
            .to_string();

        match serde_json::from_value::<ScrapedListing>(entry) {
            Ok(listing) => {
                let id = store.insert(listing.into_record())?;
                debug!(%id, title = %label, "Imported listing");
                report.ids.push(id);
                report.imported += 1;
            }
            Err(e) => {
                warn!(position, title = %label, error = %e, "Skipping malformed listing");
                report.skipped += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, json: &str) -> std::path::PathBuf {
        let path = dir.path().join("listings.json");
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn test_import_array_skips_malformed_entries() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"[
                {"title": "Casa con piscina", "price_cop": 850000000, "rooms": 4,
                 "estrato": 5, "amenities": ["Piscina", " "], "pets_allowed": true},
                {"title": "Roto", "rooms": "tres"},
                {"title": "Apartamento", "area_m2": 62.5, "location": "Laureles"}
            ]"#,
        );
        let store = MemoryRecordStore::new();

        let report = import_listings(&path, &store).unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.len(), 2);

        let casa = store.get(report.ids[0]).unwrap();
        assert_eq!(casa.price, Some(850_000_000));
        assert_eq!(casa.stratum, Some(5));
        assert_eq!(casa.amenities, vec!["Piscina".to_string()]);
        assert_eq!(casa.pets_allowed, Some(true));
    }

    #[test]
    fn test_import_single_object() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"title": "Lote", "area_m2": 1200}"#);
        let store = MemoryRecordStore::new();

        let report = import_listings(&path, &store).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(store.to_vec()[0].area_m2, Some(1200.0));
    }

    #[test]
    fn test_import_rejects_non_json() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "title: Casa");
        let store = MemoryRecordStore::new();

        assert!(matches!(
            import_listings(&path, &store),
            Err(StoreError::Parse { .. })
        ));
    }
}
