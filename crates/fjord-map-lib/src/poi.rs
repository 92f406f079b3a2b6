//! User-created points of interest
//!
//! The whole collection lives in memory and is rewritten to a single storage
//! slot after every mutation. Records are never edited once saved, only
//! deleted.

use crate::storage::{self, StorageBackend, StorageError};
use crate::{Coordinate, MapError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Slot name the collection is stored under
pub const DEFAULT_POI_SLOT: &str = "flam_custom_pois";

const ID_PREFIX: &str = "poi_";

/// A marker the user dropped on the map
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    /// `poi_<creation millis>`, unique within the store
    pub id: String,
    #[serde(flatten)]
    pub coordinate: Coordinate,
    pub title: String,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
    /// Millisecond precision, stored as epoch millis under `timestamp`
    #[serde(rename = "timestamp", with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// The point-of-interest collection and its persistence slot
pub struct PoiStore {
    backend: Box<dyn StorageBackend>,
    slot: String,
    pois: Vec<PointOfInterest>,
    /// Millis component of the newest id handed out or loaded
    last_id_millis: i64,
    /// Bumped on every effective mutation
    revision: u64,
}

impl PoiStore {
    /// Load the collection from `slot`
    ///
    /// A missing slot gives an empty store. An unreadable or corrupt slot
    /// also gives an empty store; the error is logged and the bad value is
    /// replaced on the next mutation.
    pub fn load(backend: Box<dyn StorageBackend>, slot: impl Into<String>) -> Self {
        let slot = slot.into();

        let pois = match storage::load_json::<Vec<PointOfInterest>>(backend.as_ref(), &slot) {
            Ok(Some(pois)) => {
                tracing::info!("Loaded {} points of interest from '{}'", pois.len(), slot);
                pois
            }
            Ok(None) => {
                tracing::info!("No saved points of interest in '{}'", slot);
                Vec::new()
            }
            Err(e) => {
                let e = match e {
                    StorageError::Json(msg) => MapError::PersistenceCorruption(msg),
                    other => MapError::Storage(other),
                };
                tracing::warn!("Starting with no points of interest: {e}");
                Vec::new()
            }
        };

        let last_id_millis = pois
            .iter()
            .filter_map(|poi| parse_id_millis(&poi.id))
            .max()
            .unwrap_or(0);

        Self {
            backend,
            slot,
            pois,
            last_id_millis,
            revision: 0,
        }
    }

    /// A store that keeps nothing across restarts
    pub fn in_memory() -> Self {
        Self::load(
            Box::new(storage::MemoryStorage::new()),
            DEFAULT_POI_SLOT,
        )
    }

    /// Records in creation order
    #[inline]
    pub fn list(&self) -> &[PointOfInterest] {
        &self.pois
    }

    pub fn get(&self, id: &str) -> Option<&PointOfInterest> {
        self.pois.iter().find(|poi| poi.id == id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pois.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pois.is_empty()
    }

    /// Changes whenever the collection changes; observers compare it against
    /// the value they last rendered
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Validate, store and persist a new point of interest
    pub fn create(
        &mut self,
        coordinate: Coordinate,
        title: &str,
        description: Option<&str>,
    ) -> Result<PointOfInterest> {
        let title = title.trim();
        if title.is_empty() {
            return Err(MapError::Validation("title must not be empty".to_string()));
        }
        if !coordinate.is_valid() {
            return Err(MapError::Validation(format!(
                "coordinate out of range: ({}, {})",
                coordinate.latitude, coordinate.longitude
            )));
        }

        let now = Utc::now();
        let now_millis = now.timestamp_millis();
        let id_millis = self.next_id_millis(now_millis).ok_or_else(|| {
            MapError::Validation("no free point-of-interest id left".to_string())
        })?;
        self.last_id_millis = self.last_id_millis.max(id_millis);

        let poi = PointOfInterest {
            id: format!("{ID_PREFIX}{id_millis}"),
            coordinate,
            title: title.to_string(),
            description: description
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            created_at: DateTime::from_timestamp_millis(now_millis).unwrap_or(now),
        };

        self.pois.push(poi.clone());
        self.revision += 1;
        self.persist();

        tracing::info!("Created point of interest {} '{}'", poi.id, poi.title);
        Ok(poi)
    }

    /// Remove the record with `id`; returns whether anything was removed
    ///
    /// Deleting an unknown id is a no-op.
    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.pois.len();
        self.pois.retain(|poi| poi.id != id);
        if self.pois.len() == before {
            tracing::debug!("Point of interest {id} already absent");
            return false;
        }

        self.revision += 1;
        self.persist();
        tracing::info!("Deleted point of interest {id}");
        true
    }

    /// Millis for the next id: after every id seen so far, or the first free
    /// value from `now_millis` when that runs past `i64::MAX`
    fn next_id_millis(&self, now_millis: i64) -> Option<i64> {
        let start = now_millis.max(self.last_id_millis.saturating_add(1));
        (start..=i64::MAX)
            .chain(now_millis..start)
            .take(self.pois.len() + 1)
            .find(|millis| self.get(&format!("{ID_PREFIX}{millis}")).is_none())
    }

    /// Write the full collection; failures keep the in-memory state
    fn persist(&self) {
        if let Err(e) = storage::save_json(self.backend.as_ref(), &self.slot, &self.pois) {
            tracing::error!(
                "Failed to persist {} points of interest to '{}': {e}",
                self.pois.len(),
                self.slot
            );
        }
    }
}

fn parse_id_millis(id: &str) -> Option<i64> {
    id.strip_prefix(ID_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, StorageResult};
    use std::sync::Arc;

    /// Lets several stores share one backend to simulate a restart
    #[derive(Clone, Default)]
    struct SharedStorage(Arc<MemoryStorage>);

    impl StorageBackend for SharedStorage {
        fn set_string(&self, key: &str, value: &str) -> StorageResult<()> {
            self.0.set_string(key, value)
        }

        fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
            self.0.get_string(key)
        }
    }

    struct ReadOnlyStorage;

    impl StorageBackend for ReadOnlyStorage {
        fn set_string(&self, _key: &str, _value: &str) -> StorageResult<()> {
            Err(StorageError::Io("read-only".to_string()))
        }

        fn get_string(&self, _key: &str) -> StorageResult<Option<String>> {
            Ok(None)
        }
    }

    fn mirador() -> Coordinate {
        Coordinate::new(60.864, 7.119)
    }

    #[test]
    fn test_create_then_delete_scenario() {
        let mut store = PoiStore::in_memory();
        let poi = store.create(mirador(), "Mirador", None).unwrap();

        assert_eq!(store.list().len(), 1);
        let listed = &store.list()[0];
        assert_eq!(listed.coordinate, mirador());
        assert_eq!(listed.title, "Mirador");
        assert!(!listed.id.is_empty());
        assert_eq!(listed, &poi);

        assert!(store.delete(&poi.id));
        assert!(store.list().is_empty());
    }

    #[test]
    fn test_empty_title_is_rejected() {
        let mut store = PoiStore::in_memory();
        assert!(matches!(
            store.create(mirador(), "", None),
            Err(MapError::Validation(_))
        ));
        assert!(matches!(
            store.create(mirador(), "   ", Some("note")),
            Err(MapError::Validation(_))
        ));
        assert!(store.is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_out_of_range_coordinate_is_rejected() {
        let mut store = PoiStore::in_memory();
        let result = store.create(Coordinate::new(120.0, 7.0), "Nowhere", None);
        assert!(matches!(result, Err(MapError::Validation(_))));
    }

    #[test]
    fn test_ids_are_unique_when_created_in_same_millisecond() {
        let mut store = PoiStore::in_memory();
        let ids: Vec<String> = (0..50)
            .map(|i| store.create(mirador(), &format!("P{i}"), None).unwrap().id)
            .collect();

        let mut deduped = ids.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), ids.len());
        // Creation order is preserved
        let titles: Vec<&str> = store.list().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles.first(), Some(&"P0"));
        assert_eq!(titles.last(), Some(&"P49"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let mut store = PoiStore::in_memory();
        let keep = store.create(mirador(), "Keep", None).unwrap();
        let gone = store.create(mirador(), "Gone", None).unwrap();

        assert!(store.delete(&gone.id));
        let revision = store.revision();
        let after_once: Vec<PointOfInterest> = store.list().to_vec();

        assert!(!store.delete(&gone.id));
        assert!(!store.delete("poi_does_not_exist"));
        assert_eq!(store.list(), after_once.as_slice());
        assert_eq!(store.revision(), revision);
        assert!(store.get(&keep.id).is_some());
        assert!(store.get(&gone.id).is_none());
    }

    #[test]
    fn test_reload_reproduces_collection() {
        let shared = SharedStorage::default();

        let mut store = PoiStore::load(Box::new(shared.clone()), DEFAULT_POI_SLOT);
        store.create(mirador(), "Mirador", Some("  Best view  ")).unwrap();
        store.create(Coordinate::new(60.8630, 7.1130), "Station", None).unwrap();
        store
            .create(Coordinate::new(60.9035, 7.1930), "Stegastein", Some(""))
            .unwrap();

        let reloaded = PoiStore::load(Box::new(shared), DEFAULT_POI_SLOT);
        assert_eq!(reloaded.list(), store.list());
        assert_eq!(reloaded.list()[0].description.as_deref(), Some("Best view"));
        assert_eq!(reloaded.list()[2].description, None);
    }

    #[test]
    fn test_corrupt_slot_loads_empty_and_recovers() {
        let shared = SharedStorage::default();
        shared.set_string(DEFAULT_POI_SLOT, "{ this is not json").unwrap();

        let mut store = PoiStore::load(Box::new(shared.clone()), DEFAULT_POI_SLOT);
        assert!(store.is_empty());

        store.create(mirador(), "Mirador", None).unwrap();
        let reloaded = PoiStore::load(Box::new(shared), DEFAULT_POI_SLOT);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn test_reads_legacy_records() {
        let shared = SharedStorage::default();
        shared
            .set_string(
                DEFAULT_POI_SLOT,
                r#"[{"id":"poi_99999999999999","lat":60.86,"lng":7.11,"title":"Bakery","description":"","timestamp":1718000000000}]"#,
            )
            .unwrap();

        let mut store = PoiStore::load(Box::new(shared), DEFAULT_POI_SLOT);
        let legacy = &store.list()[0];
        assert_eq!(legacy.title, "Bakery");
        assert_eq!(legacy.description, None);
        assert_eq!(legacy.created_at.timestamp_millis(), 1718000000000);

        // New ids never collide with loaded ones, even ones from the future
        let fresh = store.create(mirador(), "Mirador", None).unwrap();
        assert_eq!(fresh.id, "poi_100000000000000");
    }

    #[test]
    fn test_largest_stored_id_still_allows_creation() {
        let shared = SharedStorage::default();
        shared
            .set_string(
                DEFAULT_POI_SLOT,
                r#"[{"id":"poi_9223372036854775807","lat":60.86,"lng":7.11,"title":"Far future","timestamp":1718000000000}]"#,
            )
            .unwrap();

        let mut store = PoiStore::load(Box::new(shared.clone()), DEFAULT_POI_SLOT);
        let first = store.create(mirador(), "Mirador", None).unwrap();
        let second = store.create(mirador(), "Bakery", None).unwrap();

        assert_ne!(first.id, "poi_9223372036854775807");
        assert_ne!(first.id, second.id);
        assert_ne!(second.id, "poi_9223372036854775807");
        assert_eq!(store.len(), 3);

        let reloaded = PoiStore::load(Box::new(shared), DEFAULT_POI_SLOT);
        assert_eq!(reloaded.list(), store.list());
    }

    #[test]
    fn test_write_failure_keeps_memory_state() {
        let mut store = PoiStore::load(Box::new(ReadOnlyStorage), DEFAULT_POI_SLOT);
        let poi = store.create(mirador(), "Mirador", None).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.delete(&poi.id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_revision_tracks_mutations() {
        let mut store = PoiStore::in_memory();
        assert_eq!(store.revision(), 0);
        let poi = store.create(mirador(), "A", None).unwrap();
        assert_eq!(store.revision(), 1);
        store.delete(&poi.id);
        assert_eq!(store.revision(), 2);
    }
}
