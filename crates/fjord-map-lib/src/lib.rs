//! Fjord Map Library - Core map and point-of-interest management
//!
//! This library holds everything the travel companion's map needs that is not
//! tied to a particular UI toolkit: parsing the pre-recorded GPX track,
//! persisting user-created points of interest, bounded geocoding search, and
//! the controller that keeps the rendered map overlays in sync with all of it.
//!
//! # Architecture
//!
//! - **[`Track`]**: Coordinates decoded once from the bundled GPX file
//! - **[`PoiStore`]**: User markers, written through a [`StorageBackend`] on every change
//! - **[`SearchClient`]** / **[`SearchState`]**: Geocoder requests and the stale-response guard
//! - **[`MapController`]**: Lifecycle, reconciliation and the add-marker state machine,
//!   drawing through any [`MapSurface`] implementation

mod controller;
mod geocode;
mod itinerary;
mod poi;
pub mod storage;
mod surface;
mod track;
pub mod utils;

// Public API exports
pub use controller::{Interaction, MapConfig, MapController, PoiDraft};
pub use geocode::{
    DEFAULT_GEOCODER_URL, DEFAULT_SEARCH_LIMIT, GeocodingConfig, RegionBounds, SearchClient,
    SearchResult, SearchState, SearchTicket,
};
pub use itinerary::{Activity, parse_itinerary};
pub use poi::{DEFAULT_POI_SLOT, PointOfInterest, PoiStore};
pub use storage::{StorageBackend, StorageError};
pub use surface::{
    BaseLayerKind, CursorStyle, LayerId, LineStyle, MapEvent, MapSurface, Marker, MarkerStyle,
    OverlayId, Polyline, Popup, PopupAction, SATELLITE_LAYER, STANDARD_LAYER, TileLayer,
};
pub use track::{Track, load_track, parse_track};
pub use utils::Coordinate;

/// Error types for the map core
///
/// None of these are fatal: each one disables a single feature (track line,
/// search results, saved markers) while the rest of the map keeps working.
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Malformed track: {0}")]
    MalformedTrack(String),

    #[error("Corrupted point-of-interest storage: {0}")]
    PersistenceCorruption(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Geocoding request failed: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid coordinate: {0}")]
    InvalidCoordinate(String),
}

pub type Result<T> = std::result::Result<T, MapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that all public types are accessible
        let _: fn() -> MapConfig = MapConfig::default;
        let _: fn() -> GeocodingConfig = GeocodingConfig::default;
        let _: fn(f64, f64) -> Coordinate = Coordinate::new;
    }

    #[test]
    fn test_error_messages() {
        let err = MapError::Validation("title must not be empty".to_string());
        assert_eq!(err.to_string(), "Invalid input: title must not be empty");

        let err: MapError = StorageError::Json("eof".to_string()).into();
        assert!(matches!(err, MapError::Storage(_)));
    }
}
