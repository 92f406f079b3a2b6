//! Application module
//!
//! This module provides the main application structure:
//! - Full-screen map view drawn by [`surface::WalkersSurface`]
//! - Floating search box and map controls
//! - Toggleable itinerary sidebar (from the bottom on portrait displays)
//! - New-marker form while a spot awaits confirmation

mod plugin;
pub(crate) mod settings;
mod search;
mod surface;
mod ui_panels;

use crate::app::search::SearchWorker;
use crate::app::settings::Settings;
use crate::app::surface::WalkersSurface;
use eframe::egui;
use fjord_map_lib::storage::{FileStorage, MemoryStorage};
use fjord_map_lib::{
    Activity, BaseLayerKind, DEFAULT_POI_SLOT, GeocodingConfig, MapConfig, MapController,
    PoiStore, SearchClient, StorageBackend, Track, load_track, parse_itinerary,
};
use std::path::Path;

const BUNDLED_TRACK: &str = include_str!("../../assets/flamsbana.gpx");
const BUNDLED_ITINERARY: &str = include_str!("../../assets/itinerary.json");

/// Persisted UI settings (the points of interest live in their own storage)
#[derive(Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct PersistedSettings {
    base_layer: BaseLayerKind,
    sidebar_open: bool,
}

/// Main application structure
pub struct FjordMapApp {
    /// Map state, overlays and the add-marker state machine
    controller: MapController<WalkersSurface>,

    /// Background geocoder requests
    search: SearchWorker,

    sidebar_open: bool,
}

impl FjordMapApp {
    pub fn new(cc: &eframe::CreationContext<'_>, runtime: tokio::runtime::Handle) -> Self {
        let cli_args = Settings::from_cli();

        let persisted = if cli_args.ignore_persisted {
            tracing::info!("Ignoring persisted state (--ignore-persisted flag)");
            PersistedSettings::default()
        } else {
            cc.storage
                .map(Self::load_persisted_settings)
                .unwrap_or_default()
        };

        let base_layer = if cli_args.satellite {
            BaseLayerKind::Satellite
        } else {
            persisted.base_layer
        };

        let config = MapConfig {
            base_layer,
            ..Default::default()
        };
        let pois = PoiStore::load(Self::open_storage(cli_args.storage.as_deref()), DEFAULT_POI_SLOT);
        let mut controller = MapController::new(config, pois, Self::load_track(&cli_args));
        controller.set_activities(Self::load_itinerary(&cli_args));
        controller.set_user_location(cli_args.location);
        controller.mount(WalkersSurface::new(cc.egui_ctx.clone()));

        let geocoding = GeocodingConfig {
            endpoint: cli_args.geocoder_url.clone(),
            limit: cli_args.search_limit,
            ..Default::default()
        };
        let client = match SearchClient::new(geocoding) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::error!("Search disabled: {e}");
                None
            }
        };

        tracing::info!(
            "Initialized with {} activities and {} saved places",
            controller.activities().len(),
            controller.pois().len()
        );

        Self {
            controller,
            search: SearchWorker::new(client, runtime),
            sidebar_open: persisted.sidebar_open,
        }
    }

    /// Load persisted settings from eframe storage
    fn load_persisted_settings(storage: &dyn eframe::Storage) -> PersistedSettings {
        if let Some(json) = storage.get_string("persisted_settings")
            && !json.is_empty()
            && let Ok(settings) = serde_json::from_str::<PersistedSettings>(&json)
        {
            tracing::info!("Restored settings");
            return settings;
        }

        tracing::info!("No persisted settings found, starting fresh");
        PersistedSettings::default()
    }

    /// File-backed slot storage, or memory when the file cannot be used
    fn open_storage(path: Option<&Path>) -> Box<dyn StorageBackend> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(FileStorage::default_path);
        match FileStorage::open(&path) {
            Ok(storage) => {
                tracing::info!("Saving places to {}", storage.path().display());
                Box::new(storage)
            }
            Err(e) => {
                tracing::error!(
                    "Cannot use {} ({e}), saved places will be lost on exit",
                    path.display()
                );
                Box::new(MemoryStorage::new())
            }
        }
    }

    fn load_track(cli_args: &Settings) -> Option<Track> {
        match &cli_args.track {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(text) => load_track(&text),
                Err(e) => {
                    tracing::warn!("Cannot read track {}: {e}", path.display());
                    None
                }
            },
            None => load_track(BUNDLED_TRACK),
        }
    }

    fn load_itinerary(cli_args: &Settings) -> Vec<Activity> {
        let text = match &cli_args.itinerary {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Cannot read itinerary {}: {e}", path.display());
                    return Vec::new();
                }
            },
            None => BUNDLED_ITINERARY.to_string(),
        };

        parse_itinerary(&text).unwrap_or_else(|e| {
            tracing::warn!("Itinerary not shown: {e}");
            Vec::new()
        })
    }

    /// Apply finished searches; stale ones are dropped by the ticket guard
    fn process_search_results(&mut self) {
        for (ticket, results) in self.search.poll() {
            self.controller.complete_search(ticket, results);
        }
    }
}

#[profiling::all_functions]
impl eframe::App for FjordMapApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_search_results();

        if ctx.input(|i| i.key_pressed(egui::Key::Escape)) && self.controller.is_adding() {
            self.controller.toggle_adding();
        }

        ui_panels::render_sidebar(ctx, &mut self.controller, self.sidebar_open);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                profiling::scope!("map_panel");

                // Input collected while drawing is applied in the same frame
                let events = match self.controller.surface_mut() {
                    Some(surface) => {
                        surface.show(ui);
                        surface.drain_events()
                    }
                    None => Vec::new(),
                };
                for event in events {
                    self.controller.handle_event(event);
                }

                ui_panels::map_controls(ui, &mut self.controller, &mut self.sidebar_open);

                let attribution = self
                    .controller
                    .surface()
                    .and_then(WalkersSurface::attribution)
                    .unwrap_or_default();
                ui_panels::attribution(ui, attribution);
            });

        if let Some((ticket, query)) = ui_panels::search_bar(ctx, &mut self.controller) {
            self.search.dispatch(ticket, query, ctx.clone());
        }

        ui_panels::new_point_form(ctx, &mut self.controller);
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedSettings {
            base_layer: self.controller.base_layer(),
            sidebar_open: self.sidebar_open,
        };

        if let Ok(json) = serde_json::to_string(&settings) {
            storage.set_string("persisted_settings", json);
            tracing::debug!("Saved settings");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_data_parses() {
        let track = load_track(BUNDLED_TRACK).unwrap();
        assert_eq!(track.name(), "Flåmsbana");
        assert!(track.points().len() > 10);
        // Myrdal to Flåm, sampled coarsely
        assert!((12_000.0..25_000.0).contains(&track.length_meters()));

        let activities = parse_itinerary(BUNDLED_ITINERARY).unwrap();
        assert!(!activities.is_empty());
        assert!(activities.iter().any(Activity::is_leg));
        let region = fjord_map_lib::RegionBounds::default();
        assert!(activities.iter().all(|a| region.contains(&a.coords)));
    }

    #[test]
    fn test_persisted_settings_tolerate_missing_fields() {
        let settings: PersistedSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PersistedSettings::default());

        let json = serde_json::to_string(&PersistedSettings {
            base_layer: BaseLayerKind::Satellite,
            sidebar_open: true,
        })
        .unwrap();
        let restored: PersistedSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.base_layer, BaseLayerKind::Satellite);
        assert!(restored.sidebar_open);
    }

    #[test]
    fn test_unusable_storage_falls_back_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be cannot be opened as storage
        let backend = FjordMapApp::open_storage(Some(dir.path()));
        backend.set_string("k", "v").unwrap();
        assert_eq!(backend.get_string("k").unwrap().as_deref(), Some("v"));
    }
}
