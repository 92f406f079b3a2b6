//! MapController - owns the map surface and keeps its overlays in sync
//!
//! Overlays are reconciled by removing everything previously rendered and
//! re-adding it from the current itinerary, point-of-interest store and user
//! location. The data sets stay in the tens of items, so a full redraw is
//! cheap and leaves no room for duplicate or orphaned markers.
//!
//! The track polyline is added once on mount and the search marker is managed
//! separately; neither is touched by reconciliation.

use crate::surface::{
    BaseLayerKind, CursorStyle, LayerId, LineStyle, MapEvent, MapSurface, Marker, MarkerStyle,
    OverlayId, Polyline, Popup, PopupAction,
};
use crate::{
    Activity, Coordinate, MapError, PoiStore, PointOfInterest, Result, SearchResult, SearchState,
    SearchTicket, Track,
};
use std::time::Duration;

/// Camera and layer defaults
#[derive(Clone, Debug)]
pub struct MapConfig {
    /// Camera position on mount
    pub default_center: Coordinate,
    pub default_zoom: f64,
    /// Zoom used when focusing an external coordinate or a search result
    pub focus_zoom: f64,
    /// Camera flight duration for focus requests
    pub focus_animation: Duration,
    /// Camera flight duration when jumping to a search result
    pub search_animation: Duration,
    /// Base layer attached on mount
    pub base_layer: BaseLayerKind,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            default_center: Coordinate::new(60.8638, 7.1187),
            default_zoom: 13.0,
            focus_zoom: 16.0,
            focus_animation: Duration::from_millis(1500),
            search_animation: Duration::from_millis(250),
            base_layer: BaseLayerKind::Standard,
        }
    }
}

/// Form contents for a point of interest awaiting confirmation
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoiDraft {
    pub title: String,
    pub description: String,
    /// Message from the last rejected confirmation
    pub error: Option<String>,
}

/// Add-marker interaction state
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Interaction {
    /// Normal panning, zooming and marker selection
    #[default]
    Idle,
    /// The next map click picks the spot for a new point of interest
    Adding,
    /// A spot was picked; the confirmation form is open and map clicks are
    /// ignored until it is confirmed or cancelled
    PendingConfirmation { spot: Coordinate, draft: PoiDraft },
}

/// The map view controller
pub struct MapController<S: MapSurface> {
    config: MapConfig,
    /// Present between `mount` and `unmount`
    surface: Option<S>,
    base_layer_kind: BaseLayerKind,
    base_layer: Option<LayerId>,
    track: Option<Track>,
    track_overlay: Option<OverlayId>,
    pois: PoiStore,
    activities: Vec<Activity>,
    user_location: Option<Coordinate>,
    interaction: Interaction,
    search: SearchState,
    search_marker: Option<OverlayId>,
    /// Overlays owned by reconciliation, in z-order
    rendered: Vec<OverlayId>,
    /// Store revision the current overlays were built from
    rendered_revision: Option<u64>,
}

impl<S: MapSurface> MapController<S> {
    pub fn new(config: MapConfig, pois: PoiStore, track: Option<Track>) -> Self {
        let base_layer_kind = config.base_layer;
        Self {
            config,
            surface: None,
            base_layer_kind,
            base_layer: None,
            track,
            track_overlay: None,
            pois,
            activities: Vec::new(),
            user_location: None,
            interaction: Interaction::Idle,
            search: SearchState::new(),
            search_marker: None,
            rendered: Vec::new(),
            rendered_revision: None,
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Take ownership of `surface` and draw the initial map
    ///
    /// A previously mounted surface is released first.
    pub fn mount(&mut self, surface: S) {
        if self.surface.is_some() {
            self.unmount();
        }

        let mut surface = surface;
        surface.set_camera(self.config.default_center, self.config.default_zoom, None);
        self.base_layer = Some(surface.attach_base_layer(self.base_layer_kind.tile_layer()));

        if let Some(track) = &self.track {
            let line = Polyline::new(track.points().to_vec(), LineStyle::Track)
                .with_popup(Popup::new(track.label()));
            self.track_overlay = Some(surface.add_polyline(line));
        } else {
            tracing::info!("Mounting map without a track overlay");
        }

        self.surface = Some(surface);
        self.reconcile();
        tracing::info!(
            "Map mounted ({} layer, {} overlays)",
            self.base_layer_kind.name(),
            self.rendered.len() + usize::from(self.track_overlay.is_some())
        );
    }

    /// Remove everything from the surface and release it
    ///
    /// Safe to call when nothing is mounted; also runs on drop.
    pub fn unmount(&mut self) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };

        for id in self.rendered.drain(..) {
            surface.remove_overlay(id);
        }
        if let Some(id) = self.track_overlay.take() {
            surface.remove_overlay(id);
        }
        if let Some(id) = self.search_marker.take() {
            surface.remove_overlay(id);
        }
        if let Some(id) = self.base_layer.take() {
            surface.detach_base_layer(id);
        }
        surface.close_popup();
        surface.set_cursor(CursorStyle::Default);
        surface.dispose();

        self.interaction = Interaction::Idle;
        self.search.clear_results();
        self.rendered_revision = None;
        tracing::info!("Map unmounted");
    }

    #[inline]
    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    // ------------------------------------------------------------------
    // Host inputs
    // ------------------------------------------------------------------

    /// Replace the itinerary; re-renders when it differs
    pub fn set_activities(&mut self, activities: Vec<Activity>) {
        if self.activities == activities {
            return;
        }
        self.activities = activities;
        self.reconcile();
    }

    /// Replace the user location; re-renders when it differs
    pub fn set_user_location(&mut self, location: Option<Coordinate>) {
        if self.user_location == location {
            return;
        }
        self.user_location = location;
        self.reconcile();
    }

    /// Fly the camera to `target` at the close focus zoom
    pub fn focus(&mut self, target: Coordinate) {
        match self.surface.as_mut() {
            Some(surface) => {
                surface.set_camera(
                    target,
                    self.config.focus_zoom,
                    Some(self.config.focus_animation),
                );
            }
            None => tracing::debug!("Ignoring focus request while unmounted"),
        }
    }

    /// Swap the base tile layer
    pub fn set_base_layer(&mut self, kind: BaseLayerKind) {
        if kind == self.base_layer_kind && (self.base_layer.is_some() || self.surface.is_none()) {
            return;
        }
        self.base_layer_kind = kind;

        if let Some(surface) = self.surface.as_mut() {
            if let Some(old) = self.base_layer.take() {
                surface.detach_base_layer(old);
            }
            self.base_layer = Some(surface.attach_base_layer(kind.tile_layer()));
            tracing::debug!("Switched base layer to {}", kind.name());
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    #[inline]
    pub fn base_layer(&self) -> BaseLayerKind {
        self.base_layer_kind
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    pub fn pois(&self) -> &PoiStore {
        &self.pois
    }

    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.user_location
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    #[inline]
    pub fn is_adding(&self) -> bool {
        matches!(self.interaction, Interaction::Adding)
    }

    pub fn pending_spot(&self) -> Option<Coordinate> {
        match &self.interaction {
            Interaction::PendingConfirmation { spot, .. } => Some(*spot),
            _ => None,
        }
    }

    /// The open confirmation form, if any
    pub fn draft_mut(&mut self) -> Option<&mut PoiDraft> {
        match &mut self.interaction {
            Interaction::PendingConfirmation { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Overlays currently owned by reconciliation, in z-order
    pub fn rendered_overlays(&self) -> &[OverlayId] {
        &self.rendered
    }

    pub fn track_overlay(&self) -> Option<OverlayId> {
        self.track_overlay
    }

    pub fn search_marker(&self) -> Option<OverlayId> {
        self.search_marker
    }

    // ------------------------------------------------------------------
    // Add-marker state machine
    // ------------------------------------------------------------------

    /// Enter or leave add mode; ignored while the confirmation form is open
    pub fn toggle_adding(&mut self) {
        let (next, cursor) = match self.interaction {
            Interaction::Idle => (Interaction::Adding, CursorStyle::Crosshair),
            Interaction::Adding => (Interaction::Idle, CursorStyle::Default),
            Interaction::PendingConfirmation { .. } => {
                tracing::debug!("Add mode toggle ignored while confirming a point");
                return;
            }
        };
        self.interaction = next;
        if let Some(surface) = self.surface.as_mut() {
            surface.set_cursor(cursor);
        }
    }

    /// Save the pending spot with the draft's title and description
    ///
    /// A blank title keeps the form open and records the message in the draft.
    pub fn confirm_pending(&mut self) -> Result<PointOfInterest> {
        let result = match &self.interaction {
            Interaction::PendingConfirmation { spot, draft } => {
                self.pois
                    .create(*spot, &draft.title, Some(draft.description.as_str()))
            }
            _ => {
                return Err(MapError::Validation(
                    "no spot is awaiting confirmation".to_string(),
                ));
            }
        };

        match result {
            Ok(poi) => {
                self.interaction = Interaction::Idle;
                self.refresh();
                Ok(poi)
            }
            Err(e) => {
                if let Some(draft) = self.draft_mut() {
                    draft.error = Some(e.to_string());
                }
                Err(e)
            }
        }
    }

    /// Discard the pending spot without touching the store
    pub fn cancel_pending(&mut self) {
        if matches!(self.interaction, Interaction::PendingConfirmation { .. }) {
            self.interaction = Interaction::Idle;
        }
    }

    // ------------------------------------------------------------------
    // Events and actions
    // ------------------------------------------------------------------

    /// Apply user input reported by the surface
    pub fn handle_event(&mut self, event: MapEvent) {
        match event {
            MapEvent::Click { position, marker } => self.handle_click(position, marker),
            MapEvent::PopupAction(PopupAction::DeletePoi(id)) => self.delete_poi(&id),
        }
    }

    fn handle_click(&mut self, position: Coordinate, marker: Option<OverlayId>) {
        match self.interaction {
            Interaction::Adding => {
                self.interaction = Interaction::PendingConfirmation {
                    spot: position,
                    draft: PoiDraft::default(),
                };
                if let Some(surface) = self.surface.as_mut() {
                    surface.set_cursor(CursorStyle::Default);
                }
            }
            Interaction::PendingConfirmation { .. } => {}
            Interaction::Idle => {
                if let Some(surface) = self.surface.as_mut() {
                    match marker {
                        Some(id) => surface.open_popup(id),
                        None => surface.close_popup(),
                    }
                }
            }
        }
    }

    /// Delete a point of interest and close any open popup
    pub fn delete_poi(&mut self, id: &str) {
        self.pois.delete(id);
        if let Some(surface) = self.surface.as_mut() {
            surface.close_popup();
        }
        self.refresh();
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn search_mut(&mut self) -> &mut SearchState {
        &mut self.search
    }

    /// Start a search for the current query; `None` for a blank query
    ///
    /// Returns the ticket and the trimmed query to send.
    pub fn begin_search(&mut self) -> Option<(SearchTicket, String)> {
        let ticket = self.search.begin()?;
        Some((ticket, self.search.query.trim().to_string()))
    }

    /// Deliver results; stale tickets are ignored
    pub fn complete_search(&mut self, ticket: SearchTicket, results: Vec<SearchResult>) -> bool {
        self.search.complete(ticket, results)
    }

    /// Jump to a result and mark it, replacing any previous search marker
    pub fn select_search_result(&mut self, index: usize) -> Option<SearchResult> {
        let surface = self.surface.as_mut()?;
        let result = self.search.take_result(index)?;

        if let Some(old) = self.search_marker.take() {
            surface.remove_overlay(old);
        }
        surface.set_camera(
            result.coordinate,
            self.config.focus_zoom,
            Some(self.config.search_animation),
        );
        let marker = Marker::new(result.coordinate, MarkerStyle::SearchResult)
            .with_popup(Popup::new(result.short_name()));
        let id = surface.add_marker(marker);
        surface.open_popup(id);
        self.search_marker = Some(id);

        tracing::debug!("Selected search result '{}'", result.short_name());
        Some(result)
    }

    // ------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------

    /// Re-render if the store changed since the last reconciliation
    pub fn refresh(&mut self) {
        if self.rendered_revision != Some(self.pois.revision()) {
            self.reconcile();
        }
    }

    /// Remove all rendered overlays and rebuild them from current data
    fn reconcile(&mut self) {
        #[cfg(feature = "profiling")]
        profiling::scope!("controller::reconcile");

        let Some(surface) = self.surface.as_mut() else {
            return;
        };

        for id in self.rendered.drain(..) {
            surface.remove_overlay(id);
        }

        for activity in &self.activities {
            let start = Marker::new(activity.coords, MarkerStyle::ItineraryStart).with_popup(
                Popup::new(activity.title.clone()).with_body(activity.location_name.clone()),
            );
            self.rendered.push(surface.add_marker(start));

            if let Some(end) = activity.end_coords {
                let end_marker = Marker::new(end, MarkerStyle::ItineraryEnd)
                    .with_popup(Popup::new(format!("End: {}", activity.title)));
                self.rendered.push(surface.add_marker(end_marker));

                let leg = Polyline::new(vec![activity.coords, end], LineStyle::ItineraryLeg);
                self.rendered.push(surface.add_polyline(leg));
            }
        }

        for poi in self.pois.list() {
            let popup = Popup::new(poi.title.clone())
                .with_body(
                    poi.description
                        .clone()
                        .unwrap_or_else(|| "No description".to_string()),
                )
                .with_action(PopupAction::DeletePoi(poi.id.clone()));
            let marker = Marker::new(poi.coordinate, MarkerStyle::CustomPoi).with_popup(popup);
            self.rendered.push(surface.add_marker(marker));
        }

        if let Some(location) = self.user_location {
            self.rendered
                .push(surface.add_marker(Marker::new(location, MarkerStyle::UserLocation)));
        }

        self.rendered_revision = Some(self.pois.revision());
        tracing::debug!(
            "Reconciled {} overlays ({} activities, {} points of interest, location: {})",
            self.rendered.len(),
            self.activities.len(),
            self.pois.len(),
            self.user_location.is_some()
        );
    }
}

impl<S: MapSurface> Drop for MapController<S> {
    fn drop(&mut self) {
        self.unmount();
    }
}
