//! `MapSurface` implementation on top of `walkers`
//!
//! The controller talks to [`WalkersSurface`] in retained-mode terms (add this
//! marker, remove that overlay); the surface keeps a [`Scene`] and redraws it
//! every frame through [`OverlayPlugin`](crate::app::plugin::OverlayPlugin).

use crate::app::plugin::OverlayPlugin;
use fjord_map_lib::{
    Coordinate, CursorStyle, LayerId, MapEvent, MapSurface, Marker, OverlayId, Polyline, Popup,
    TileLayer,
};
use std::collections::BTreeMap;
use std::time::Duration;
use walkers::{
    HttpTiles, Map, MapMemory, TileId, Tiles,
    sources::{Attribution, TileSource},
};

/// Tile source driven by a [`TileLayer`] URL template
pub struct TemplateTiles(pub &'static TileLayer);

impl TileSource for TemplateTiles {
    fn tile_url(&self, tile_id: TileId) -> String {
        self.0.tile_url(tile_id.zoom, tile_id.x, tile_id.y)
    }

    fn attribution(&self) -> Attribution {
        Attribution {
            text: self.0.attribution,
            url: self.0.attribution_url,
            logo_light: None,
            logo_dark: None,
        }
    }

    fn max_zoom(&self) -> u8 {
        self.0.max_zoom
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    Marker(Marker),
    Polyline(Polyline),
}

impl Overlay {
    pub fn popup(&self) -> Option<&Popup> {
        match self {
            Overlay::Marker(marker) => marker.popup.as_ref(),
            Overlay::Polyline(line) => line.popup.as_ref(),
        }
    }
}

/// Animated camera move
#[derive(Clone, Copy, Debug)]
pub struct Flight {
    from: (Coordinate, f64),
    to: (Coordinate, f64),
    started: instant::Instant,
    duration: Duration,
}

impl Flight {
    pub fn new(
        from: (Coordinate, f64),
        to: (Coordinate, f64),
        started: instant::Instant,
        duration: Duration,
    ) -> Self {
        Self {
            from,
            to,
            started,
            duration,
        }
    }

    /// Camera at `now` and whether the flight has landed
    pub fn at(&self, now: instant::Instant) -> ((Coordinate, f64), bool) {
        let elapsed = now.saturating_duration_since(self.started).as_secs_f64();
        let total = self.duration.as_secs_f64();
        if total <= 0.0 || elapsed >= total {
            return (self.to, true);
        }

        // Ease in-out
        let t = elapsed / total;
        let t = t * t * (3.0 - 2.0 * t);
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        let center = Coordinate::new(
            lerp(self.from.0.latitude, self.to.0.latitude),
            lerp(self.from.0.longitude, self.to.0.longitude),
        );
        ((center, lerp(self.from.1, self.to.1)), false)
    }
}

/// Everything drawn over the tiles, plus input collected while drawing
#[derive(Default)]
pub struct Scene {
    next_id: u64,
    overlays: BTreeMap<OverlayId, Overlay>,
    popup: Option<OverlayId>,
    /// Screen anchor of the open popup, set while drawing
    pub popup_anchor: Option<egui::Pos2>,
    pub cursor: CursorStyle,
    events: Vec<MapEvent>,
    /// Camera as seen in the last drawn frame
    pub view: Option<(Coordinate, f64)>,
}

impl Scene {
    pub fn issue_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn insert(&mut self, overlay: Overlay) -> OverlayId {
        let id = OverlayId(self.issue_id());
        self.overlays.insert(id, overlay);
        id
    }

    pub fn remove(&mut self, id: OverlayId) {
        if self.overlays.remove(&id).is_some() && self.popup == Some(id) {
            self.popup = None;
        }
    }

    /// Overlays in insertion order, which is also drawing order
    pub fn overlays(&self) -> impl Iterator<Item = (OverlayId, &Overlay)> {
        self.overlays.iter().map(|(id, overlay)| (*id, overlay))
    }

    /// Show the popup of `id`; ignored for unknown overlays or ones without a popup
    pub fn open_popup(&mut self, id: OverlayId) {
        if self.overlays.get(&id).and_then(Overlay::popup).is_some() {
            self.popup = Some(id);
        } else {
            self.popup = None;
        }
    }

    pub fn close_popup(&mut self) {
        self.popup = None;
        self.popup_anchor = None;
    }

    /// The open popup and the coordinate it is anchored to
    pub fn popup(&self) -> Option<(&Popup, Coordinate)> {
        let id = self.popup?;
        let overlay = self.overlays.get(&id)?;
        let anchor = match overlay {
            Overlay::Marker(marker) => marker.position,
            Overlay::Polyline(line) => line.points.get(line.points.len() / 2).copied()?,
        };
        Some((overlay.popup()?, anchor))
    }

    pub fn push_event(&mut self, event: MapEvent) {
        self.events.push(event);
    }

    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        std::mem::take(&mut self.events)
    }

    /// Topmost overlay under `click`, given a projection to screen space
    ///
    /// Markers win over lines; among markers the one drawn last wins.
    pub fn hit_test(
        &self,
        click: egui::Pos2,
        project: impl Fn(Coordinate) -> egui::Pos2,
        marker_radius: f32,
        line_tolerance: f32,
    ) -> Option<OverlayId> {
        let marker = self
            .overlays
            .iter()
            .rev()
            .find(|(_, overlay)| match overlay {
                Overlay::Marker(marker) => project(marker.position).distance(click) <= marker_radius,
                Overlay::Polyline(_) => false,
            })
            .map(|(id, _)| *id);
        if marker.is_some() {
            return marker;
        }

        self.overlays
            .iter()
            .rev()
            .find(|(_, overlay)| match overlay {
                Overlay::Polyline(line) => line.points.windows(2).any(|pair| {
                    segment_distance(click, project(pair[0]), project(pair[1])) <= line_tolerance
                }),
                Overlay::Marker(_) => false,
            })
            .map(|(id, _)| *id)
    }

    fn clear(&mut self) {
        self.overlays.clear();
        self.events.clear();
        self.close_popup();
        self.cursor = CursorStyle::Default;
    }
}

/// Distance from `p` to the segment `a`-`b`, in screen units
fn segment_distance(p: egui::Pos2, a: egui::Pos2, b: egui::Pos2) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

struct BaseLayer {
    id: LayerId,
    layer: &'static TileLayer,
    tiles: HttpTiles,
}

/// A `walkers` map that the controller draws on
pub struct WalkersSurface {
    ctx: egui::Context,
    map_memory: MapMemory,
    base: Option<BaseLayer>,
    flight: Option<Flight>,
    /// Center used before the first frame places the camera
    home: Coordinate,
    scene: Scene,
    disposed: bool,
}

impl WalkersSurface {
    pub fn new(ctx: egui::Context) -> Self {
        Self {
            ctx,
            map_memory: MapMemory::default(),
            base: None,
            flight: None,
            home: Coordinate::new(0.0, 0.0),
            scene: Scene::default(),
            disposed: false,
        }
    }

    /// Attribution of the attached base layer
    pub fn attribution(&self) -> Option<&'static str> {
        self.base.as_ref().map(|base| base.layer.attribution)
    }

    /// Input gathered since the last call
    pub fn drain_events(&mut self) -> Vec<MapEvent> {
        self.scene.drain_events()
    }

    fn jump(&mut self, center: Coordinate, zoom: f64) {
        self.map_memory
            .center_at(walkers::lat_lon(center.latitude, center.longitude));
        let _ = self.map_memory.set_zoom(zoom);
    }

    fn advance_flight(&mut self) {
        let Some(flight) = self.flight else {
            return;
        };
        let ((center, zoom), landed) = flight.at(instant::Instant::now());
        self.jump(center, zoom);
        if landed {
            self.flight = None;
        } else {
            self.ctx.request_repaint();
        }
    }

    /// Draw the map into `ui`
    pub fn show(&mut self, ui: &mut egui::Ui) {
        profiling::scope!("WalkersSurface::show");

        self.advance_flight();

        let tiles = self
            .base
            .as_mut()
            .map(|base| &mut base.tiles as &mut dyn Tiles);
        let home = walkers::lat_lon(self.home.latitude, self.home.longitude);
        let map = Map::new(tiles, &mut self.map_memory, home)
            .with_plugin(OverlayPlugin::new(&mut self.scene));
        let response = ui.add(map);

        if self.scene.cursor == CursorStyle::Crosshair && response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        self.show_popup(ui.ctx());
    }

    /// The open popup as a floating window anchored above its overlay
    fn show_popup(&mut self, ctx: &egui::Context) {
        let Some(anchor) = self.scene.popup_anchor else {
            return;
        };
        let Some((popup, _)) = self.scene.popup() else {
            return;
        };
        let popup = popup.clone();

        let mut close = false;
        let mut triggered = None;
        egui::Area::new(egui::Id::new("map_popup"))
            .order(egui::Order::Foreground)
            .pivot(egui::Align2::CENTER_BOTTOM)
            .fixed_pos(anchor - egui::vec2(0.0, 16.0))
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.set_max_width(240.0);
                    ui.horizontal(|ui| {
                        ui.strong(&popup.title);
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.small_button("✕").clicked() {
                                close = true;
                            }
                        });
                    });
                    if let Some(body) = &popup.body {
                        ui.label(body);
                    }
                    if let Some(action) = &popup.action {
                        ui.add_space(4.0);
                        let button = egui::Button::new(
                            egui::RichText::new(format!("🗑 {}", action.label()))
                                .color(egui::Color32::from_rgb(220, 38, 38)),
                        );
                        if ui.add(button).clicked() {
                            triggered = Some(action.clone());
                        }
                    }
                });
            });

        if close {
            self.scene.close_popup();
        }
        if let Some(action) = triggered {
            self.scene.push_event(MapEvent::PopupAction(action));
        }
    }
}

impl MapSurface for WalkersSurface {
    fn set_camera(&mut self, center: Coordinate, zoom: f64, animation: Option<Duration>) {
        match (animation, self.scene.view) {
            (Some(duration), Some(view)) => {
                self.flight = Some(Flight::new(
                    view,
                    (center, zoom),
                    instant::Instant::now(),
                    duration,
                ));
            }
            _ => {
                if self.scene.view.is_none() {
                    self.home = center;
                }
                self.flight = None;
                self.jump(center, zoom);
            }
        }
        self.ctx.request_repaint();
    }

    fn attach_base_layer(&mut self, layer: &'static TileLayer) -> LayerId {
        let id = LayerId(self.scene.issue_id());
        self.base = Some(BaseLayer {
            id,
            layer,
            tiles: HttpTiles::new(TemplateTiles(layer), self.ctx.clone()),
        });
        tracing::debug!("Attached {} tiles", layer.kind.name());
        id
    }

    fn detach_base_layer(&mut self, id: LayerId) {
        if self.base.as_ref().is_some_and(|base| base.id == id) {
            self.base = None;
        }
    }

    fn add_marker(&mut self, marker: Marker) -> OverlayId {
        self.scene.insert(Overlay::Marker(marker))
    }

    fn add_polyline(&mut self, polyline: Polyline) -> OverlayId {
        self.scene.insert(Overlay::Polyline(polyline))
    }

    fn remove_overlay(&mut self, id: OverlayId) {
        self.scene.remove(id);
    }

    fn open_popup(&mut self, id: OverlayId) {
        self.scene.open_popup(id);
        self.ctx.request_repaint();
    }

    fn close_popup(&mut self) {
        self.scene.close_popup();
    }

    fn set_cursor(&mut self, cursor: CursorStyle) {
        self.scene.cursor = cursor;
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.base = None;
        self.flight = None;
        self.scene.clear();
        tracing::debug!("Map surface disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fjord_map_lib::{LineStyle, MarkerStyle, PopupAction};

    /// 1 degree = 100 screen units, latitude pointing up
    fn project(c: Coordinate) -> egui::Pos2 {
        egui::pos2((c.longitude * 100.0) as f32, (-c.latitude * 100.0) as f32)
    }

    fn poi_marker(lat: f64, lon: f64) -> Overlay {
        Overlay::Marker(
            Marker::new(Coordinate::new(lat, lon), MarkerStyle::CustomPoi).with_popup(
                Popup::new("Mirador").with_action(PopupAction::DeletePoi("poi_1".to_string())),
            ),
        )
    }

    #[test]
    fn test_hit_test_prefers_markers() {
        let mut scene = Scene::default();
        let line = scene.insert(Overlay::Polyline(Polyline::new(
            vec![Coordinate::new(60.0, 7.0), Coordinate::new(60.0, 8.0)],
            LineStyle::Track,
        )));
        let marker = scene.insert(poi_marker(60.0, 7.5));

        let on_marker = project(Coordinate::new(60.0, 7.5));
        assert_eq!(scene.hit_test(on_marker, project, 12.0, 6.0), Some(marker));

        let on_line = project(Coordinate::new(60.0, 7.8)) + egui::vec2(0.0, 3.0);
        assert_eq!(scene.hit_test(on_line, project, 12.0, 6.0), Some(line));

        let nowhere = project(Coordinate::new(61.0, 7.5));
        assert_eq!(scene.hit_test(nowhere, project, 12.0, 6.0), None);
    }

    #[test]
    fn test_hit_test_topmost_marker() {
        let mut scene = Scene::default();
        let _below = scene.insert(poi_marker(60.0, 7.0));
        let above = scene.insert(poi_marker(60.0, 7.01));
        let click = project(Coordinate::new(60.0, 7.005));
        assert_eq!(scene.hit_test(click, project, 12.0, 6.0), Some(above));
    }

    #[test]
    fn test_popup_follows_overlay() {
        let mut scene = Scene::default();
        let id = scene.insert(poi_marker(60.864, 7.119));
        let silent = scene.insert(Overlay::Marker(Marker::new(
            Coordinate::new(60.0, 7.0),
            MarkerStyle::UserLocation,
        )));

        scene.open_popup(id);
        let (popup, anchor) = scene.popup().unwrap();
        assert_eq!(popup.title, "Mirador");
        assert_eq!(anchor, Coordinate::new(60.864, 7.119));

        // Markers without a popup close the open one
        scene.open_popup(silent);
        assert!(scene.popup().is_none());

        scene.open_popup(id);
        assert_eq!(scene.popup, Some(id));
        scene.remove(id);
        assert!(scene.popup().is_none());
        assert_eq!(scene.overlays().count(), 1);
        scene.remove(silent);
        assert_eq!(scene.overlays().count(), 0);
    }

    #[test]
    fn test_events_drain_once() {
        let mut scene = Scene::default();
        scene.push_event(MapEvent::PopupAction(PopupAction::DeletePoi(
            "poi_1".to_string(),
        )));
        assert_eq!(scene.drain_events().len(), 1);
        assert!(scene.drain_events().is_empty());
    }

    #[test]
    fn test_ids_are_unique_across_kinds() {
        let mut scene = Scene::default();
        let layer = scene.issue_id();
        let marker = scene.insert(poi_marker(60.0, 7.0));
        assert_ne!(layer, marker.0);
    }

    #[test]
    fn test_flight_interpolates_and_lands() {
        let start = instant::Instant::now();
        let flight = Flight::new(
            (Coordinate::new(60.0, 7.0), 13.0),
            (Coordinate::new(61.0, 8.0), 16.0),
            start,
            Duration::from_millis(1500),
        );

        let ((center, zoom), landed) = flight.at(start);
        assert!(!landed);
        assert_eq!(center, Coordinate::new(60.0, 7.0));
        assert_eq!(zoom, 13.0);

        let ((center, zoom), landed) = flight.at(start + Duration::from_millis(750));
        assert!(!landed);
        assert!((center.latitude - 60.5).abs() < 1e-9);
        assert!((zoom - 14.5).abs() < 1e-9);

        let ((center, zoom), landed) = flight.at(start + Duration::from_secs(2));
        assert!(landed);
        assert_eq!(center, Coordinate::new(61.0, 8.0));
        assert_eq!(zoom, 16.0);
    }

    #[test]
    fn test_tile_source_uses_template() {
        let source = TemplateTiles(&fjord_map_lib::STANDARD_LAYER);
        let url = source.tile_url(TileId {
            x: 4353,
            y: 2245,
            zoom: 13,
        });
        assert_eq!(url, "https://tile.openstreetmap.org/13/4353/2245.png");
        assert_eq!(source.max_zoom(), 18);
    }

    #[test]
    fn test_segment_distance() {
        let a = egui::pos2(0.0, 0.0);
        let b = egui::pos2(10.0, 0.0);
        assert_eq!(segment_distance(egui::pos2(5.0, 3.0), a, b), 3.0);
        assert_eq!(segment_distance(egui::pos2(-4.0, 3.0), a, b), 5.0);
        assert_eq!(segment_distance(egui::pos2(1.0, 1.0), a, a), 2f32.sqrt());
    }
}
