//! The map library seam
//!
//! [`MapSurface`] is what the controller needs from a slippy-map widget:
//! camera control, one base tile layer, markers and polylines with popups,
//! and a cursor hint. User input travels the other way as [`MapEvent`]s.

use crate::Coordinate;
use std::time::Duration;

/// Handle for a marker or polyline, issued by the surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OverlayId(pub u64);

/// Handle for an attached tile layer, issued by the surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LayerId(pub u64);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BaseLayerKind {
    #[default]
    Standard,
    Satellite,
}

impl BaseLayerKind {
    pub fn tile_layer(&self) -> &'static TileLayer {
        match self {
            Self::Standard => &STANDARD_LAYER,
            Self::Satellite => &SATELLITE_LAYER,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Satellite => "Satellite",
        }
    }
}

/// A raster tile source: URL template with `{z}`, `{x}`, `{y}` (and
/// optionally `{s}`) placeholders
#[derive(Debug, PartialEq, Eq)]
pub struct TileLayer {
    pub kind: BaseLayerKind,
    pub url_template: &'static str,
    pub attribution: &'static str,
    pub attribution_url: &'static str,
    pub max_zoom: u8,
}

impl TileLayer {
    /// URL for one tile
    pub fn tile_url(&self, zoom: u8, x: u32, y: u32) -> String {
        self.url_template
            .replace("{s}", "a")
            .replace("{z}", &zoom.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }
}

pub static STANDARD_LAYER: TileLayer = TileLayer {
    kind: BaseLayerKind::Standard,
    url_template: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
    attribution: "© OpenStreetMap contributors",
    attribution_url: "https://www.openstreetmap.org/copyright",
    max_zoom: 18,
};

pub static SATELLITE_LAYER: TileLayer = TileLayer {
    kind: BaseLayerKind::Satellite,
    url_template: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
    attribution: "Tiles © Esri — Source: Esri, i-cubed, USDA, USGS, AEX, GeoEye, Getmapping, Aerogrid, IGN, IGP, UPR-EGP, and the GIS User Community",
    attribution_url: "https://www.esri.com/",
    max_zoom: 18,
};

/// What a marker represents; the surface picks colors and shapes from it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MarkerStyle {
    ItineraryStart,
    ItineraryEnd,
    CustomPoi,
    UserLocation,
    SearchResult,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LineStyle {
    /// The pre-recorded track
    Track,
    /// Dashed connector between an activity's start and end
    ItineraryLeg,
}

/// Something the user can trigger from inside a popup
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PopupAction {
    DeletePoi(String),
}

impl PopupAction {
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeletePoi(_) => "Delete marker",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Popup {
    pub title: String,
    pub body: Option<String>,
    pub action: Option<PopupAction>,
}

impl Popup {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: None,
            action: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_action(mut self, action: PopupAction) -> Self {
        self.action = Some(action);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Marker {
    pub position: Coordinate,
    pub style: MarkerStyle,
    pub popup: Option<Popup>,
}

impl Marker {
    pub fn new(position: Coordinate, style: MarkerStyle) -> Self {
        Self {
            position,
            style,
            popup: None,
        }
    }

    pub fn with_popup(mut self, popup: Popup) -> Self {
        self.popup = Some(popup);
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    pub points: Vec<Coordinate>,
    pub style: LineStyle,
    pub popup: Option<Popup>,
}

impl Polyline {
    pub fn new(points: Vec<Coordinate>, style: LineStyle) -> Self {
        Self {
            points,
            style,
            popup: None,
        }
    }

    pub fn with_popup(mut self, popup: Popup) -> Self {
        self.popup = Some(popup);
        self
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CursorStyle {
    #[default]
    Default,
    Crosshair,
}

/// User input reported by the surface
#[derive(Clone, Debug, PartialEq)]
pub enum MapEvent {
    /// A click on the map; `marker` is the marker under the pointer, if any
    Click {
        position: Coordinate,
        marker: Option<OverlayId>,
    },
    /// A popup action button was pressed
    PopupAction(PopupAction),
}

/// Operations the controller performs on the map widget
pub trait MapSurface {
    /// Move the camera, optionally animating over `animation`
    fn set_camera(&mut self, center: Coordinate, zoom: f64, animation: Option<Duration>);

    /// Attach a tile layer beneath every overlay
    fn attach_base_layer(&mut self, layer: &'static TileLayer) -> LayerId;

    fn detach_base_layer(&mut self, id: LayerId);

    fn add_marker(&mut self, marker: Marker) -> OverlayId;

    fn add_polyline(&mut self, polyline: Polyline) -> OverlayId;

    /// Remove a marker or polyline; unknown ids are ignored
    fn remove_overlay(&mut self, id: OverlayId);

    fn open_popup(&mut self, id: OverlayId);

    fn close_popup(&mut self);

    fn set_cursor(&mut self, cursor: CursorStyle);

    /// Release everything held by the surface; no calls follow
    fn dispose(&mut self);
}
