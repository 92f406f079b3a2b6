//! Walkers plugin that draws the retained scene and turns clicks into map events

use crate::app::surface::{Overlay, Scene};
use egui::{Color32, Stroke};
use fjord_map_lib::{Coordinate, LineStyle, MapEvent, MarkerStyle};
use walkers::{Plugin, Projector};

/// Click radius around a marker center, in points
const MARKER_HIT_RADIUS: f32 = 14.0;
/// Click tolerance around a line, in points
const LINE_HIT_TOLERANCE: f32 = 6.0;

const TRACK_COLOR: Color32 = Color32::from_rgb(0xFF, 0xB3, 0x47);
const ITINERARY_COLOR: Color32 = Color32::from_rgb(0x2A, 0x5B, 0x87);
const ITINERARY_END_COLOR: Color32 = Color32::from_rgb(0x3A, 0x7D, 0x44);
const POI_COLOR: Color32 = Color32::from_rgb(0x8B, 0x5C, 0xF6);
const LOCATION_COLOR: Color32 = Color32::from_rgb(0x3B, 0x82, 0xF6);
const SEARCH_COLOR: Color32 = Color32::from_rgb(0xEF, 0x44, 0x44);

/// How a marker is painted
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerPaint {
    pub fill: Color32,
    pub radius: f32,
    pub outline: f32,
    /// White dot in the middle (pins)
    pub pin: bool,
}

pub fn marker_paint(style: MarkerStyle) -> MarkerPaint {
    let pin = |fill| MarkerPaint {
        fill,
        radius: 10.0,
        outline: 2.0,
        pin: true,
    };
    match style {
        MarkerStyle::ItineraryStart => pin(ITINERARY_COLOR),
        MarkerStyle::ItineraryEnd => pin(ITINERARY_END_COLOR),
        MarkerStyle::CustomPoi => pin(POI_COLOR),
        MarkerStyle::UserLocation => MarkerPaint {
            fill: LOCATION_COLOR,
            radius: 8.0,
            outline: 3.0,
            pin: false,
        },
        MarkerStyle::SearchResult => MarkerPaint {
            fill: SEARCH_COLOR,
            radius: 7.0,
            outline: 3.0,
            pin: false,
        },
    }
}

pub fn line_stroke(style: LineStyle) -> Stroke {
    match style {
        LineStyle::Track => Stroke::new(5.0, TRACK_COLOR),
        LineStyle::ItineraryLeg => Stroke::new(4.0, ITINERARY_COLOR),
    }
}

/// Draws every overlay of a [`Scene`] and records clicks into it
pub struct OverlayPlugin<'a> {
    scene: &'a mut Scene,
}

impl<'a> OverlayPlugin<'a> {
    pub fn new(scene: &'a mut Scene) -> Self {
        Self { scene }
    }
}

fn draw_marker(painter: &egui::Painter, at: egui::Pos2, paint: MarkerPaint) {
    painter.circle_filled(at + egui::vec2(1.0, 2.0), paint.radius, Color32::from_black_alpha(60));
    painter.circle(at, paint.radius, paint.fill, Stroke::new(paint.outline, Color32::WHITE));
    if paint.pin {
        painter.circle_filled(at, paint.radius * 0.35, Color32::WHITE);
    }
}

impl Plugin for OverlayPlugin<'_> {
    fn run(
        self: Box<Self>,
        ui: &mut egui::Ui,
        response: &egui::Response,
        projector: &Projector,
        map_memory: &walkers::MapMemory,
    ) {
        profiling::scope!("OverlayPlugin::run");

        let scene = self.scene;
        let project = |c: Coordinate| {
            let v = projector.project(walkers::lat_lon(c.latitude, c.longitude));
            egui::pos2(v.x, v.y)
        };

        let center = projector.unproject(response.rect.center().to_vec2());
        scene.view = Some((Coordinate::new(center.y(), center.x()), map_memory.zoom()));

        let painter = ui.painter().with_clip_rect(response.rect);

        // Lines below markers
        for (_, overlay) in scene.overlays() {
            let Overlay::Polyline(line) = overlay else {
                continue;
            };
            if line.points.len() < 2 {
                continue;
            }
            let points: Vec<egui::Pos2> = line.points.iter().map(|c| project(*c)).collect();
            let stroke = line_stroke(line.style);
            match line.style {
                LineStyle::Track => {
                    painter.add(egui::Shape::line(points, stroke));
                }
                LineStyle::ItineraryLeg => {
                    painter.extend(egui::Shape::dashed_line(&points, stroke, 10.0, 10.0));
                }
            }
        }

        for (_, overlay) in scene.overlays() {
            if let Overlay::Marker(marker) = overlay {
                draw_marker(&painter, project(marker.position), marker_paint(marker.style));
            }
        }

        scene.popup_anchor = scene.popup().map(|(_, anchor)| project(anchor));

        if response.clicked()
            && let Some(pointer) = response.interact_pointer_pos()
        {
            let position = projector.unproject(pointer.to_vec2());
            let marker = scene.hit_test(pointer, project, MARKER_HIT_RADIUS, LINE_HIT_TOLERANCE);
            scene.push_event(MapEvent::Click {
                position: Coordinate::new(position.y(), position.x()),
                marker,
            });
        }
    }
}
