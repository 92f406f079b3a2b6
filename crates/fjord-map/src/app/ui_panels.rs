//! UI panels for the application
//!
//! Floating search box and map controls over the map, the new-marker form, and
//! the itinerary sidebar. Panels return what the user asked for instead of
//! reaching into the app, so the caller decides how to run it.

use crate::app::surface::WalkersSurface;
use egui::{Color32, RichText, Ui};
use fjord_map_lib::{BaseLayerKind, MapController, SearchTicket};

type Controller = MapController<WalkersSurface>;

const SEARCH_HINT: &str = "Search Flåm / Gudvangen...";

/// Search box with its results dropdown, top-left over the map
///
/// Returns a request to dispatch when the user submitted a non-blank query.
pub fn search_bar(ctx: &egui::Context, controller: &mut Controller) -> Option<(SearchTicket, String)> {
    let mut submitted = false;
    let mut selected = None;

    egui::Area::new(egui::Id::new("search_bar"))
        .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
        .order(egui::Order::Foreground)
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.set_width(300.0);
                ui.horizontal(|ui| {
                    ui.label("🔍");
                    let edit = egui::TextEdit::singleline(&mut controller.search_mut().query)
                        .hint_text(SEARCH_HINT)
                        .desired_width(230.0);
                    let response = ui.add(edit);
                    if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                        submitted = true;
                    }
                    if controller.search().is_searching() {
                        ui.add(egui::Spinner::new());
                    }
                });

                let results = controller.search().results();
                if !results.is_empty() {
                    ui.separator();
                    for (index, result) in results.iter().enumerate() {
                        ui.push_id(result.id, |ui| {
                            let text = format!("{}\n{}", result.short_name(), result.display_name);
                            let button = egui::Button::new(RichText::new(text).small()).frame(false);
                            if ui.add(button).clicked() {
                                selected = Some(index);
                            }
                            ui.separator();
                        });
                    }
                }
            });
        });

    if let Some(index) = selected {
        controller.select_search_result(index);
    }

    if submitted {
        controller.begin_search()
    } else {
        None
    }
}

/// Add-marker toggle, base layer switch and sidebar toggle, top-right over the map
pub fn map_controls(ui: &mut Ui, controller: &mut Controller, sidebar_open: &mut bool) {
    let rect = ui.max_rect();
    let margin = 10.0;

    egui::Area::new(egui::Id::new("map_controls"))
        .fixed_pos(rect.right_top() + egui::vec2(-margin, margin))
        .pivot(egui::Align2::RIGHT_TOP)
        .order(egui::Order::Foreground)
        .show(ui.ctx(), |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.vertical(|ui| {
                    let icon = if *sidebar_open { "✕" } else { "☰" };
                    if ui
                        .button(RichText::new(icon).size(18.0))
                        .on_hover_text("Itinerary")
                        .clicked()
                    {
                        *sidebar_open = !*sidebar_open;
                    }

                    ui.separator();

                    let adding = controller.is_adding();
                    let (label, hint) = if adding {
                        ("✕", "Cancel")
                    } else {
                        ("➕", "Add marker")
                    };
                    let button = egui::Button::new(RichText::new(label).size(18.0)).selected(adding);
                    let pending = controller.pending_spot().is_some();
                    if ui.add_enabled(!pending, button).on_hover_text(hint).clicked() {
                        controller.toggle_adding();
                    }

                    ui.separator();

                    let current = controller.base_layer();
                    for (kind, icon) in [
                        (BaseLayerKind::Standard, "🗺"),
                        (BaseLayerKind::Satellite, "🌍"),
                    ] {
                        if ui
                            .selectable_label(current == kind, RichText::new(icon).size(18.0))
                            .on_hover_text(kind.name())
                            .clicked()
                        {
                            controller.set_base_layer(kind);
                        }
                    }
                });
            });
        });

    if controller.is_adding() {
        adding_hint(ui);
    }
}

/// Banner shown while the next click places a marker
fn adding_hint(ui: &mut Ui) {
    let rect = ui.max_rect();
    let pos = rect.center_top() + egui::vec2(0.0, 60.0);
    egui::Area::new(egui::Id::new("adding_hint"))
        .fixed_pos(pos)
        .pivot(egui::Align2::CENTER_TOP)
        .order(egui::Order::Foreground)
        .interactable(false)
        .show(ui.ctx(), |ui| {
            egui::Frame::popup(ui.style())
                .fill(Color32::from_rgb(0x2A, 0x5B, 0x87))
                .show(ui, |ui| {
                    ui.label(
                        RichText::new("Tap the map to place a marker")
                            .color(Color32::WHITE)
                            .strong(),
                    );
                });
        });
}

enum FormAction {
    Save,
    Cancel,
}

/// The new-marker form, shown while a spot awaits confirmation
pub fn new_point_form(ctx: &egui::Context, controller: &mut Controller) {
    let Some(spot) = controller.pending_spot() else {
        return;
    };
    let Some(draft) = controller.draft_mut() else {
        return;
    };

    let mut action = None;
    egui::Window::new("📍 New marker")
        .collapsible(false)
        .resizable(false)
        .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
        .show(ctx, |ui| {
            ui.label(
                RichText::new(format!("{:.5}, {:.5}", spot.latitude, spot.longitude))
                    .small()
                    .weak(),
            );
            ui.add_space(4.0);

            ui.label("Name");
            let title = ui.add(
                egui::TextEdit::singleline(&mut draft.title)
                    .hint_text("e.g. Nice little shop")
                    .desired_width(f32::INFINITY),
            );
            if title.changed() {
                draft.error = None;
            }

            ui.label("Note (optional)");
            ui.add(
                egui::TextEdit::multiline(&mut draft.description)
                    .hint_text("Comments...")
                    .desired_rows(3)
                    .desired_width(f32::INFINITY),
            );

            if let Some(error) = &draft.error {
                ui.colored_label(ui.visuals().error_fg_color, error);
            }

            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let can_save = !draft.title.trim().is_empty();
                if ui
                    .add_enabled(can_save, egui::Button::new("💾 Save marker"))
                    .clicked()
                {
                    action = Some(FormAction::Save);
                }
                if ui.button("Cancel").clicked() {
                    action = Some(FormAction::Cancel);
                }
            });

            if ui.input(|i| i.key_pressed(egui::Key::Escape)) {
                action = Some(FormAction::Cancel);
            }
        });

    match action {
        Some(FormAction::Save) => {
            // A rejected draft keeps the form open with the message filled in
            if let Err(e) = controller.confirm_pending() {
                tracing::debug!("New marker rejected: {e}");
            }
        }
        Some(FormAction::Cancel) => controller.cancel_pending(),
        None => {}
    }
}

/// Itinerary and saved places; responsive like a drawer
pub fn render_sidebar(ctx: &egui::Context, controller: &mut Controller, open: bool) {
    if !open {
        return;
    }

    let screen_size = ctx.viewport_rect().size();
    if screen_size.y > screen_size.x {
        egui::TopBottomPanel::bottom("itinerary_sidebar")
            .default_height(260.0)
            .min_height(160.0)
            .max_height(screen_size.y * 0.6)
            .resizable(true)
            .show(ctx, |ui| sidebar_content(ui, controller));
    } else {
        egui::SidePanel::left("itinerary_sidebar")
            .default_width(300.0)
            .min_width(240.0)
            .max_width(420.0)
            .resizable(true)
            .show(ctx, |ui| sidebar_content(ui, controller));
    }
}

fn sidebar_content(ui: &mut Ui, controller: &mut Controller) {
    let mut focus = None;
    let mut delete = None;

    egui::ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui| {
            ui.heading("🧭 Itinerary");
            ui.add_space(4.0);

            if controller.activities().is_empty() {
                ui.label(RichText::new("No itinerary loaded").weak());
            }
            for activity in controller.activities() {
                let response = ui
                    .group(|ui| {
                        ui.set_width(ui.available_width());
                        if let Some(time) = activity.time_label() {
                            ui.label(RichText::new(time).small().weak());
                        }
                        ui.label(RichText::new(&activity.title).strong());
                        ui.label(RichText::new(format!("📍 {}", activity.location_name)).small());
                        if !activity.description.is_empty() {
                            ui.label(RichText::new(&activity.description).small().weak());
                        }
                    })
                    .response
                    .interact(egui::Sense::click())
                    .on_hover_cursor(egui::CursorIcon::PointingHand);
                if response.clicked() {
                    focus = Some(activity.coords);
                }
            }

            ui.add_space(8.0);
            ui.separator();
            ui.heading(format!("📌 Saved places ({})", controller.pois().len()));
            ui.add_space(4.0);

            if controller.pois().is_empty() {
                ui.label(RichText::new("Use ➕ to save places on the map").weak());
            }
            for poi in controller.pois().list() {
                ui.horizontal(|ui| {
                    if ui.link(&poi.title).clicked() {
                        focus = Some(poi.coordinate);
                    }
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("🗑").on_hover_text("Delete marker").clicked() {
                            delete = Some(poi.id.clone());
                        }
                    });
                });
                if let Some(description) = &poi.description {
                    ui.label(RichText::new(description).small().weak());
                }
            }

            if let Some(track) = controller.track() {
                ui.add_space(8.0);
                ui.separator();
                ui.label(RichText::new(format!("🚆 {}", track.label())).small());
            }
        });

    if let Some(target) = focus {
        controller.focus(target);
    }
    if let Some(id) = delete {
        controller.delete_poi(&id);
    }
}

/// Tile attribution, bottom-center over the map
pub fn attribution(ui: &Ui, text: &str) {
    let screen_rect = ui.max_rect();
    ui.painter().text(
        screen_rect.center_bottom() + egui::vec2(0.0, -5.0),
        egui::Align2::CENTER_BOTTOM,
        text,
        egui::FontId::proportional(10.0),
        Color32::from_black_alpha(180),
    );
}
