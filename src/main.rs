//! Desktop front end: widgets, pointer handling and painting of chart scenes.

use eframe::{App, Frame, NativeOptions, egui};
use egui::{Align2, Color32, FontId, Pos2, Sense, vec2};
use rfd::FileDialog;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use workout_log_charts::config::{DataSource, Settings};
use workout_log_charts::export::{save_series_csv, save_series_json};
use workout_log_charts::loader::current_year;
use workout_log_charts::render::{ChartLayout, tooltip_text};
use workout_log_charts::report::export_html_report;
use workout_log_charts::scene::{Anchor, Point, Rgba, Scene, Shape};
use workout_log_charts::{ChartSession, ExerciseKey, catalog};

/// Years offered in the year picker, counting back from the current one.
const YEARS_BACK: i32 = 5;

fn to_color(c: Rgba) -> Color32 {
    Color32::from_rgba_unmultiplied(c.r, c.g, c.b, c.a)
}

fn to_pos(origin: Pos2, p: Point) -> Pos2 {
    origin + vec2(p.x, p.y)
}

fn to_stroke(s: workout_log_charts::scene::Stroke) -> egui::Stroke {
    egui::Stroke::new(s.width, to_color(s.color))
}

fn align_for(anchor: Anchor) -> Align2 {
    match anchor {
        Anchor::Start => Align2::LEFT_CENTER,
        Anchor::Middle => Align2::CENTER_CENTER,
        Anchor::End => Align2::RIGHT_CENTER,
    }
}

/// Paint a scene with its top-left corner at `origin`.
fn paint_scene(painter: &egui::Painter, origin: Pos2, scene: &Scene) {
    let bounds = egui::Rect::from_min_size(origin, vec2(scene.width, scene.height));
    painter.rect_filled(bounds, 0.0, to_color(scene.background));
    for layer in &scene.layers {
        let painter = match layer.clip {
            Some(clip) => painter.with_clip_rect(
                egui::Rect::from_min_max(to_pos(origin, clip.min), to_pos(origin, clip.max))
                    .intersect(painter.clip_rect()),
            ),
            None => painter.clone(),
        };
        for shape in &layer.shapes {
            match shape {
                Shape::Line { from, to, stroke } => {
                    painter.line_segment([to_pos(origin, *from), to_pos(origin, *to)], to_stroke(*stroke));
                }
                Shape::Polyline { points, stroke } => {
                    let points = points.iter().map(|p| to_pos(origin, *p)).collect();
                    painter.add(egui::Shape::line(points, to_stroke(*stroke)));
                }
                Shape::Polygon { points, fill } => {
                    let points = points.iter().map(|p| to_pos(origin, *p)).collect();
                    painter.add(egui::Shape::convex_polygon(
                        points,
                        to_color(*fill),
                        egui::Stroke::NONE,
                    ));
                }
                Shape::Circle {
                    center,
                    radius,
                    fill,
                    stroke,
                } => {
                    painter.circle(
                        to_pos(origin, *center),
                        *radius,
                        to_color(*fill),
                        stroke.map(to_stroke).unwrap_or(egui::Stroke::NONE),
                    );
                }
                Shape::Rect { rect, fill, stroke } => {
                    painter.rect(
                        egui::Rect::from_min_max(to_pos(origin, rect.min), to_pos(origin, rect.max)),
                        0.0,
                        to_color(*fill),
                        stroke.map(to_stroke).unwrap_or(egui::Stroke::NONE),
                    );
                }
                Shape::Text {
                    pos,
                    text,
                    size,
                    color,
                    anchor,
                } => {
                    painter.text(
                        to_pos(origin, *pos),
                        align_for(*anchor),
                        text,
                        FontId::proportional(*size),
                        to_color(*color),
                    );
                }
            }
        }
    }
}

struct ChartApp {
    settings: Settings,
    session: ChartSession,
    year: i32,
    selected: BTreeSet<ExerciseKey>,
    search_query: String,
    last_layout: Option<ChartLayout>,
}

impl Default for ChartApp {
    fn default() -> Self {
        let settings = Settings::load();
        let year = current_year();
        let mut session = ChartSession::from_settings(&settings, year);
        session.request_catalog();
        Self {
            settings,
            session,
            year,
            selected: BTreeSet::new(),
            search_query: String::new(),
            last_layout: None,
        }
    }
}

impl ChartApp {
    fn rebuild_session(&mut self) {
        self.session = ChartSession::from_settings(&self.settings, self.year);
        self.selected.clear();
        self.session.request_catalog();
    }

    fn request_selected(&mut self) {
        self.session
            .request_series(self.selected.iter().cloned().collect());
    }

    fn export_series(&self) {
        let Some(path) = FileDialog::new()
            .add_filter("CSV", &["csv"])
            .add_filter("JSON", &["json"])
            .save_file()
        else {
            return;
        };
        let result = match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase())
        {
            Some(ext) if ext == "json" => save_series_json(&path, self.session.series()),
            _ => save_series_csv(&path, self.session.series()),
        };
        if let Err(e) = result {
            log::error!("Failed to export series: {e}");
        }
    }

    fn export_report(&self) {
        let Some(path) = FileDialog::new().add_filter("HTML", &["html"]).save_file() else {
            return;
        };
        let layout = match self.last_layout {
            Some(layout) => Ok(layout),
            None => ChartLayout::new(self.settings.plot_width, self.settings.plot_height),
        };
        let result = layout.and_then(|layout| {
            export_html_report(
                &path,
                &format!("Workouts {}", self.year),
                self.session.series(),
                &self.session.scene(&layout),
            )
        });
        if let Err(e) = result {
            log::error!("Failed to export report: {e}");
        }
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open Folder...").clicked() {
                        if let Some(dir) = FileDialog::new().pick_folder() {
                            self.settings.data_source = DataSource::Directory(dir);
                            self.settings.save();
                            self.rebuild_session();
                        }
                        ui.close_menu();
                    }
                    if ui.button("Reload").clicked() {
                        self.session.reload();
                        self.session.request_catalog();
                        self.request_selected();
                        ui.close_menu();
                    }
                    if ui.button("Export Series").clicked() {
                        self.export_series();
                        ui.close_menu();
                    }
                    if ui.button("Export Report").clicked() {
                        self.export_report();
                        ui.close_menu();
                    }
                });
            });
        });
    }

    fn control_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("control_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let mut year = self.year;
                egui::ComboBox::from_id_source("year_combo")
                    .selected_text(year.to_string())
                    .show_ui(ui, |ui| {
                        let newest = current_year();
                        for y in (newest - YEARS_BACK..=newest).rev() {
                            ui.selectable_value(&mut year, y, y.to_string());
                        }
                    });
                if year != self.year {
                    self.year = year;
                    self.selected.clear();
                    self.session.set_year(year);
                    self.session.request_catalog();
                }
                ui.separator();
                ui.label(self.session.source_description());
                if self.session.is_loading() {
                    ui.spinner();
                }
            });
        });
    }

    fn exercise_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("exercise_panel").show(ctx, |ui| {
            ui.heading("Exercises");
            ui.add(egui::TextEdit::singleline(&mut self.search_query).hint_text("Search"));
            let Some(keys) = self.session.catalog() else {
                ui.spinner();
                return;
            };
            if keys.is_empty() {
                ui.label(format!(
                    "No exercise was trained on at least {} days in {}.",
                    self.settings.min_occurrences, self.year
                ));
                return;
            }
            let mut changed = false;
            egui::ScrollArea::vertical().show(ui, |ui| {
                for key in catalog::search(keys, &self.search_query) {
                    let mut checked = self.selected.contains(key);
                    if ui.checkbox(&mut checked, key.to_string()).changed() {
                        if checked {
                            self.selected.insert(key.clone());
                        } else {
                            self.selected.remove(key);
                        }
                        changed = true;
                    }
                }
            });
            if changed {
                self.request_selected();
            }
        });
    }

    fn chart(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let size = ui.available_size();
            let layout = match ChartLayout::new(size.x, size.y) {
                Ok(layout) => layout,
                Err(e) => {
                    log::error!("{e}");
                    ui.colored_label(Color32::RED, e.to_string());
                    return;
                }
            };
            self.last_layout = Some(layout);
            let (response, painter) = ui.allocate_painter(size, Sense::click_and_drag());
            let origin = response.rect.min;
            let local = |p: Pos2| Point::new(p.x - origin.x, p.y - origin.y);
            self.session.set_plot_width(layout.plot_rect().width() as f64);

            if let Some(ctl) = self.session.viewport_mut() {
                if response.drag_started() {
                    if let Some(axis) = response
                        .interact_pointer_pos()
                        .and_then(|p| layout.hit_test(local(p)))
                    {
                        ctl.pointer_down(axis);
                    }
                }
                if response.dragged() && ctl.is_dragging() {
                    let delta = response.drag_delta();
                    ctl.pointer_move(delta.x as f64, delta.y as f64);
                }
                if ctl.is_dragging() && ui.input(|i| i.pointer.any_released()) {
                    ctl.pointer_up(Instant::now());
                }
                if response.double_clicked() {
                    ctl.reset();
                }
            }

            let scene = self.session.scene(&layout);
            paint_scene(&painter, origin, &scene);

            if let Some(pos) = response.hover_pos() {
                if let Some((key, day)) = self.session.hover(&layout, local(pos)) {
                    let text = tooltip_text(key, day);
                    egui::show_tooltip_at_pointer(ctx, egui::Id::new("chart_tip"), |ui| {
                        ui.label(text);
                    });
                }
            }
        });
    }
}

impl App for ChartApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        self.session.poll();
        if self.session.tick(Instant::now()) {
            ctx.request_repaint();
        }
        if self.session.is_loading() {
            ctx.request_repaint_after(Duration::from_millis(100));
        }

        self.menu_bar(ctx);
        self.control_bar(ctx);
        self.exercise_panel(ctx);
        self.chart(ctx);
    }
}

fn main() -> eframe::Result<()> {
    env_logger::init();
    let options = NativeOptions::default();
    eframe::run_native(
        "Workout Log Charts",
        options,
        Box::new(|_cc| Box::new(ChartApp::default())),
    )
}
