use maud::{DOCTYPE, Markup, html};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{ChartError, Result};
use crate::key::ExerciseKey;
use crate::render::format_number;
use crate::scene::{Anchor, Point, Scene, Shape};
use crate::series::Series;

trait FormatOption {
    fn fmt_opt(self, unit: &str) -> String;
}

impl FormatOption for Option<f64> {
    fn fmt_opt(self, unit: &str) -> String {
        self.map(|v| format!("{} {unit}", format_number(v)))
            .unwrap_or_else(|| "-".into())
    }
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{:.1},{:.1}", p.x, p.y))
        .collect::<Vec<_>>()
        .join(" ")
}

fn anchor_attr(anchor: Anchor) -> &'static str {
    match anchor {
        Anchor::Start => "start",
        Anchor::Middle => "middle",
        Anchor::End => "end",
    }
}

fn shape_svg(shape: &Shape) -> Markup {
    // Every element gets an explicit end tag so the SVG stays valid when
    // embedded in HTML.
    match shape {
        Shape::Line { from, to, stroke } => html! {
            line x1=(from.x) y1=(from.y) x2=(to.x) y2=(to.y)
                stroke=(stroke.color.hex()) stroke-opacity=(stroke.color.opacity())
                stroke-width=(stroke.width) {}
        },
        Shape::Polyline { points, stroke } => html! {
            polyline points=(points_attr(points)) fill="none"
                stroke=(stroke.color.hex()) stroke-opacity=(stroke.color.opacity())
                stroke-width=(stroke.width) stroke-linejoin="round" {}
        },
        Shape::Polygon { points, fill } => html! {
            polygon points=(points_attr(points)) fill=(fill.hex())
                fill-opacity=(fill.opacity()) {}
        },
        Shape::Circle {
            center,
            radius,
            fill,
            stroke,
        } => html! {
            circle cx=(center.x) cy=(center.y) r=(radius)
                fill=(fill.hex()) fill-opacity=(fill.opacity())
                stroke=(stroke.map(|s| s.color.hex()).unwrap_or_else(|| "none".into()))
                stroke-width=(stroke.map(|s| s.width).unwrap_or(0.0)) {}
        },
        Shape::Rect { rect, fill, stroke } => html! {
            rect x=(rect.min.x) y=(rect.min.y) width=(rect.width()) height=(rect.height())
                fill=(fill.hex()) fill-opacity=(fill.opacity())
                stroke=(stroke.map(|s| s.color.hex()).unwrap_or_else(|| "none".into()))
                stroke-width=(stroke.map(|s| s.width).unwrap_or(0.0)) {}
        },
        Shape::Text {
            pos,
            text,
            size,
            color,
            anchor,
        } => html! {
            text x=(pos.x) y=(pos.y) font-size=(size) font-family="sans-serif"
                fill=(color.hex()) text-anchor=(anchor_attr(*anchor))
                dominant-baseline="middle" { (text) }
        },
    }
}

/// Paint a scene as a standalone `<svg>` element.
pub fn scene_to_svg(scene: &Scene) -> Markup {
    html! {
        svg xmlns="http://www.w3.org/2000/svg" width=(scene.width) height=(scene.height)
            viewBox=(format!("0 0 {} {}", scene.width, scene.height)) {
            defs {
                @for (i, layer) in scene.layers.iter().enumerate() {
                    @if let Some(clip) = layer.clip {
                        clipPath id=(format!("clip-{i}")) {
                            rect x=(clip.min.x) y=(clip.min.y)
                                width=(clip.width()) height=(clip.height()) {}
                        }
                    }
                }
            }
            rect width="100%" height="100%" fill=(scene.background.hex()) {}
            @for (i, layer) in scene.layers.iter().enumerate() {
                @if layer.clip.is_some() {
                    g class=(layer.name) clip-path=(format!("url(#clip-{i})")) {
                        @for shape in &layer.shapes { (shape_svg(shape)) }
                    }
                } @else {
                    g class=(layer.name) {
                        @for shape in &layer.shapes { (shape_svg(shape)) }
                    }
                }
            }
        }
    }
}

fn build_html(title: &str, series: &BTreeMap<ExerciseKey, Series>, scene: &Scene) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head { meta charset="utf-8"; title { (title) } }
            body {
                h1 { (title) }
                (scene_to_svg(scene))
                h2 { "Summary" }
                @if series.is_empty() {
                    p { "No exercises selected" }
                } @else {
                    table border="1" {
                        tr {
                            th { "Exercise" }
                            th { "Muscle Group" }
                            th { "Days" }
                            th { "Best" }
                            th { "Latest Average" }
                        }
                        @for (key, s) in series {
                            tr {
                                td { (key.to_string()) }
                                td { (s.muscle_group) }
                                td { (s.len()) }
                                td { (s.value_range().map(|(_, hi)| hi).fmt_opt(s.unit())) }
                                td { (s.days.last().map(|d| d.avg_value).fmt_opt(s.unit())) }
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Write an HTML page with the chart as inline SVG and a per-series summary.
pub fn export_html_report<P: AsRef<Path>>(
    path: P,
    title: &str,
    series: &BTreeMap<ExerciseKey, Series>,
    scene: &Scene,
) -> Result<()> {
    let path = path.as_ref();
    let markup = build_html(title, series, scene);
    std::fs::write(path, markup.into_string()).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::info!("Wrote report to {}", path.display());
    Ok(())
}
