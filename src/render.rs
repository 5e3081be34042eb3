//! Pure rendering of series and a viewport into a [`Scene`].

use chrono::{Datelike, Months, NaiveDate};
use phf::phf_map;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ChartError, Result};
use crate::key::ExerciseKey;
use crate::scene::{Anchor, Layer, Point, Rect, Rgba, Scene, Shape, Stroke};
use crate::series::{DayAggregate, Series, date_from_day_number, day_number};
use crate::viewport::{DragAxis, Viewport};

pub const DEFAULT_WIDTH: f32 = 900.0;
pub const DEFAULT_HEIGHT: f32 = 480.0;

const MARGIN_LEFT: f32 = 64.0;
const MARGIN_RIGHT: f32 = 16.0;
const MARGIN_TOP: f32 = 16.0;
const MARGIN_BOTTOM: f32 = 32.0;

/// Minimum horizontal distance between two date ticks.
const MIN_X_TICK_SPACING: f32 = 70.0;
const X_TICK_STEPS: [i64; 8] = [1, 2, 3, 7, 14, 30, 61, 91];
const Y_TICK_TARGET: usize = 6;
const SMOOTH_STEPS: usize = 8;
const MARKER_RADIUS: f32 = 4.0;
/// Pointer distance within which a point counts as hovered.
pub const HOVER_RADIUS: f32 = 12.0;

pub const LAYER_GRID: &str = "grid";
pub const LAYER_AXES: &str = "axes";
pub const LAYER_SERIES: &str = "series";
pub const LAYER_LEGEND: &str = "legend";
pub const LAYER_PLACEHOLDER: &str = "placeholder";
pub const PLACEHOLDER_TEXT: &str = "No data";

/// Base colors per muscle group, keyed in lowercase.
static MUSCLE_GROUP_COLORS: phf::Map<&'static str, Rgba> = phf_map! {
    "chest" => Rgba::rgb(231, 76, 60),
    "back" => Rgba::rgb(52, 152, 219),
    "legs" => Rgba::rgb(46, 204, 113),
    "quads" => Rgba::rgb(39, 174, 96),
    "hamstrings" => Rgba::rgb(22, 160, 133),
    "glutes" => Rgba::rgb(26, 188, 156),
    "calves" => Rgba::rgb(142, 202, 80),
    "shoulders" => Rgba::rgb(241, 196, 15),
    "biceps" => Rgba::rgb(155, 89, 182),
    "triceps" => Rgba::rgb(142, 68, 173),
    "arms" => Rgba::rgb(175, 122, 197),
    "core" => Rgba::rgb(230, 126, 34),
    "abs" => Rgba::rgb(211, 84, 0),
    "forearms" => Rgba::rgb(189, 195, 199),
};

/// Used when a group has no color or its color is already taken.
const FALLBACK_PALETTE: [Rgba; 8] = [
    Rgba::rgb(31, 119, 180),
    Rgba::rgb(255, 127, 14),
    Rgba::rgb(44, 160, 44),
    Rgba::rgb(214, 39, 40),
    Rgba::rgb(148, 103, 189),
    Rgba::rgb(140, 86, 75),
    Rgba::rgb(227, 119, 194),
    Rgba::rgb(188, 189, 34),
];

pub fn muscle_group_color(group: &str) -> Option<Rgba> {
    MUSCLE_GROUP_COLORS.get(group.trim().to_lowercase().as_str()).copied()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Theme {
    pub background: Rgba,
    pub plot_background: Rgba,
    pub grid: Rgba,
    pub axis: Rgba,
    pub text: Rgba,
    pub font_size: f32,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgba::rgb(27, 27, 27),
            plot_background: Rgba::rgb(18, 18, 18),
            grid: Rgba::rgb(60, 60, 60),
            axis: Rgba::rgb(140, 140, 140),
            text: Rgba::rgb(210, 210, 210),
            font_size: 12.0,
        }
    }
}

/// Size of the drawing surface and the plot area inside it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartLayout {
    width: f32,
    height: f32,
    plot: Rect,
}

impl ChartLayout {
    /// Fails when there is no usable surface to draw on.
    pub fn new(width: f32, height: f32) -> Result<Self> {
        let min_width = MARGIN_LEFT + MARGIN_RIGHT;
        let min_height = MARGIN_TOP + MARGIN_BOTTOM;
        if !width.is_finite() || !height.is_finite() || width <= min_width || height <= min_height
        {
            return Err(ChartError::MissingSurface(format!(
                "surface of {width}x{height} px leaves no plot area"
            )));
        }
        let plot = Rect::from_min_size(
            Point::new(MARGIN_LEFT, MARGIN_TOP),
            width - min_width,
            height - min_height,
        );
        Ok(Self {
            width,
            height,
            plot,
        })
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn plot_rect(&self) -> Rect {
        self.plot
    }

    /// Which gesture a press at `pos` starts: the y-axis gutter zooms, the
    /// plot and the date axis below it pan.
    pub fn hit_test(&self, pos: Point) -> Option<DragAxis> {
        let p = self.plot;
        let in_rows = pos.y >= p.min.y && pos.y <= p.max.y;
        let in_columns = pos.x >= p.min.x && pos.x <= p.max.x;
        if pos.x >= 0.0 && pos.x < p.min.x && in_rows {
            Some(DragAxis::Y)
        } else if in_columns && pos.y >= p.min.y && pos.y <= self.height {
            Some(DragAxis::X)
        } else {
            None
        }
    }

    pub fn scales(&self, viewport: &Viewport) -> Scales {
        Scales {
            plot: self.plot,
            x: viewport.x_domain,
            y: viewport.y_domain,
        }
    }
}

/// Maps domain values to pixels for one viewport.
#[derive(Debug, Clone, Copy)]
pub struct Scales {
    plot: Rect,
    x: [f64; 2],
    y: [f64; 2],
}

impl Scales {
    pub fn x(&self, day: f64) -> f32 {
        let t = (day - self.x[0]) / span(self.x);
        self.plot.min.x + (t * self.plot.width() as f64) as f32
    }

    pub fn y(&self, value: f64) -> f32 {
        let t = (value - self.y[0]) / span(self.y);
        self.plot.max.y - (t * self.plot.height() as f64) as f32
    }

    pub fn invert_x(&self, px: f32) -> f64 {
        self.x[0] + ((px - self.plot.min.x) / self.plot.width()) as f64 * span(self.x)
    }

    pub fn point(&self, day: f64, value: f64) -> Point {
        Point::new(self.x(day), self.y(value))
    }
}

fn span(domain: [f64; 2]) -> f64 {
    let s = domain[1] - domain[0];
    if s.abs() < f64::EPSILON { 1.0 } else { s }
}

/// How y values are labelled, from the units of the displayed series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitMode {
    Reps,
    Kilograms,
    Mixed,
}

impl UnitMode {
    pub fn of<'s>(series: impl IntoIterator<Item = &'s Series>) -> Self {
        let units: BTreeSet<bool> = series
            .into_iter()
            .filter(|s| !s.is_empty())
            .map(|s| s.is_bodyweight)
            .collect();
        match (units.contains(&true), units.contains(&false)) {
            (true, false) => UnitMode::Reps,
            (false, true) => UnitMode::Kilograms,
            _ => UnitMode::Mixed,
        }
    }

    pub fn label(&self, value: f64) -> String {
        let n = format_number(value);
        match self {
            UnitMode::Reps => format!("{n} reps"),
            UnitMode::Kilograms => format!("{n}kg"),
            UnitMode::Mixed => n,
        }
    }
}

/// Integers without decimals, everything else with up to two.
pub fn format_number(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        let s = format!("{value:.2}");
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

pub fn format_day(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Round tick values covering `[lo, hi]` with steps of 1, 2 or 5 × 10ⁿ.
pub fn nice_ticks(lo: f64, hi: f64, target: usize) -> Vec<f64> {
    if !lo.is_finite() || !hi.is_finite() || hi <= lo || target == 0 {
        return Vec::new();
    }
    let raw = (hi - lo) / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let mut ticks = Vec::new();
    let mut v = (lo / step).ceil() * step;
    while v <= hi + step * 1e-9 {
        // Avoid "-0" and accumulated float noise.
        let snapped = (v / step).round() * step;
        ticks.push(if snapped == 0.0 { 0.0 } else { snapped });
        v += step;
    }
    ticks
}

/// Date ticks (as day numbers) at least [`MIN_X_TICK_SPACING`] px apart.
///
/// Steps of a month or more fall on the first of the month.
pub fn date_ticks(x_domain: [f64; 2], plot_width: f32) -> Vec<f64> {
    let [x0, x1] = x_domain;
    if !x0.is_finite() || !x1.is_finite() || x1 <= x0 || plot_width <= 0.0 {
        return Vec::new();
    }
    let px_per_day = plot_width as f64 / (x1 - x0);
    let step = X_TICK_STEPS
        .into_iter()
        .find(|s| *s as f64 * px_per_day >= MIN_X_TICK_SPACING as f64)
        .unwrap_or(X_TICK_STEPS[X_TICK_STEPS.len() - 1]);

    let (Some(start), Some(end)) = (date_from_day_number(x0.ceil()), date_from_day_number(x1))
    else {
        return Vec::new();
    };
    let mut ticks = Vec::new();
    if step >= 30 {
        let months = (step as f64 / 30.0).round() as u32;
        let Some(mut d) = NaiveDate::from_ymd_opt(start.year(), start.month(), 1) else {
            return ticks;
        };
        if d < start {
            d = d.checked_add_months(Months::new(1)).unwrap_or(end);
        }
        while d <= end {
            ticks.push(day_number(d));
            match d.checked_add_months(Months::new(months)) {
                Some(next) => d = next,
                None => break,
            }
        }
    } else {
        let first = (x0 / step as f64).ceil() as i64 * step;
        let mut day = first;
        while (day as f64) <= x1 {
            ticks.push(day as f64);
            day += step;
        }
    }
    ticks
}

/// Smooth curve through points with strictly increasing x.
///
/// Monotone cubic Hermite interpolation, so the curve never overshoots
/// between two neighbouring points.
pub fn monotone_curve(points: &[Point], steps: usize) -> Vec<Point> {
    let n = points.len();
    if n < 3 || steps < 2 {
        return points.to_vec();
    }
    let dx: Vec<f32> = points.windows(2).map(|w| w[1].x - w[0].x).collect();
    let slopes: Vec<f32> = points
        .windows(2)
        .zip(&dx)
        .map(|(w, d)| if *d == 0.0 { 0.0 } else { (w[1].y - w[0].y) / d })
        .collect();

    let mut tangents = vec![0.0f32; n];
    tangents[0] = slopes[0];
    tangents[n - 1] = slopes[n - 2];
    for i in 1..n - 1 {
        tangents[i] = if slopes[i - 1] * slopes[i] <= 0.0 {
            0.0
        } else {
            (slopes[i - 1] + slopes[i]) / 2.0
        };
    }
    for i in 0..n - 1 {
        if slopes[i] == 0.0 {
            tangents[i] = 0.0;
            tangents[i + 1] = 0.0;
            continue;
        }
        let a = tangents[i] / slopes[i];
        let b = tangents[i + 1] / slopes[i];
        let s = a * a + b * b;
        if s > 9.0 {
            let tau = 3.0 / s.sqrt();
            tangents[i] = tau * a * slopes[i];
            tangents[i + 1] = tau * b * slopes[i];
        }
    }

    let mut out = Vec::with_capacity((n - 1) * steps + 1);
    for i in 0..n - 1 {
        let (p0, p1, h) = (points[i], points[i + 1], dx[i]);
        for s in 0..steps {
            let t = s as f32 / steps as f32;
            let (t2, t3) = (t * t, t * t * t);
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            out.push(Point::new(
                p0.x + t * h,
                h00 * p0.y + h10 * h * tangents[i] + h01 * p1.y + h11 * h * tangents[i + 1],
            ));
        }
    }
    out.push(points[n - 1]);
    out
}

/// Colors for every series, by muscle group where still free.
pub fn series_colors(series: &BTreeMap<ExerciseKey, Series>) -> BTreeMap<ExerciseKey, Rgba> {
    let mut used: Vec<Rgba> = Vec::new();
    let mut colors = BTreeMap::new();
    for (i, (key, s)) in series.iter().enumerate() {
        let color = match muscle_group_color(&s.muscle_group) {
            Some(c) if !used.contains(&c) => c,
            _ => FALLBACK_PALETTE
                .iter()
                .copied()
                .find(|c| !used.contains(c))
                .unwrap_or(FALLBACK_PALETTE[i % FALLBACK_PALETTE.len()]),
        };
        used.push(color);
        colors.insert(key.clone(), color);
    }
    colors
}

#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    pub theme: Theme,
}

impl ChartRenderer {
    pub fn new(theme: Theme) -> Self {
        Self { theme }
    }

    /// Scene for `series` seen through `viewport`.
    ///
    /// Deterministic: the same input always produces the same scene.
    pub fn render(
        &self,
        series: &BTreeMap<ExerciseKey, Series>,
        viewport: &Viewport,
        layout: &ChartLayout,
    ) -> Scene {
        let mut scene = Scene::new(layout.width(), layout.height(), self.theme.background);
        let shown: Vec<&Series> = series.values().filter(|s| !s.is_empty()).collect();
        if shown.is_empty() {
            scene.layers.push(self.placeholder(layout));
            return scene;
        }

        let scales = layout.scales(viewport);
        let mode = UnitMode::of(shown.iter().copied());
        let colors = series_colors(series);

        scene.layers.push(self.grid(layout, viewport, &scales));
        scene.layers.push(self.axes(layout, viewport, &scales, mode));

        let mut plot = Layer::clipped(LAYER_SERIES, layout.plot_rect());
        for s in &shown {
            let color = colors
                .get(&s.key)
                .copied()
                .unwrap_or(FALLBACK_PALETTE[0]);
            self.draw_series(&mut plot, s, &scales, color);
        }
        scene.layers.push(plot);

        if shown.len() >= 2 {
            scene.layers.push(self.legend(layout, &shown, &colors, mode));
        }
        scene
    }

    fn placeholder(&self, layout: &ChartLayout) -> Layer {
        let mut layer = Layer::new(LAYER_PLACEHOLDER);
        let plot = layout.plot_rect();
        layer.push(Shape::Rect {
            rect: plot,
            fill: self.theme.plot_background,
            stroke: Some(Stroke::new(1.0, self.theme.grid)),
        });
        layer.push(Shape::Text {
            pos: plot.center(),
            text: PLACEHOLDER_TEXT.to_string(),
            size: self.theme.font_size * 1.5,
            color: self.theme.text,
            anchor: Anchor::Middle,
        });
        layer
    }

    fn grid(&self, layout: &ChartLayout, viewport: &Viewport, scales: &Scales) -> Layer {
        let plot = layout.plot_rect();
        let mut layer = Layer::new(LAYER_GRID);
        layer.push(Shape::Rect {
            rect: plot,
            fill: self.theme.plot_background,
            stroke: None,
        });
        let stroke = Stroke::new(1.0, self.theme.grid);
        for v in nice_ticks(viewport.y_domain[0], viewport.y_domain[1], Y_TICK_TARGET) {
            let y = scales.y(v);
            layer.push(Shape::Line {
                from: Point::new(plot.min.x, y),
                to: Point::new(plot.max.x, y),
                stroke,
            });
        }
        for d in date_ticks(viewport.x_domain, plot.width()) {
            let x = scales.x(d);
            layer.push(Shape::Line {
                from: Point::new(x, plot.min.y),
                to: Point::new(x, plot.max.y),
                stroke,
            });
        }
        layer
    }

    fn axes(
        &self,
        layout: &ChartLayout,
        viewport: &Viewport,
        scales: &Scales,
        mode: UnitMode,
    ) -> Layer {
        let plot = layout.plot_rect();
        let mut layer = Layer::new(LAYER_AXES);
        let stroke = Stroke::new(1.0, self.theme.axis);
        layer.push(Shape::Line {
            from: Point::new(plot.min.x, plot.min.y),
            to: Point::new(plot.min.x, plot.max.y),
            stroke,
        });
        layer.push(Shape::Line {
            from: Point::new(plot.min.x, plot.max.y),
            to: Point::new(plot.max.x, plot.max.y),
            stroke,
        });

        for v in nice_ticks(viewport.y_domain[0], viewport.y_domain[1], Y_TICK_TARGET) {
            let y = scales.y(v);
            layer.push(Shape::Line {
                from: Point::new(plot.min.x - 4.0, y),
                to: Point::new(plot.min.x, y),
                stroke,
            });
            layer.push(Shape::Text {
                pos: Point::new(plot.min.x - 6.0, y),
                text: mode.label(v),
                size: self.theme.font_size,
                color: self.theme.text,
                anchor: Anchor::End,
            });
        }
        for d in date_ticks(viewport.x_domain, plot.width()) {
            let Some(date) = date_from_day_number(d) else {
                continue;
            };
            let x = scales.x(d);
            layer.push(Shape::Line {
                from: Point::new(x, plot.max.y),
                to: Point::new(x, plot.max.y + 4.0),
                stroke,
            });
            layer.push(Shape::Text {
                pos: Point::new(x, plot.max.y + 14.0),
                text: format_day(date),
                size: self.theme.font_size,
                color: self.theme.text,
                anchor: Anchor::Middle,
            });
        }
        layer
    }

    fn draw_series(&self, layer: &mut Layer, series: &Series, scales: &Scales, color: Rgba) {
        let band = color.with_alpha(56);
        let tops: Vec<Point> = series
            .days
            .iter()
            .map(|d| scales.point(d.day_number(), d.max_value))
            .collect();
        let bottoms: Vec<Point> = series
            .days
            .iter()
            .map(|d| scales.point(d.day_number(), d.min_value))
            .collect();

        for i in 1..tops.len() {
            layer.push(Shape::Polygon {
                points: vec![tops[i - 1], tops[i], bottoms[i], bottoms[i - 1]],
                fill: band,
            });
        }
        for (top, bottom) in tops.iter().zip(&bottoms) {
            layer.push(Shape::Line {
                from: *top,
                to: *bottom,
                stroke: Stroke::new(2.0, color.with_alpha(140)),
            });
        }

        let averages: Vec<Point> = series
            .days
            .iter()
            .map(|d| scales.point(d.day_number(), d.avg_value))
            .collect();
        if averages.len() >= 2 {
            layer.push(Shape::Polyline {
                points: monotone_curve(&averages, SMOOTH_STEPS),
                stroke: Stroke::new(2.0, color),
            });
        }
        for p in averages {
            layer.push(Shape::Circle {
                center: p,
                radius: MARKER_RADIUS,
                fill: color,
                stroke: Some(Stroke::new(1.0, self.theme.plot_background)),
            });
        }
    }

    fn legend(
        &self,
        layout: &ChartLayout,
        shown: &[&Series],
        colors: &BTreeMap<ExerciseKey, Rgba>,
        mode: UnitMode,
    ) -> Layer {
        let plot = layout.plot_rect();
        let size = self.theme.font_size;
        let row = size + 6.0;
        let labels: Vec<String> = shown
            .iter()
            .map(|s| match mode {
                UnitMode::Mixed => format!("{} [{}]", s.key, s.unit()),
                _ => s.key.to_string(),
            })
            .collect();
        let longest = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        let width = 28.0 + longest as f32 * size * 0.6;
        let origin = Point::new(plot.min.x + 8.0, plot.min.y + 8.0);

        let mut layer = Layer::new(LAYER_LEGEND);
        layer.push(Shape::Rect {
            rect: Rect::from_min_size(origin, width, row * labels.len() as f32 + 6.0),
            fill: self.theme.background.with_alpha(220),
            stroke: Some(Stroke::new(1.0, self.theme.grid)),
        });
        for (i, (s, label)) in shown.iter().zip(labels).enumerate() {
            let y = origin.y + 3.0 + row * i as f32 + row / 2.0;
            layer.push(Shape::Rect {
                rect: Rect::from_min_size(Point::new(origin.x + 6.0, y - 5.0), 12.0, 10.0),
                fill: colors.get(&s.key).copied().unwrap_or(FALLBACK_PALETTE[0]),
                stroke: None,
            });
            layer.push(Shape::Text {
                pos: Point::new(origin.x + 24.0, y),
                text: label,
                size,
                color: self.theme.text,
                anchor: Anchor::Start,
            });
        }
        layer
    }
}

/// Average point closest to `pos` within [`HOVER_RADIUS`], inside the plot.
pub fn nearest_point<'s>(
    series: &'s BTreeMap<ExerciseKey, Series>,
    viewport: &Viewport,
    layout: &ChartLayout,
    pos: Point,
) -> Option<(&'s ExerciseKey, &'s DayAggregate)> {
    let plot = layout.plot_rect();
    if !plot.contains(pos) {
        return None;
    }
    let scales = layout.scales(viewport);
    series
        .iter()
        .flat_map(|(key, s)| s.days.iter().map(move |d| (key, d)))
        .map(|(key, d)| {
            let p = scales.point(d.day_number(), d.avg_value);
            (p.distance(pos), key, d)
        })
        .filter(|(dist, _, _)| *dist <= HOVER_RADIUS)
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, key, d)| (key, d))
}

/// Multi-line tooltip for one day of a series.
pub fn tooltip_text(key: &ExerciseKey, day: &DayAggregate) -> String {
    let unit = crate::series::unit_label(day.is_bodyweight);
    let value = |v: f64| {
        if day.is_bodyweight {
            format!("{} {unit}", format_number(v))
        } else {
            format!("{}{unit}", format_number(v))
        }
    };
    format!(
        "{key}\n{}\navg {}\nmin {} / max {}\n{} sets",
        day.date.format("%a %b %-d, %Y"),
        value(day.avg_value),
        value(day.min_value),
        value(day.max_value),
        day.sets.len()
    )
}
