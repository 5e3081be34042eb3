//! Visible ranges of the chart and the drag gestures that move them.
//!
//! The x axis is time in days (see [`crate::series::day_number`]), the y axis
//! is the series magnitude. Dragging the y axis zooms around the centre of
//! the visible range; dragging the plot pans through time with elastic
//! resistance past the data and springs back once the pointer is released.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::loader::year_start;
use crate::series::{Series, day_number};

pub const MIN_SPAN: f64 = 1.0;
pub const MAX_SPAN: f64 = 300.0;
pub const ZOOM_SENSITIVITY: f64 = 0.01;
pub const MAX_OVERSCROLL_DAYS: f64 = 3.0;
pub const SPRING_MARGIN_DAYS: f64 = 1.0;
pub const OVERSCROLL_RESISTANCE: f64 = 0.8;
pub const SPRING_BACK_MS: u64 = 400;
pub const DEFAULT_WINDOW_DAYS: f64 = 60.0;

const Y_PADDING_FRACTION: f64 = 0.1;
const EPSILON: f64 = 1e-9;

/// Tunable constraints of the view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportLimits {
    /// Smallest y span in magnitude units.
    pub min_span: f64,
    /// Largest y span in magnitude units.
    pub max_span: f64,
    /// Span change per dragged pixel on the y axis.
    pub zoom_sensitivity: f64,
    /// How far past the first/last data point a drag may reach, in days.
    pub max_overscroll_days: f64,
    /// Margin kept around the data after spring-back, in days.
    pub spring_margin_days: f64,
    /// Share of the drag absorbed at full overscroll.
    pub overscroll_resistance: f64,
    pub spring_back_ms: u64,
    /// Width of the initial time window, in days.
    pub default_window_days: f64,
}

impl Default for ViewportLimits {
    fn default() -> Self {
        Self {
            min_span: MIN_SPAN,
            max_span: MAX_SPAN,
            zoom_sensitivity: ZOOM_SENSITIVITY,
            max_overscroll_days: MAX_OVERSCROLL_DAYS,
            spring_margin_days: SPRING_MARGIN_DAYS,
            overscroll_resistance: OVERSCROLL_RESISTANCE,
            spring_back_ms: SPRING_BACK_MS,
            default_window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

impl ViewportLimits {
    pub fn spring_duration(&self) -> Duration {
        Duration::from_millis(self.spring_back_ms)
    }

    pub fn clamp_span(&self, span: f64) -> f64 {
        let lo = self.min_span.min(self.max_span);
        let hi = self.min_span.max(self.max_span);
        if span.is_nan() { lo } else { span.clamp(lo, hi) }
    }
}

/// Visible time (days) and magnitude ranges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x_domain: [f64; 2],
    pub y_domain: [f64; 2],
}

impl Viewport {
    pub fn new(x_domain: [f64; 2], y_domain: [f64; 2]) -> Self {
        Self { x_domain, y_domain }
    }

    pub fn x_span(&self) -> f64 {
        self.x_domain[1] - self.x_domain[0]
    }

    pub fn y_span(&self) -> f64 {
        self.y_domain[1] - self.y_domain[0]
    }

    pub fn y_center(&self) -> f64 {
        (self.y_domain[0] + self.y_domain[1]) / 2.0
    }
}

/// Where the displayed data lives, used for default ranges and clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataExtent {
    /// January 1 of the active year; the view never starts before it.
    pub year_start: f64,
    pub first: f64,
    pub last: f64,
    pub min_value: f64,
    pub max_value: f64,
}

impl DataExtent {
    /// Extent of all non-empty series, or `None` when there is nothing to show.
    pub fn from_series<'s>(year: i32, series: impl IntoIterator<Item = &'s Series>) -> Option<Self> {
        let mut extent: Option<Self> = None;
        for s in series {
            let (Some(first), Some(last), Some((lo, hi))) =
                (s.first_date(), s.last_date(), s.value_range())
            else {
                continue;
            };
            let (first, last) = (day_number(first), day_number(last));
            extent = Some(match extent {
                None => Self {
                    year_start: first,
                    first,
                    last,
                    min_value: lo,
                    max_value: hi,
                },
                Some(e) => Self {
                    year_start: e.year_start,
                    first: e.first.min(first),
                    last: e.last.max(last),
                    min_value: e.min_value.min(lo),
                    max_value: e.max_value.max(hi),
                },
            });
        }
        extent.map(|mut e| {
            e.year_start = year_start(year).map(day_number).unwrap_or(e.first).min(e.first);
            e
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragAxis {
    /// Pan through time.
    X,
    /// Zoom the magnitude range.
    Y,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Dragging(DragAxis),
    SpringingBack,
}

#[derive(Debug, Clone, Copy)]
struct SpringBack {
    from: [f64; 2],
    to: [f64; 2],
    started: Instant,
    duration: Duration,
}

/// Owns the viewport and applies gestures to it.
#[derive(Debug, Clone)]
pub struct ViewportController {
    viewport: Viewport,
    initial: Viewport,
    extent: DataExtent,
    limits: ViewportLimits,
    state: GestureState,
    spring: Option<SpringBack>,
    plot_width: f64,
}

impl ViewportController {
    pub fn new(extent: DataExtent, limits: ViewportLimits, plot_width: f64) -> Self {
        let initial = default_viewport(&extent, &limits);
        Self {
            viewport: initial,
            initial,
            extent,
            limits,
            state: GestureState::Idle,
            spring: None,
            plot_width,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn extent(&self) -> DataExtent {
        self.extent
    }

    pub fn limits(&self) -> ViewportLimits {
        self.limits
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, GestureState::Dragging(_))
    }

    pub fn is_animating(&self) -> bool {
        self.spring.is_some()
    }

    /// Pixel width of the plot area, used to convert drags into days.
    pub fn set_plot_width(&mut self, width: f64) {
        if width.is_finite() && width > 0.0 {
            self.plot_width = width;
        }
    }

    /// Replace the viewport from outside a gesture.
    ///
    /// The y span is kept within limits around its centre. Time bounds are
    /// taken as given and corrected by the next spring-back.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.cancel_animation();
        self.state = GestureState::Idle;
        let [x0, x1] = viewport.x_domain;
        if x0.is_finite() && x1.is_finite() && (x1 - x0).abs() > EPSILON {
            self.viewport.x_domain = [x0.min(x1), x0.max(x1)];
        }
        let [y0, y1] = viewport.y_domain;
        if y0.is_finite() && y1.is_finite() {
            let center = (y0 + y1) / 2.0;
            let span = self.limits.clamp_span((y1 - y0).abs());
            self.viewport.y_domain = [center - span / 2.0, center + span / 2.0];
        }
    }

    /// Back to the initial view.
    pub fn reset(&mut self) {
        self.cancel_animation();
        self.state = GestureState::Idle;
        self.viewport = self.initial;
    }

    /// Stop an in-flight spring-back where it is.
    pub fn cancel_animation(&mut self) {
        if self.spring.take().is_some() && self.state == GestureState::SpringingBack {
            self.state = GestureState::Idle;
        }
    }

    pub fn pointer_down(&mut self, axis: DragAxis) {
        self.cancel_animation();
        self.state = GestureState::Dragging(axis);
    }

    /// Apply a pointer movement in pixels. Returns whether the view changed.
    pub fn pointer_move(&mut self, dx: f64, dy: f64) -> bool {
        match self.state {
            GestureState::Dragging(DragAxis::Y) => self.zoom(dx, dy),
            GestureState::Dragging(DragAxis::X) => self.pan(dx),
            _ => false,
        }
    }

    /// End the gesture; a time drag starts a spring-back when out of bounds.
    pub fn pointer_up(&mut self, now: Instant) {
        match self.state {
            GestureState::Dragging(DragAxis::X) => match self.spring_target() {
                Some(to) => {
                    self.spring = Some(SpringBack {
                        from: self.viewport.x_domain,
                        to,
                        started: now,
                        duration: self.limits.spring_duration(),
                    });
                    self.state = GestureState::SpringingBack;
                }
                None => self.state = GestureState::Idle,
            },
            GestureState::Dragging(DragAxis::Y) => self.state = GestureState::Idle,
            _ => {}
        }
    }

    /// Advance the spring-back animation. Returns whether the view changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(spring) = self.spring else {
            return false;
        };
        let t = if spring.duration.is_zero() {
            1.0
        } else {
            now.saturating_duration_since(spring.started).as_secs_f64()
                / spring.duration.as_secs_f64()
        }
        .clamp(0.0, 1.0);
        if t >= 1.0 {
            self.viewport.x_domain = spring.to;
            self.spring = None;
            self.state = GestureState::Idle;
        } else {
            let eased = ease_out_cubic(t);
            self.viewport.x_domain = [
                lerp(spring.from[0], spring.to[0], eased),
                lerp(spring.from[1], spring.to[1], eased),
            ];
        }
        true
    }

    /// Nearest valid time range, or `None` if the current one is valid.
    ///
    /// Valid means starting no earlier than the later of year start and the
    /// first data point minus the margin, and ending no later than the last
    /// data point plus the margin. The start wins when both can't hold.
    pub fn spring_target(&self) -> Option<[f64; 2]> {
        let [left, right] = self.viewport.x_domain;
        let margin = self.limits.spring_margin_days;
        let min_left = (self.extent.first - margin).max(self.extent.year_start);
        let max_right = self.extent.last + margin;
        let (mut l, mut r) = (left, right);
        if r > max_right {
            l -= r - max_right;
            r = max_right;
        }
        if l < min_left {
            r += min_left - l;
            l = min_left;
        }
        if (l - left).abs() < EPSILON && (r - right).abs() < EPSILON {
            None
        } else {
            Some([l, r])
        }
    }

    fn zoom(&mut self, dx: f64, dy: f64) -> bool {
        let delta = if dx.abs() >= dy.abs() { dx } else { dy };
        if delta == 0.0 || !delta.is_finite() {
            return false;
        }
        let factor = 1.0 + delta.signum() * delta.abs() * self.limits.zoom_sensitivity;
        let span = self.limits.clamp_span((self.viewport.y_span() * factor).max(0.0));
        let center = self.viewport.y_center();
        let before = self.viewport.y_domain;
        self.viewport.y_domain = [center - span / 2.0, center + span / 2.0];
        self.viewport.y_domain != before
    }

    fn pan(&mut self, dx: f64) -> bool {
        if dx == 0.0 || !dx.is_finite() {
            return false;
        }
        let [left, right] = self.viewport.x_domain;
        let span = right - left;
        let extent = self.extent;
        let limits = self.limits;

        // Dragging right reveals earlier dates.
        let mut shift = -dx * span / self.plot_width.max(1.0);
        let overscroll = if shift < 0.0 {
            (extent.first - (left + shift)).max(0.0)
        } else {
            ((right + shift) - extent.last).max(0.0)
        };
        if overscroll > 0.0 {
            let reach = limits.max_overscroll_days.max(EPSILON);
            shift *= 1.0 - (overscroll / reach).min(1.0) * limits.overscroll_resistance;
        }

        let mut next = [left + shift, right + shift];
        let soft_right = extent.last + limits.max_overscroll_days;
        if next[1] > soft_right {
            let d = next[1] - soft_right;
            next = [next[0] - d, next[1] - d];
        }
        let min_left = (extent.first - limits.max_overscroll_days).max(extent.year_start);
        if next[0] < min_left {
            let d = min_left - next[0];
            next = [next[0] + d, next[1] + d];
        }
        let changed = next != self.viewport.x_domain;
        self.viewport.x_domain = next;
        changed
    }
}

/// Initial view: the latest `default_window_days` of data plus the spring
/// margin, and the value range padded by 10 %.
pub fn default_viewport(extent: &DataExtent, limits: &ViewportLimits) -> Viewport {
    let margin = limits.spring_margin_days;
    let right = extent.last + margin;
    let left = (right - limits.default_window_days)
        .max(extent.first - margin)
        .max(extent.year_start);

    let pad = ((extent.max_value - extent.min_value) * Y_PADDING_FRACTION).max(1.0);
    let lo = (extent.min_value - pad).max(0.0);
    let hi = extent.max_value + pad;
    let span = limits.clamp_span(hi - lo);
    let center = (lo + hi) / 2.0;
    let mut y = [center - span / 2.0, center + span / 2.0];
    if y[0] < 0.0 {
        y = [0.0, span];
    }
    Viewport::new([left, right], y)
}

fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
