//! Backend-neutral description of a rendered chart.
//!
//! A [`Scene`] is a list of layers of primitive shapes in pixel space. The
//! desktop app paints it with egui and the report writer serializes it to SVG.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub fn from_min_size(min: Point, width: f32, height: f32) -> Self {
        Self {
            min,
            max: Point::new(min.x + width, min.y + height),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// `#rrggbb`, alpha is emitted separately by writers that need it.
    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(&self) -> f32 {
        self.a as f32 / 255.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stroke {
    pub width: f32,
    pub color: Rgba,
}

impl Stroke {
    pub const fn new(width: f32, color: Rgba) -> Self {
        Self { width, color }
    }
}

/// Horizontal alignment of a text relative to its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Shape {
    Line {
        from: Point,
        to: Point,
        stroke: Stroke,
    },
    Polyline {
        points: Vec<Point>,
        stroke: Stroke,
    },
    /// Filled convex polygon.
    Polygon {
        points: Vec<Point>,
        fill: Rgba,
    },
    Circle {
        center: Point,
        radius: f32,
        fill: Rgba,
        stroke: Option<Stroke>,
    },
    Rect {
        rect: Rect,
        fill: Rgba,
        stroke: Option<Stroke>,
    },
    /// Text vertically centred on `pos`.
    Text {
        pos: Point,
        text: String,
        size: f32,
        color: Rgba,
        anchor: Anchor,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layer {
    pub name: String,
    /// Shapes are cut to this rectangle when set.
    pub clip: Option<Rect>,
    pub shapes: Vec<Shape>,
}

impl Layer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clip: None,
            shapes: Vec::new(),
        }
    }

    pub fn clipped(name: impl Into<String>, clip: Rect) -> Self {
        Self {
            clip: Some(clip),
            ..Self::new(name)
        }
    }

    pub fn push(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub background: Rgba,
    pub layers: Vec<Layer>,
}

impl Scene {
    pub fn new(width: f32, height: f32, background: Rgba) -> Self {
        Self {
            width,
            height,
            background,
            layers: Vec::new(),
        }
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.layers.iter().flat_map(|l| &l.shapes)
    }

    /// All text content in drawing order.
    pub fn texts(&self) -> Vec<&str> {
        self.shapes()
            .filter_map(|s| match s {
                Shape::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes().next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_geometry() {
        let r = Rect::from_min_size(Point::new(10.0, 20.0), 100.0, 50.0);
        assert_eq!(r.width(), 100.0);
        assert_eq!(r.height(), 50.0);
        assert!(r.contains(Point::new(60.0, 45.0)));
        assert!(!r.contains(Point::new(5.0, 45.0)));
        assert_eq!(r.center(), Point::new(60.0, 45.0));
    }

    #[test]
    fn colors_format_as_hex() {
        let c = Rgba::rgb(255, 128, 0).with_alpha(51);
        assert_eq!(c.hex(), "#ff8000");
        assert!((c.opacity() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn scene_collects_texts() {
        let mut scene = Scene::new(100.0, 100.0, Rgba::rgb(0, 0, 0));
        assert!(scene.is_empty());
        let mut layer = Layer::new("labels");
        layer.push(Shape::Text {
            pos: Point::new(1.0, 1.0),
            text: "hello".into(),
            size: 12.0,
            color: Rgba::rgb(255, 255, 255),
            anchor: Anchor::Start,
        });
        scene.layers.push(layer);
        assert_eq!(scene.texts(), vec!["hello"]);
        assert!(scene.layer("labels").is_some());
    }
}
