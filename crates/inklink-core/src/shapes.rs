//! Shape types for inklink.
//!
//! `Shape` is a real, persistent canvas shape. `ShadowShape` is the ephemeral
//! highlight clone of a real shape; it lives in the same id space but is a
//! separate record type and has no serde representation, so it can never end
//! up in a saved document.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::groups::GroupId;

/// Shape identifier - UUID for global uniqueness
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ShapeId(pub Uuid);

impl ShapeId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shape:{}", self.0)
    }
}

/// Accepts both `shape:<uuid>` and a bare uuid
impl FromStr for ShapeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("shape:").unwrap_or(s);
        Uuid::parse_str(raw).map(Self)
    }
}

/// Page identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PageId(pub Uuid);

impl PageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page:{}", self.0)
    }
}

/// Canvas palette. Groups pick their color from the same palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShapeColor {
    #[default]
    Black,
    Blue,
    Green,
    Red,
    Yellow,
    Violet,
    Grey,
}

impl ShapeColor {
    pub const ALL: [ShapeColor; 7] = [
        ShapeColor::Black,
        ShapeColor::Blue,
        ShapeColor::Green,
        ShapeColor::Red,
        ShapeColor::Yellow,
        ShapeColor::Violet,
        ShapeColor::Grey,
    ];

    /// Convert to CSS color string for SVG rendering
    pub fn to_css(self) -> &'static str {
        match self {
            ShapeColor::Black => "#1d1d1d",
            ShapeColor::Blue => "#4465e9",
            ShapeColor::Green => "#099268",
            ShapeColor::Red => "#e03131",
            ShapeColor::Yellow => "#f1ac4b",
            ShapeColor::Violet => "#ae3ec9",
            ShapeColor::Grey => "#9fa8b2",
        }
    }

    /// Palette name as stored in documents
    pub fn name(self) -> &'static str {
        match self {
            ShapeColor::Black => "black",
            ShapeColor::Blue => "blue",
            ShapeColor::Green => "green",
            ShapeColor::Red => "red",
            ShapeColor::Yellow => "yellow",
            ShapeColor::Violet => "violet",
            ShapeColor::Grey => "grey",
        }
    }

    /// Parse a palette name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|color| color.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ShapeColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A point in page or shape-local coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_points(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in iter {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Union of an iterator of bounds, `None` when empty
    pub fn union_all(iter: impl IntoIterator<Item = Bounds>) -> Option<Bounds> {
        iter.into_iter().reduce(|acc, b| acc.union(&b))
    }

    fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_x, self.min_y),
            Point::new(self.max_x, self.min_y),
            Point::new(self.max_x, self.max_y),
            Point::new(self.min_x, self.max_y),
        ]
    }
}

/// Geometric primitive of a `geo` shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeoKind {
    #[default]
    Rectangle,
    Ellipse,
    Diamond,
    Triangle,
}

/// Different types of shapes on the canvas. Coordinates are local to the
/// shape's origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShapeKind {
    /// Freehand stroke; `is_complete` flips once the pen lifts
    #[serde(rename_all = "camelCase")]
    Draw { points: Vec<Point>, is_complete: bool },
    /// Box-like primitive
    Geo {
        geo: GeoKind,
        w: f64,
        h: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    /// Straight line from origin to `end`
    Line { end: Point },
    /// Arrow from origin to `end`
    Arrow { end: Point },
    /// Single line of text
    Text { text: String },
}

impl ShapeKind {
    /// Type name as the canvas engine reports it
    pub fn type_name(&self) -> &'static str {
        match self {
            ShapeKind::Draw { .. } => "draw",
            ShapeKind::Geo { .. } => "geo",
            ShapeKind::Line { .. } => "line",
            ShapeKind::Arrow { .. } => "arrow",
            ShapeKind::Text { .. } => "text",
        }
    }

    /// Whether this is a freehand stroke still being drawn
    pub fn is_live_stroke(&self) -> bool {
        matches!(self, ShapeKind::Draw { is_complete: false, .. })
    }

    /// Whether this is a finished freehand stroke
    pub fn is_finished_stroke(&self) -> bool {
        matches!(self, ShapeKind::Draw { is_complete: true, .. })
    }

    /// Bounds in shape-local coordinates
    pub fn local_bounds(&self) -> Bounds {
        let origin = Point::default();
        let bounds = match self {
            ShapeKind::Draw { points, .. } => Bounds::from_points(points.iter().copied()),
            ShapeKind::Geo { w, h, .. } => Bounds::from_points([origin, Point::new(*w, *h)]),
            ShapeKind::Line { end } | ShapeKind::Arrow { end } => {
                Bounds::from_points([origin, *end])
            }
            ShapeKind::Text { text } => {
                // Rough metrics: 8 units per char, 20 units line height
                let width = text.chars().count() as f64 * 8.0;
                Bounds::from_points([origin, Point::new(width, 20.0)])
            }
        };
        bounds.unwrap_or(Bounds {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 0.0,
            max_y: 0.0,
        })
    }
}

/// Metadata the link-group system keeps on each shape.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeMeta {
    /// Back-reference to every group this shape belongs to
    #[serde(
        default,
        rename = "linkableGroups",
        skip_serializing_if = "BTreeSet::is_empty"
    )]
    pub(crate) linkable_groups: BTreeSet<GroupId>,
    /// Forward reference to the highlight clone; session-only
    #[serde(skip)]
    pub(crate) highlight_clone: Option<ShapeId>,
}

/// A real canvas shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    pub id: ShapeId,
    pub parent_id: PageId,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(flatten)]
    pub kind: ShapeKind,
    #[serde(default)]
    pub color: ShapeColor,
    #[serde(default)]
    pub(crate) meta: ShapeMeta,
}

impl Shape {
    pub fn new(parent_id: PageId, kind: ShapeKind) -> Self {
        Self {
            id: ShapeId::new(),
            parent_id,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            is_locked: false,
            kind,
            color: ShapeColor::default(),
            meta: ShapeMeta::default(),
        }
    }

    pub fn with_id(mut self, id: ShapeId) -> Self {
        self.id = id;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_color(mut self, color: ShapeColor) -> Self {
        self.color = color;
        self
    }

    /// Groups this shape belongs to (read-only; membership is changed through
    /// the group store)
    pub fn linkable_groups(&self) -> &BTreeSet<GroupId> {
        &self.meta.linkable_groups
    }

    /// Id of the highlight clone currently mirroring this shape
    pub fn highlight_clone(&self) -> Option<ShapeId> {
        self.meta.highlight_clone
    }

    /// Bounds in page coordinates
    pub fn page_bounds(&self) -> Bounds {
        transformed_bounds(&self.kind, self.x, self.y, self.rotation)
    }
}

/// Ephemeral highlight clone of a real shape
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowShape {
    pub id: ShapeId,
    pub source_id: ShapeId,
    pub parent_id: PageId,
    pub x: f64,
    pub y: f64,
    pub rotation: f64,
    pub kind: ShapeKind,
    pub color: ShapeColor,
}

impl ShadowShape {
    /// Clone geometry, type, position and rotation of `source` with `color`
    /// substituted
    pub fn mirror(source: &Shape, color: ShapeColor) -> Self {
        Self {
            id: ShapeId::new(),
            source_id: source.id,
            parent_id: source.parent_id,
            x: source.x,
            y: source.y,
            rotation: source.rotation,
            kind: source.kind.clone(),
            color,
        }
    }

    pub fn page_bounds(&self) -> Bounds {
        transformed_bounds(&self.kind, self.x, self.y, self.rotation)
    }
}

fn transformed_bounds(kind: &ShapeKind, x: f64, y: f64, rotation: f64) -> Bounds {
    let local = kind.local_bounds();
    let (sin, cos) = rotation.sin_cos();
    let corners = local.corners().map(|p| {
        Point::new(x + p.x * cos - p.y * sin, y + p.x * sin + p.y * cos)
    });
    Bounds::from_points(corners).unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_id_parses_with_or_without_prefix() {
        let id = ShapeId::new();
        assert_eq!(id.to_string().parse::<ShapeId>().unwrap(), id);
        assert_eq!(id.0.to_string().parse::<ShapeId>().unwrap(), id);
        assert!("shape:nope".parse::<ShapeId>().is_err());
    }

    #[test]
    fn shape_json_carries_type_tag_and_hides_highlight_clone() {
        let page = PageId::new();
        let mut shape = Shape::new(
            page,
            ShapeKind::Draw {
                points: vec![Point::new(0.0, 0.0), Point::new(4.0, 2.0)],
                is_complete: true,
            },
        );
        shape.meta.highlight_clone = Some(ShapeId::new());

        let json = serde_json::to_value(&shape).unwrap();
        assert_eq!(json["type"], "draw");
        assert_eq!(json["isComplete"], true);
        assert!(json.get("meta").is_some());
        assert!(json["meta"].get("__hlCloneId").is_none());

        let back: Shape = serde_json::from_value(json).unwrap();
        assert_eq!(back.highlight_clone(), None);
        assert_eq!(back.kind, shape.kind);
    }

    #[test]
    fn rotated_bounds_cover_rotated_corners() {
        let shape = Shape::new(
            PageId::new(),
            ShapeKind::Geo {
                geo: GeoKind::Rectangle,
                w: 10.0,
                h: 0.0,
                label: None,
            },
        )
        .at(5.0, 5.0)
        .with_rotation(std::f64::consts::FRAC_PI_2);

        let b = shape.page_bounds();
        assert!((b.min_x - 5.0).abs() < 1e-9);
        assert!((b.max_y - 15.0).abs() < 1e-9);
    }

    #[test]
    fn color_names_round_trip() {
        for color in ShapeColor::ALL {
            assert_eq!(ShapeColor::from_name(color.name()), Some(color));
        }
        assert_eq!(ShapeColor::from_name("BLUE"), Some(ShapeColor::Blue));
        assert_eq!(ShapeColor::from_name("orange"), None);
    }
}
