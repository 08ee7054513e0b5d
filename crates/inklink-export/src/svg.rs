//! SVG preview rendering for inklink
//!
//! Renders the current page of a snapshot:
//! - page coordinates are translated so content starts at `PADDING`
//! - each shape is drawn in its local frame inside a translate/rotate group
//! - arrow markers are defined once in `<defs>`

use std::fmt::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use inklink_core::{Bounds, DocumentSnapshot, GeoKind, Point, Shape, ShapeKind};

/// Space around the content, in page units
const PADDING: f64 = 16.0;
const STROKE_WIDTH: f64 = 2.0;
const FONT_SIZE: f64 = 16.0;

/// Render the current page of `snapshot`. `None` when the page has no shapes.
pub fn render_preview(snapshot: &DocumentSnapshot) -> Option<String> {
    let page = snapshot.current_page()?;
    let shapes: Vec<&Shape> = snapshot.shapes_on(page.id).collect();
    let bounds = Bounds::union_all(shapes.iter().map(|s| s.page_bounds()))?;

    let mut output = String::new();
    write_document(&mut output, &shapes, &bounds).ok()?;
    Some(output)
}

/// Render the preview as a `data:` URI suitable for the envelope
pub fn render_preview_uri(snapshot: &DocumentSnapshot) -> Option<String> {
    render_preview(snapshot).map(|svg| svg_data_uri(&svg))
}

pub fn svg_data_uri(svg: &str) -> String {
    format!("data:image/svg+xml;base64,{}", STANDARD.encode(svg))
}

/// Save the preview to a file
pub fn save_preview(snapshot: &DocumentSnapshot, path: &Path) -> Result<bool> {
    let Some(svg) = render_preview(snapshot) else {
        return Ok(false);
    };
    std::fs::write(path, svg).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

fn write_document(output: &mut String, shapes: &[&Shape], bounds: &Bounds) -> fmt::Result {
    let width = bounds.width() + 2.0 * PADDING;
    let height = bounds.height() + 2.0 * PADDING;
    let offset_x = PADDING - bounds.min_x;
    let offset_y = PADDING - bounds.min_y;

    writeln!(
        output,
        r#"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg"
     width="{w}" height="{h}"
     viewBox="0 0 {w} {h}">"#,
        w = fmt_num(width),
        h = fmt_num(height)
    )?;

    writeln!(
        output,
        r#"  <defs>
    <marker id="arrowhead" markerWidth="10" markerHeight="7"
            refX="9" refY="3.5" orient="auto" fill="context-stroke">
      <polygon points="0 0, 10 3.5, 0 7" />
    </marker>
  </defs>"#
    )?;

    for shape in shapes {
        render_shape(output, shape, offset_x, offset_y)?;
    }

    writeln!(output, "</svg>")
}

/// Render a single shape to SVG
fn render_shape(output: &mut String, shape: &Shape, offset_x: f64, offset_y: f64) -> fmt::Result {
    let color = shape.color.to_css();
    writeln!(
        output,
        r#"  <g transform="translate({} {}) rotate({})">"#,
        fmt_num(shape.x + offset_x),
        fmt_num(shape.y + offset_y),
        fmt_num(shape.rotation.to_degrees())
    )?;

    match &shape.kind {
        ShapeKind::Draw { points, .. } => render_stroke(output, points, color)?,
        ShapeKind::Geo { geo, w, h, label } => {
            render_geo(output, *geo, *w, *h, color)?;
            if let Some(text) = label {
                writeln!(
                    output,
                    r#"    <text x="{}" y="{}" text-anchor="middle" dominant-baseline="middle" font-size="{}" fill="{}">{}</text>"#,
                    fmt_num(w / 2.0),
                    fmt_num(h / 2.0),
                    fmt_num(FONT_SIZE),
                    color,
                    escape_xml(text)
                )?;
            }
        }
        ShapeKind::Line { end } => render_line(output, *end, false, color)?,
        ShapeKind::Arrow { end } => render_line(output, *end, true, color)?,
        ShapeKind::Text { text } => {
            writeln!(
                output,
                r#"    <text x="0" y="0" dominant-baseline="hanging" font-size="{}" fill="{}">{}</text>"#,
                fmt_num(FONT_SIZE),
                color,
                escape_xml(text)
            )?;
        }
    }

    writeln!(output, "  </g>")
}

/// Render a freehand stroke as a polyline; a single point becomes a dot
fn render_stroke(output: &mut String, points: &[Point], color: &str) -> fmt::Result {
    match points {
        [] => Ok(()),
        [p] => writeln!(
            output,
            r#"    <circle cx="{}" cy="{}" r="{}" fill="{}"/>"#,
            fmt_num(p.x),
            fmt_num(p.y),
            fmt_num(STROKE_WIDTH / 2.0),
            color
        ),
        _ => {
            let coords: Vec<String> = points
                .iter()
                .map(|p| format!("{},{}", fmt_num(p.x), fmt_num(p.y)))
                .collect();
            writeln!(
                output,
                r#"    <polyline points="{}" stroke="{}" stroke-width="{}" stroke-linecap="round" stroke-linejoin="round" fill="none"/>"#,
                coords.join(" "),
                color,
                fmt_num(STROKE_WIDTH)
            )
        }
    }
}

fn render_geo(output: &mut String, geo: GeoKind, w: f64, h: f64, color: &str) -> fmt::Result {
    let style = format!(
        r#"stroke="{}" stroke-width="{}" fill="none""#,
        color,
        fmt_num(STROKE_WIDTH)
    );
    match geo {
        GeoKind::Rectangle => writeln!(
            output,
            r#"    <rect x="0" y="0" width="{}" height="{}" {style}/>"#,
            fmt_num(w),
            fmt_num(h)
        ),
        GeoKind::Ellipse => writeln!(
            output,
            r#"    <ellipse cx="{}" cy="{}" rx="{}" ry="{}" {style}/>"#,
            fmt_num(w / 2.0),
            fmt_num(h / 2.0),
            fmt_num(w / 2.0),
            fmt_num(h / 2.0)
        ),
        GeoKind::Diamond => writeln!(
            output,
            r#"    <polygon points="{cx},0 {w},{cy} {cx},{h} 0,{cy}" {style}/>"#,
            cx = fmt_num(w / 2.0),
            cy = fmt_num(h / 2.0),
            w = fmt_num(w),
            h = fmt_num(h)
        ),
        GeoKind::Triangle => writeln!(
            output,
            r#"    <polygon points="{cx},0 {w},{h} 0,{h}" {style}/>"#,
            cx = fmt_num(w / 2.0),
            w = fmt_num(w),
            h = fmt_num(h)
        ),
    }
}

/// Render a line or arrow from the shape origin to `end`
fn render_line(output: &mut String, end: Point, is_arrow: bool, color: &str) -> fmt::Result {
    let marker = if is_arrow {
        r#" marker-end="url(#arrowhead)""#
    } else {
        ""
    };
    writeln!(
        output,
        r#"    <line x1="0" y1="0" x2="{}" y2="{}" stroke="{}" stroke-width="{}"{}/>"#,
        fmt_num(end.x),
        fmt_num(end.y),
        color,
        fmt_num(STROKE_WIDTH),
        marker
    )
}

/// Trim float noise so output stays stable and readable
fn fmt_num(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded == rounded.trunc() {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use inklink_core::{Document, ShapeColor};

    #[test]
    fn empty_page_has_no_preview() {
        let doc = Document::new();
        assert_eq!(render_preview(&doc.snapshot()), None);
    }

    #[test]
    fn renders_each_shape_kind() {
        let mut doc = Document::new();
        let page = doc.current_page_id();
        let kinds = [
            ShapeKind::Draw {
                points: vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)],
                is_complete: true,
            },
            ShapeKind::Geo {
                geo: GeoKind::Ellipse,
                w: 40.0,
                h: 20.0,
                label: Some("a < b".into()),
            },
            ShapeKind::Arrow { end: Point::new(30.0, 0.0) },
            ShapeKind::Text { text: "hi".into() },
        ];
        for kind in kinds {
            doc.create_shape(Shape::new(page, kind).with_color(ShapeColor::Blue))
                .unwrap();
        }

        let svg = render_preview(&doc.snapshot()).unwrap();
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains("<polyline"));
        assert!(svg.contains("<ellipse"));
        assert!(svg.contains(r#"marker-end="url(#arrowhead)""#));
        assert!(svg.contains("a &lt; b"));
        assert!(svg.contains(ShapeColor::Blue.to_css()));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn save_preview_skips_empty_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preview.svg");
        let mut doc = Document::new();
        assert!(!save_preview(&doc.snapshot(), &path).unwrap());
        assert!(!path.exists());

        let page = doc.current_page_id();
        doc.create_shape(Shape::new(page, ShapeKind::Line { end: Point::new(5.0, 5.0) }))
            .unwrap();
        assert!(save_preview(&doc.snapshot(), &path).unwrap());
        assert!(std::fs::read_to_string(&path).unwrap().contains("<line"));
    }

    #[test]
    fn data_uri_is_base64_svg() {
        let uri = svg_data_uri("<svg/>");
        assert_eq!(uri, "data:image/svg+xml;base64,PHN2Zy8+");
    }

    #[test]
    fn numbers_are_compact() {
        assert_eq!(fmt_num(3.0), "3");
        assert_eq!(fmt_num(2.504), "2.5");
        assert_eq!(fmt_num(-0.001), "0");
    }
}
