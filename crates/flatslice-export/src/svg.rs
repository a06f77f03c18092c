//! SVG preview of traced polygons.
//!
//! Every polygon becomes one `<path>` in image pixel coordinates. Closed
//! polygons end with `z` instead of repeating their first point. The
//! `viewBox` is widened by the grid border so contours that run along
//! the border stay visible.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use flatslice_pipeline::{Dimensions, Polygon};

/// Optional text embedded in the document.
///
/// Text values are XML-escaped by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`, typically the source file stem.
    pub title: Option<&'a str>,

    /// Emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Settings JSON, emitted inside `<metadata>` so a preview records
    /// how it was produced.
    pub config_json: Option<&'a str>,
}

/// Build the `d` attribute for a polygon.
///
/// Returns an empty string for polygons with fewer than 2 points.
///
/// # Examples
///
/// ```
/// use flatslice_pipeline::{Point, Polygon};
/// use flatslice_export::build_path_data;
///
/// let triangle = Polygon::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(4.0, 0.0),
///     Point::new(0.0, 3.0),
///     Point::new(0.0, 0.0),
/// ]);
/// assert_eq!(build_path_data(&triangle), "M0,0 L4,0 L0,3 z");
/// ```
#[must_use]
pub fn build_path_data(polygon: &Polygon) -> String {
    let points = polygon.points();
    if points.len() < 2 {
        return String::new();
    }

    let closed = polygon.is_closed();
    let body = if closed {
        &points[1..points.len() - 1]
    } else {
        &points[1..]
    };
    let mut data = Data::new().move_to((points[0].x, points[0].y));
    for p in body {
        data = data.line_to((p.x, p.y));
    }
    if closed {
        data = data.close();
    }
    String::from(Value::from(data))
}

/// Serialize `polygons` into a standalone SVG document.
///
/// `dimensions` is the source image size and `border` the grid border
/// the polygons were traced with.
#[must_use]
pub fn to_svg(
    polygons: &[Polygon],
    dimensions: Dimensions,
    border: u32,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width + 2 * border;
    let h = dimensions.height + 2 * border;
    let origin = -i64::from(border);
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", format!("{origin} {origin} {w} {h}"));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut settings = Element::new("flatslice:settings");
        settings.assign("xmlns:flatslice", "https://github.com/flatslice/flatslice/ns/1");
        settings.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(settings);
        doc = doc.add(metadata_el);
    }

    for polygon in polygons {
        let d = build_path_data(polygon);
        if d.is_empty() {
            continue;
        }
        let path = Path::new()
            .set("d", d)
            .set("fill", "none")
            .set("stroke", "black")
            .set("stroke-width", 1);
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use flatslice_pipeline::Point;

    use super::*;

    fn dims(width: u32, height: u32) -> Dimensions {
        Dimensions { width, height }
    }

    fn polygon(coords: &[(f64, f64)]) -> Polygon {
        Polygon::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    #[test]
    fn open_path_has_no_close_command() {
        let d = build_path_data(&polygon(&[(10.0, 20.0), (30.0, 40.0)]));
        assert_eq!(d, "M10,20 L30,40");
    }

    #[test]
    fn closed_path_drops_duplicate_point() {
        let square = polygon(&[(-1.0, -1.0), (10.0, -1.0), (10.0, 10.0), (-1.0, 10.0), (-1.0, -1.0)]);
        assert_eq!(build_path_data(&square), "M-1,-1 L10,-1 L10,10 L-1,10 z");
    }

    #[test]
    fn degenerate_polygons_are_skipped() {
        let polygons = [
            polygon(&[]),
            polygon(&[(1.0, 1.0)]),
            polygon(&[(2.0, 3.0), (4.0, 5.0)]),
        ];
        let svg = to_svg(&polygons, dims(100, 100), 0, &SvgMetadata::default());
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains(r#"d="M2,3 L4,5""#));
    }

    #[test]
    fn document_structure() {
        let svg = to_svg(
            &[polygon(&[(0.0, 0.0), (3.0, 0.0), (3.0, 3.0), (0.0, 0.0)])],
            dims(800, 600),
            1,
            &SvgMetadata::default(),
        );
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"xmlns="http://www.w3.org/2000/svg""#));
        assert!(svg.contains(r#"width="802""#));
        assert!(svg.contains(r#"height="602""#));
        assert!(svg.contains(r#"viewBox="-1 -1 802 602""#));
        assert!(svg.contains(r#"fill="none""#));
        assert!(svg.trim_end().ends_with("</svg>"));
        assert!(!svg.contains("<title>"));
        assert!(!svg.contains("<metadata>"));
    }

    #[test]
    fn metadata_is_escaped_and_precedes_paths() {
        let meta = SvgMetadata {
            title: Some("A <B> & C"),
            description: Some("traced"),
            config_json: Some(r#"{"dpi":300}"#),
        };
        let svg = to_svg(
            &[polygon(&[(1.0, 2.0), (3.0, 4.0)])],
            dims(10, 10),
            0,
            &meta,
        );
        assert!(svg.contains("<title>A &lt;B&gt; &amp; C</title>"));
        assert!(svg.contains("<desc>traced</desc>"));
        assert!(svg.contains("<flatslice:settings"));

        let desc = svg.find("<desc>").unwrap();
        let metadata = svg.find("<metadata>").unwrap();
        let path = svg.find("<path").unwrap();
        assert!(desc < metadata);
        assert!(metadata < path);
    }
}
