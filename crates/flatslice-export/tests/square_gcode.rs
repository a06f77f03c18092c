//! Integration test: a PNG with a filled square goes through the pipeline
//! and comes out as a G-code program burning the square's outline.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use flatslice_export::{JobConfig, Phase, SvgMetadata, generate, to_svg};
use flatslice_pipeline::{CancelFlag, Clock, PipelineConfig, Point, process};

struct FrozenClock;

impl Clock for FrozenClock {
    type Instant = ();

    fn now(&self) {}

    fn elapsed(&self, _since: &()) -> Duration {
        Duration::ZERO
    }
}

/// 20x20 white image with a black square covering pixels 5..15.
fn square_png() -> Vec<u8> {
    let img = image::RgbaImage::from_fn(20, 20, |x, y| {
        if (5..15).contains(&x) && (5..15).contains(&y) {
            image::Rgba([0, 0, 0, 255])
        } else {
            image::Rgba([255, 255, 255, 255])
        }
    });
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgba8,
    )
    .unwrap();
    buf
}

/// 254 dpi: exactly 0.1 mm per pixel.
fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        dpi: 254.0,
        ..PipelineConfig::default()
    }
}

fn moves(lines: &[String]) -> Vec<&str> {
    lines
        .iter()
        .map(String::as_str)
        .filter(|l| (l.starts_with("G0 ") || l.starts_with("G1 ")) && !l.contains(" F"))
        .collect()
}

#[test]
fn square_outline_program() {
    let image = process(
        &square_png(),
        &pipeline_config(),
        &CancelFlag::new(),
        &FrozenClock,
    )
    .unwrap();
    assert_eq!(image.polygons().len(), 1);

    let job = generate(
        image.polygons(),
        image.dimensions().height,
        image.pixel_to_mm(),
        &JobConfig::default(),
    )
    .unwrap();

    let outline: Vec<String> = job
        .commands(Phase::Outline)
        .iter()
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        moves(&outline),
        [
            "G0 X0.4 Y1.6",
            "G1 X1.5",
            "G1 Y0.5",
            "G1 X0.4",
            "G1 Y1.6",
        ]
    );
    assert!(job.commands(Phase::Infill).is_empty());

    let program = job.to_string();
    let lines: Vec<&str> = program.lines().collect();
    assert_eq!(lines[0], "");
    assert!(lines[1].starts_with("; Generated with flatslice"));
    assert!(lines.contains(&"G21"));
    assert!(lines.contains(&"G90"));
    // Header move to the work origin picks up the default Z offset.
    assert!(lines.contains(&"G1 X0.0 Y0.0 Z20.0"));
    assert_eq!(
        lines[lines.len() - 4..],
        ["; Footer", "M107 P1", "G1 F6000.0", "G0 X0.0 Y0.0 Z20.0"]
    );
}

#[test]
fn outline_moves_map_back_to_polygon_vertices() {
    let image = process(
        &square_png(),
        &pipeline_config(),
        &CancelFlag::new(),
        &FrozenClock,
    )
    .unwrap();
    let mut config = JobConfig::default();
    config.machine.offset.x = 7.0;
    config.machine.offset.y = -3.0;
    let scale = image.pixel_to_mm();
    let height = f64::from(image.dimensions().height);
    let job = generate(image.polygons(), image.dimensions().height, scale, &config).unwrap();

    let vertices = image.polygons()[0].points();
    let (mut x, mut y) = (None, None);
    for command in job.commands(Phase::Outline) {
        let text = command.to_string();
        if !(text.starts_with("G0 ") || text.starts_with("G1 ")) || text.contains(" F") {
            continue;
        }
        for token in text.split_whitespace().skip(1) {
            let (axis, value) = token.split_at(1);
            let value: f64 = value.parse().unwrap();
            match axis {
                "X" => x = Some((value - 7.0) / scale),
                "Y" => y = Some(height - (value + 3.0) / scale),
                other => panic!("unexpected axis {other}"),
            }
        }
        let back = Point::new(x.unwrap(), y.unwrap());
        assert!(
            vertices.iter().any(|v| v.distance(back) < 0.01),
            "{text} maps to {back:?}, not a polygon vertex"
        );
    }
}

#[test]
fn infill_only_program_burns_inside_square() {
    let image = process(
        &square_png(),
        &pipeline_config(),
        &CancelFlag::new(),
        &FrozenClock,
    )
    .unwrap();
    let mut config = JobConfig::default();
    config.outline.passes = 0;
    config.infill.passes = 2;
    config.infill.line_spacing = 0.2;
    let job = generate(
        image.polygons(),
        image.dimensions().height,
        image.pixel_to_mm(),
        &config,
    )
    .unwrap();
    assert!(job.commands(Phase::Outline).is_empty());

    let infill: Vec<String> = job
        .commands(Phase::Infill)
        .iter()
        .map(ToString::to_string)
        .collect();
    // Square spans 11 px = 1.1 mm; 0.2 mm spacing gives 5 scanlines.
    let burns = moves(&infill)
        .into_iter()
        .filter(|l| l.starts_with("G1 X"))
        .count();
    assert_eq!(burns, 5);

    // Infill buffer appears once per pass.
    let program = job.to_string();
    let first = infill.iter().find(|l| l.starts_with("G0 ")).unwrap();
    assert_eq!(program.lines().filter(|l| l == first).count(), 2);
}

#[test]
fn svg_preview_of_traced_square() {
    let image = process(
        &square_png(),
        &pipeline_config(),
        &CancelFlag::new(),
        &FrozenClock,
    )
    .unwrap();
    let svg = to_svg(
        image.polygons(),
        image.dimensions(),
        pipeline_config().border,
        &SvgMetadata {
            title: Some("square"),
            ..SvgMetadata::default()
        },
    );
    assert!(svg.contains(r#"d="M4,4 L15,4 L15,15 L4,15 z""#));
    assert!(svg.contains("<title>square</title>"));
}
