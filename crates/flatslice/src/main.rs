//! flatslice: trace a raster image into laser engraver G-code.
//!
//! Reads an image, traces the foreground into closed polygons, and writes
//! a G-code program burning their outline and, optionally, a scanline
//! infill. Settings come from an optional JSON file; the most common ones
//! can be overridden on the command line.
//!
//! # Usage
//!
//! ```text
//! flatslice [OPTIONS] <IMAGE_PATH>
//! ```
//!
//! Logging goes to stderr and is filtered with `RUST_LOG` (default `info`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::Parser;
use flatslice_export::{
    InfillSettings, JobConfig, JobError, MachineSettings, OutlineSettings, SvgMetadata,
};
use flatslice_pipeline::{CancelFlag, Clock, PipelineConfig, PipelineError, RasterImage};
use serde::{Deserialize, Serialize};

/// Trace a raster image into laser engraver G-code.
#[derive(Parser)]
#[command(name = "flatslice", version)]
struct Cli {
    /// Path to the input image (PNG, JPEG, BMP, WebP, TIFF).
    image_path: PathBuf,

    /// JSON settings file. Missing fields take their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the G-code. Defaults to the image path with a
    /// `.gcode` extension.
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Image resolution in dots per inch.
    #[arg(long)]
    dpi: Option<f64>,

    /// Use the resolution stored in the image, if it has one.
    #[arg(long, conflicts_with = "dpi")]
    use_image_dpi: bool,

    /// Number of outline passes.
    #[arg(long)]
    outline_passes: Option<u32>,

    /// Number of infill passes.
    #[arg(long)]
    infill_passes: Option<u32>,

    /// Also write an SVG preview of the traced polygons.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Also write the classified pixel grid as a grayscale PNG.
    #[arg(long)]
    grid: Option<PathBuf>,

    /// Print diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,
}

/// Contents of the settings file.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct Settings {
    image: PipelineConfig,
    outline: OutlineSettings,
    infill: InfillSettings,
    machine: MachineSettings,
}

impl Settings {
    fn job(&self) -> JobConfig {
        JobConfig {
            outline: self.outline.clone(),
            infill: self.infill.clone(),
            machine: self.machine.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Settings {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot serialize diagnostics: {0}")]
    Diagnostics(serde_json::Error),

    #[error("cannot write grid image {path}: {source}")]
    Grid {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Job(#[from] JobError),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let settings = load_settings(cli)?;
    let job_config = settings.job();
    job_config.validate()?;

    let cancel = CancelFlag::new();
    let clock = StdClock;
    let mut image = RasterImage::load(&cli.image_path, &settings.image, &clock)?;
    if cli.use_image_dpi {
        image.use_image_dpi();
    }
    image.trace(&cancel, &clock)?;
    image.simplify(settings.image.simplify_tolerance, &cancel, &clock)?;

    let job = flatslice_export::generate(
        image.polygons(),
        image.dimensions().height,
        image.pixel_to_mm(),
        &job_config,
    )?;
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.image_path.with_extension("gcode"));
    let program = format!("{job}\n");
    write(&output, &program)?;
    tracing::info!("G-code written to {} ({} bytes)", output.display(), program.len());

    if let Some(ref svg_path) = cli.svg {
        let title = cli
            .image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("flatslice");
        let config_json = serde_json::to_string(&settings.image).ok();
        let metadata = SvgMetadata {
            title: Some(title),
            description: Some("Traced with flatslice"),
            config_json: config_json.as_deref(),
        };
        let svg = flatslice_export::to_svg(
            image.polygons(),
            image.dimensions(),
            settings.image.border,
            &metadata,
        );
        write(svg_path, &svg)?;
        tracing::info!("SVG written to {} ({} bytes)", svg_path.display(), svg.len());
    }

    if let Some(ref grid_path) = cli.grid {
        image
            .grid()
            .to_gray_image()
            .save(grid_path)
            .map_err(|source| CliError::Grid {
                path: grid_path.clone(),
                source,
            })?;
    }

    if cli.json {
        let json =
            serde_json::to_string_pretty(image.diagnostics()).map_err(CliError::Diagnostics)?;
        println!("{json}");
    } else {
        println!("{}", image.diagnostics().report());
    }
    Ok(())
}

/// Read the settings file, if any, and apply command-line overrides.
fn load_settings(cli: &Cli) -> Result<Settings, CliError> {
    let mut settings = match cli.config {
        Some(ref path) => {
            let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_str(&text).map_err(|source| CliError::Settings {
                path: path.clone(),
                source,
            })?
        }
        None => Settings::default(),
    };

    if let Some(dpi) = cli.dpi {
        settings.image.dpi = dpi;
    }
    if let Some(passes) = cli.outline_passes {
        settings.outline.passes = passes;
    }
    if let Some(passes) = cli.infill_passes {
        settings.infill.passes = passes;
    }
    Ok(settings)
}

fn write(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_settings() {
        let cli = Cli::parse_from([
            "flatslice",
            "in.png",
            "--dpi",
            "600",
            "--infill-passes",
            "2",
        ]);
        let settings = load_settings(&cli).unwrap();
        assert!((settings.image.dpi - 600.0).abs() < f64::EPSILON);
        assert_eq!(settings.infill.passes, 2);
        assert_eq!(settings.outline.passes, OutlineSettings::DEFAULT_PASSES);
    }

    #[test]
    fn settings_file_sections_are_optional() {
        let settings: Settings =
            serde_json::from_str(r#"{"image": {"dpi": 96}, "machine": {"min_travel": 0.5}}"#)
                .unwrap();
        assert!((settings.image.dpi - 96.0).abs() < f64::EPSILON);
        assert_eq!(settings.image.border, PipelineConfig::DEFAULT_BORDER);
        assert!((settings.machine.min_travel - 0.5).abs() < f64::EPSILON);
        assert_eq!(settings.job().outline, OutlineSettings::default());
    }

    #[test]
    fn dpi_conflicts_with_image_dpi() {
        let parsed = Cli::try_parse_from(["flatslice", "a.png", "--dpi", "300", "--use-image-dpi"]);
        assert!(parsed.is_err());
    }
}
