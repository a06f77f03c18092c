//! flatslice-export: traced polygons to machine output (sans-IO)
//!
//! [`generate`] turns polygons into a [`LaserJob`] whose `Display` is the
//! G-code program. [`to_svg`] renders the same polygons as a preview.

pub mod command;
pub mod config;
pub mod job;
pub mod svg;
pub mod toolpath;

pub use command::{LaserCommand, Unit};
pub use config::{InfillSettings, JobConfig, MachineSettings, Offset, OutlineSettings};
pub use job::{JobError, LaserJob, Phase, Target, power_level};
pub use svg::{SvgMetadata, build_path_data, to_svg};
pub use toolpath::{FillSegment, generate};
