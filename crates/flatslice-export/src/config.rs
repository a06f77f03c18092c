//! Job settings: passes, power and speed per toolpath, plus the machine
//! description.
//!
//! Speeds are mm/s, power is a percentage, distances are millimetres.

use serde::{Deserialize, Serialize};

use crate::job::JobError;

/// Settings for the perimeter toolpath.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlineSettings {
    /// How many times the outline is burned. Zero skips it.
    pub passes: u32,
    /// Laser power, 0-100.
    pub power: f64,
    /// Burn speed in mm/s.
    pub speed: f64,
}

impl OutlineSettings {
    /// Default number of outline passes.
    pub const DEFAULT_PASSES: u32 = 1;
    /// Default outline power.
    pub const DEFAULT_POWER: f64 = 100.0;
    /// Default outline speed.
    pub const DEFAULT_SPEED: f64 = 20.0;
}

impl Default for OutlineSettings {
    fn default() -> Self {
        Self {
            passes: Self::DEFAULT_PASSES,
            power: Self::DEFAULT_POWER,
            speed: Self::DEFAULT_SPEED,
        }
    }
}

/// Settings for the scanline fill toolpath.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfillSettings {
    /// How many times the infill is burned. Zero skips it.
    pub passes: u32,
    /// Laser power, 0-100.
    pub power: f64,
    /// Burn speed in mm/s.
    pub speed: f64,
    /// Distance between scanlines in mm.
    pub line_spacing: f64,
    /// Nearest-neighbour search stops at the first segment end closer
    /// than this, in mm.
    pub good_enough: f64,
}

impl InfillSettings {
    /// Default number of infill passes.
    pub const DEFAULT_PASSES: u32 = 0;
    /// Default infill power.
    pub const DEFAULT_POWER: f64 = 70.0;
    /// Default infill speed.
    pub const DEFAULT_SPEED: f64 = 15.0;
    /// Default scanline spacing.
    pub const DEFAULT_LINE_SPACING: f64 = 0.1;
    /// Default early-exit distance for segment stitching.
    pub const DEFAULT_GOOD_ENOUGH: f64 = 0.15;
}

impl Default for InfillSettings {
    fn default() -> Self {
        Self {
            passes: Self::DEFAULT_PASSES,
            power: Self::DEFAULT_POWER,
            speed: Self::DEFAULT_SPEED,
            line_spacing: Self::DEFAULT_LINE_SPACING,
            good_enough: Self::DEFAULT_GOOD_ENOUGH,
        }
    }
}

/// Fixed machine offset added to every coordinate, in mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Offset {
    /// X offset.
    pub x: f64,
    /// Y offset.
    pub y: f64,
    /// Z offset.
    pub z: f64,
}

impl Default for Offset {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 20.0,
        }
    }
}

/// Description of the machine the job runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSettings {
    /// Laser on command. `{power}` is replaced by the 0-255 level.
    pub laser_on: String,
    /// Laser off command.
    pub laser_off: String,
    /// Power used while travelling, 0-100.
    pub min_power: f64,
    /// Offset from the machine origin to the work origin.
    pub offset: Offset,
    /// Travel speed in mm/s.
    pub travel_speed: f64,
    /// Gaps between infill segments shorter than this (mm) are burned
    /// through instead of travelled.
    pub min_travel: f64,
}

impl MachineSettings {
    /// Default laser on template.
    pub const DEFAULT_LASER_ON: &'static str = "M106 P1 S{power}";
    /// Default laser off command.
    pub const DEFAULT_LASER_OFF: &'static str = "M107 P1";
    /// Default travel power.
    pub const DEFAULT_MIN_POWER: f64 = 1.0;
    /// Default travel speed.
    pub const DEFAULT_TRAVEL_SPEED: f64 = 100.0;
    /// Default minimum travel distance.
    pub const DEFAULT_MIN_TRAVEL: f64 = 0.12;
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            laser_on: Self::DEFAULT_LASER_ON.to_owned(),
            laser_off: Self::DEFAULT_LASER_OFF.to_owned(),
            min_power: Self::DEFAULT_MIN_POWER,
            offset: Offset::default(),
            travel_speed: Self::DEFAULT_TRAVEL_SPEED,
            min_travel: Self::DEFAULT_MIN_TRAVEL,
        }
    }
}

/// Everything a [`LaserJob`](crate::LaserJob) needs, resolved once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobConfig {
    /// Perimeter toolpath.
    pub outline: OutlineSettings,
    /// Scanline fill toolpath.
    pub infill: InfillSettings,
    /// Machine description.
    pub machine: MachineSettings,
}

impl JobConfig {
    /// Check the invariants job generation relies on.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), JobError> {
        let checks = [
            ("outline.power", self.outline.power, Bound::Percent),
            ("outline.speed", self.outline.speed, Bound::Positive),
            ("infill.power", self.infill.power, Bound::Percent),
            ("infill.speed", self.infill.speed, Bound::Positive),
            ("infill.line_spacing", self.infill.line_spacing, Bound::Positive),
            ("infill.good_enough", self.infill.good_enough, Bound::NonNegative),
            ("machine.min_power", self.machine.min_power, Bound::Percent),
            ("machine.travel_speed", self.machine.travel_speed, Bound::Positive),
            ("machine.min_travel", self.machine.min_travel, Bound::NonNegative),
            ("machine.offset.x", self.machine.offset.x, Bound::Finite),
            ("machine.offset.y", self.machine.offset.y, Bound::Finite),
            ("machine.offset.z", self.machine.offset.z, Bound::Finite),
        ];
        for (name, value, bound) in checks {
            if !bound.admits(value) {
                return Err(JobError::InvalidConfig(format!(
                    "{name} must be {}, got {value}",
                    bound.describe()
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Bound {
    Finite,
    NonNegative,
    Positive,
    Percent,
}

impl Bound {
    fn admits(self, value: f64) -> bool {
        value.is_finite()
            && match self {
                Self::Finite => true,
                Self::NonNegative => value >= 0.0,
                Self::Positive => value > 0.0,
                Self::Percent => (0.0..=100.0).contains(&value),
            }
    }

    const fn describe(self) -> &'static str {
        match self {
            Self::Finite => "finite",
            Self::NonNegative => "non-negative",
            Self::Positive => "positive",
            Self::Percent => "between 0 and 100",
        }
    }
}
