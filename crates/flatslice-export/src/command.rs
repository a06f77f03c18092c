//! Machine commands and their G-code text.
//!
//! A job is a list of [`LaserCommand`]s. Motion is kept structured until
//! serialization so that coordinates can be transformed after the
//! toolpath has been generated; everything else is raw text.

use std::fmt;

/// Coordinate frame a [`LaserCommand::Move`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    /// Image pixels, origin top-left, y down.
    Pixel,
    /// Millimetres in the machine frame, before the machine offset.
    Millimeter,
    /// Final machine coordinates: millimetres with the offset applied.
    Machine,
}

/// One output command.
#[derive(Debug, Clone, PartialEq)]
pub enum LaserCommand {
    /// Linear move. Only axes that changed are present.
    Move {
        /// Absolute X, if it changed.
        x: Option<f64>,
        /// Absolute Y, if it changed.
        y: Option<f64>,
        /// Absolute Z, if it changed.
        z: Option<f64>,
        /// Frame of the coordinates.
        unit: Unit,
        /// `G0` (laser off, fastest) instead of `G1`.
        rapid: bool,
    },
    /// Verbatim line: comments and fixed G-code.
    Raw(String),
}

impl LaserCommand {
    /// A `; text` comment. An empty comment becomes a blank line.
    #[must_use]
    pub fn comment(text: &str) -> Self {
        if text.is_empty() {
            Self::Raw(String::new())
        } else {
            Self::Raw(format!("; {text}"))
        }
    }

    /// Feed rate change, in mm/min.
    #[must_use]
    pub fn feed(mm_per_min: f64) -> Self {
        Self::Raw(format!("G1 F{}", format_number(mm_per_min)))
    }

    /// Laser power command built from a `{power}` template.
    #[must_use]
    pub fn power(template: &str, level: u8) -> Self {
        Self::Raw(template.replace("{power}", &level.to_string()))
    }

    /// Dwell for `ms` milliseconds.
    #[must_use]
    pub fn wait(ms: u64) -> Self {
        Self::Raw(format!("G4 P{ms}"))
    }

    /// `false` for moves that carry no axis; those are never written.
    #[must_use]
    pub const fn is_effective(&self) -> bool {
        match self {
            Self::Move { x, y, z, .. } => x.is_some() || y.is_some() || z.is_some(),
            Self::Raw(_) => true,
        }
    }
}

impl fmt::Display for LaserCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Move {
                x, y, z, rapid, ..
            } => {
                f.write_str(if *rapid { "G0" } else { "G1" })?;
                for (axis, value) in [('X', x), ('Y', y), ('Z', z)] {
                    if let Some(v) = value {
                        write!(f, " {axis}{}", format_number(*v))?;
                    }
                }
                Ok(())
            }
            Self::Raw(text) => f.write_str(text),
        }
    }
}

/// Round to 3 decimals and format with at least one fractional digit:
/// `10.0`, `1.5`, `0.123`.
#[must_use]
pub fn format_number(value: f64) -> String {
    let rounded = round3(value);
    // Avoid printing "-0.0".
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    if rounded.fract() == 0.0 {
        format!("{rounded:.1}")
    } else {
        format!("{rounded}")
    }
}

/// Round to 3 decimal places.
#[must_use]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
