//! The laser job: four command buffers and the emitter that fills them.
//!
//! Commands go into the buffer of the current [`Phase`]. Phases only move
//! forward: header, outline, infill, footer. Serialization repeats the
//! infill and outline buffers once per configured pass, in the order
//! header, infill, outline, footer, so the fill is burned before the
//! perimeter.
//!
//! The emitter remembers the last position, feed rate and power level
//! and drops commands that would not change any of them. That state is
//! reset whenever a phase begins, so every buffer is self-contained and
//! can be repeated verbatim.
//!
//! Toolpaths are generated in image pixels. [`LaserJob::apply`] converts
//! every buffered move to machine millimetres in one pass at the end.

use std::fmt;

use flatslice_pipeline::Point;

use crate::command::{LaserCommand, Unit, round3};
use crate::config::JobConfig;

/// Errors from building a job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// An operation was issued in a phase that does not allow it.
    #[error("{operation} is not allowed in phase {phase:?}")]
    InvalidPhase {
        /// The rejected operation.
        operation: &'static str,
        /// The phase the job was in.
        phase: Option<Phase>,
    },

    /// Job configuration is invalid.
    #[error("invalid job configuration: {0}")]
    InvalidConfig(String),
}

/// Section of the output a command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    /// Machine setup.
    Header,
    /// Perimeter burns.
    Outline,
    /// Scanline fill burns.
    Infill,
    /// Shutdown and return home.
    Footer,
}

/// Destination of a move. `z` is left untouched when `None`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate, if it should move.
    pub z: Option<f64>,
}

impl Target {
    /// A planar target.
    #[must_use]
    pub const fn xy(x: f64, y: f64) -> Self {
        Self { x, y, z: None }
    }

    /// A target on all three axes.
    #[must_use]
    pub const fn xyz(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z: Some(z) }
    }
}

impl From<Point> for Target {
    fn from(p: Point) -> Self {
        Self::xy(p.x, p.y)
    }
}

/// Last emitted position, used to drop unchanged axes.
#[derive(Debug, Clone, Copy, Default)]
struct Position {
    x: Option<f64>,
    y: Option<f64>,
    z: Option<f64>,
    unit: Option<Unit>,
}

/// A laser job under construction.
#[derive(Debug, Clone)]
pub struct LaserJob {
    config: JobConfig,
    phase: Option<Phase>,
    header: Vec<LaserCommand>,
    outline: Vec<LaserCommand>,
    infill: Vec<LaserCommand>,
    footer: Vec<LaserCommand>,
    position: Position,
    speed: Option<f64>,
    power: Option<u8>,
}

impl LaserJob {
    /// An empty job with no active phase.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidConfig`] if `config` fails validation.
    pub fn new(config: JobConfig) -> Result<Self, JobError> {
        config.validate()?;
        Ok(Self {
            config,
            phase: None,
            header: Vec::new(),
            outline: Vec::new(),
            infill: Vec::new(),
            footer: Vec::new(),
            position: Position::default(),
            speed: None,
            power: None,
        })
    }

    /// The configuration this job was built with.
    #[must_use]
    pub const fn config(&self) -> &JobConfig {
        &self.config
    }

    /// The active phase, if any has begun.
    #[must_use]
    pub const fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Commands buffered for `phase`.
    #[must_use]
    pub fn commands(&self, phase: Phase) -> &[LaserCommand] {
        match phase {
            Phase::Header => &self.header,
            Phase::Outline => &self.outline,
            Phase::Infill => &self.infill,
            Phase::Footer => &self.footer,
        }
    }

    /// Start the header: identification comments and machine setup.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] if any phase has already begun.
    pub fn begin_header(&mut self) -> Result<(), JobError> {
        self.enter(Phase::Header, "begin_header")?;
        self.comment("")?;
        self.comment(concat!("Generated with flatslice ", env!("CARGO_PKG_VERSION")))?;
        self.comment("")?;
        self.comment("Header")?;
        self.power(self.config.machine.min_power)?;
        self.speed(self.config.machine.travel_speed)?;
        self.gcode("G21")?; // millimetres
        self.gcode("G90")?; // absolute positioning
        self.gcode("M18 S10")?; // steppers off after 10 s idle
        self.gcode("M201 X5000.00 Y5000.00")?; // max acceleration
        self.gcode("M204 T5000.00")?; // travel acceleration
        self.comment("")?;
        self.comment("Content")
    }

    /// Start the outline buffer.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] if outline, infill or footer
    /// has already begun.
    pub fn begin_outline(&mut self) -> Result<(), JobError> {
        self.enter(Phase::Outline, "begin_outline")
    }

    /// Start the infill buffer.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] if infill or footer has already
    /// begun.
    pub fn begin_infill(&mut self) -> Result<(), JobError> {
        self.enter(Phase::Infill, "begin_infill")
    }

    /// Start the footer: laser off and return to the origin.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] if the footer has already begun.
    pub fn end(&mut self) -> Result<(), JobError> {
        self.enter(Phase::Footer, "end")?;
        self.comment("")?;
        self.comment("Footer")?;
        self.power_off()?;
        self.speed(self.config.machine.travel_speed)?;
        self.move_to(Target::xyz(0.0, 0.0, 0.0), Unit::Millimeter, true)
    }

    fn enter(&mut self, phase: Phase, operation: &'static str) -> Result<(), JobError> {
        if self.phase.is_some_and(|current| current >= phase) {
            return Err(JobError::InvalidPhase {
                operation,
                phase: self.phase,
            });
        }
        self.phase = Some(phase);
        self.position = Position::default();
        self.speed = None;
        self.power = None;
        Ok(())
    }

    fn push(&mut self, command: LaserCommand, operation: &'static str) -> Result<(), JobError> {
        let buffer = match self.phase {
            Some(Phase::Header) => &mut self.header,
            Some(Phase::Outline) => &mut self.outline,
            Some(Phase::Infill) => &mut self.infill,
            Some(Phase::Footer) => &mut self.footer,
            None => {
                return Err(JobError::InvalidPhase {
                    operation,
                    phase: None,
                });
            }
        };
        buffer.push(command);
        Ok(())
    }

    /// Append a comment line.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn comment(&mut self, text: &str) -> Result<(), JobError> {
        self.push(LaserCommand::comment(text), "comment")
    }

    /// Append a raw G-code line.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn gcode(&mut self, line: &str) -> Result<(), JobError> {
        self.push(LaserCommand::Raw(line.to_owned()), "gcode")
    }

    /// Dwell for `ms` milliseconds.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn wait(&mut self, ms: u64) -> Result<(), JobError> {
        self.push(LaserCommand::wait(ms), "wait")
    }

    /// Move to `target`, emitting only the axes that changed.
    ///
    /// A move in a different unit from the last one emits every axis.
    /// A move that changes nothing is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn move_to(&mut self, target: Target, unit: Unit, rapid: bool) -> Result<(), JobError> {
        let same_frame = self.position.unit == Some(unit);
        let changed = |last: Option<f64>, next: f64| (!same_frame || last != Some(next)).then_some(next);

        let x = changed(self.position.x, target.x);
        let y = changed(self.position.y, target.y);
        let z = target.z.and_then(|z| changed(self.position.z, z));
        if x.is_none() && y.is_none() && z.is_none() {
            return Ok(());
        }

        self.push(
            LaserCommand::Move {
                x,
                y,
                z,
                unit,
                rapid,
            },
            "move",
        )?;
        if !same_frame {
            self.position = Position {
                unit: Some(unit),
                ..Position::default()
            };
        }
        self.position.x = Some(target.x);
        self.position.y = Some(target.y);
        if target.z.is_some() {
            self.position.z = target.z;
        }
        Ok(())
    }

    /// Set the feed rate from mm/s. Unchanged rates are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn speed(&mut self, mm_per_s: f64) -> Result<(), JobError> {
        let feed = round3(mm_per_s * 60.0);
        if self.speed == Some(feed) {
            return Ok(());
        }
        self.push(LaserCommand::feed(feed), "speed")?;
        self.speed = Some(feed);
        Ok(())
    }

    /// Set laser power from a 0-100 percentage. Unchanged levels are
    /// dropped; a change is preceded by `M400` so it takes effect after
    /// queued moves finish.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn power(&mut self, percent: f64) -> Result<(), JobError> {
        let level = power_level(percent);
        if self.power == Some(level) {
            return Ok(());
        }
        self.push(LaserCommand::Raw("M400".to_owned()), "power")?;
        let command = LaserCommand::power(&self.config.machine.laser_on, level);
        self.push(command, "power")?;
        self.power = Some(level);
        Ok(())
    }

    /// Turn the laser off. The next [`power`](Self::power) call always
    /// emits.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn power_off(&mut self) -> Result<(), JobError> {
        let command = LaserCommand::Raw(self.config.machine.laser_off.clone());
        self.push(command, "power_off")?;
        self.power = None;
        Ok(())
    }

    /// Rapid move with the laser at travel power.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] before any phase has begun.
    pub fn travel(&mut self, target: Target, unit: Unit) -> Result<(), JobError> {
        self.power(self.config.machine.min_power)?;
        self.speed(self.config.machine.travel_speed)?;
        self.move_to(target, unit, true)
    }

    /// Burning move at the current phase's speed and power.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidPhase`] outside the outline and infill
    /// phases.
    pub fn burn(&mut self, target: Target, unit: Unit) -> Result<(), JobError> {
        let (speed, power) = match self.phase {
            Some(Phase::Outline) => (self.config.outline.speed, self.config.outline.power),
            Some(Phase::Infill) => (self.config.infill.speed, self.config.infill.power),
            phase => {
                return Err(JobError::InvalidPhase {
                    operation: "burn",
                    phase,
                });
            }
        };
        self.speed(speed)?;
        self.power(power)?;
        self.move_to(target, unit, false)
    }

    /// Convert every buffered move to machine coordinates.
    ///
    /// Pixel moves are scaled by `pixel_to_mm` and flipped vertically
    /// (`y = height - y`, image origin top-left, machine origin
    /// bottom-left). Pixel and millimetre moves then get the machine
    /// offset. Moves already in machine coordinates are left alone, so
    /// calling this twice is harmless.
    ///
    /// Axes whose converted value prints the same as the previous move in
    /// the buffer are dropped afterwards, along with moves left empty.
    pub fn apply(&mut self, image_height_px: f64, pixel_to_mm: f64) {
        let height_mm = image_height_px * pixel_to_mm;
        let offset = self.config.machine.offset;
        for buffer in [
            &mut self.header,
            &mut self.outline,
            &mut self.infill,
            &mut self.footer,
        ] {
            for command in buffer.iter_mut() {
                let LaserCommand::Move { x, y, z, unit, .. } = command else {
                    continue;
                };
                match *unit {
                    Unit::Pixel => {
                        *x = x.map(|v| v.mul_add(pixel_to_mm, offset.x));
                        *y = y.map(|v| v.mul_add(-pixel_to_mm, height_mm) + offset.y);
                        *z = z.map(|v| v.mul_add(pixel_to_mm, offset.z));
                    }
                    Unit::Millimeter => {
                        *x = x.map(|v| v + offset.x);
                        *y = y.map(|v| v + offset.y);
                        *z = z.map(|v| v + offset.z);
                    }
                    Unit::Machine => continue,
                }
                *unit = Unit::Machine;
            }
            drop_unchanged_axes(buffer);
        }
    }

    /// Every command in output order, passes expanded.
    pub fn ordered_commands(&self) -> impl Iterator<Item = &LaserCommand> {
        let infill_passes = self.config.infill.passes as usize;
        let outline_passes = self.config.outline.passes as usize;
        self.header
            .iter()
            .chain(std::iter::repeat_n(self.infill.as_slice(), infill_passes).flatten())
            .chain(std::iter::repeat_n(self.outline.as_slice(), outline_passes).flatten())
            .chain(&self.footer)
            .filter(|c| c.is_effective())
    }
}

impl fmt::Display for LaserJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, command) in self.ordered_commands().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{command}")?;
        }
        Ok(())
    }
}

/// Clear axes that round to the value last written for them and remove
/// moves with no axis left. Tracking starts empty for every buffer since
/// each phase starts from an unknown position.
fn drop_unchanged_axes(buffer: &mut Vec<LaserCommand>) {
    let mut last: [Option<f64>; 3] = [None; 3];
    for command in buffer.iter_mut() {
        let LaserCommand::Move { x, y, z, .. } = command else {
            continue;
        };
        for (axis, seen) in [x, y, z].into_iter().zip(last.iter_mut()) {
            let Some(value) = *axis else { continue };
            let rounded = round3(value);
            if *seen == Some(rounded) {
                *axis = None;
            } else {
                *seen = Some(rounded);
            }
        }
    }
    buffer.retain(LaserCommand::is_effective);
}

/// Quantize a 0-100 percentage to the 0-255 device range, truncating.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn power_level(percent: f64) -> u8 {
    let clamped = if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    };
    (clamped / 100.0 * 255.0) as u8
}
