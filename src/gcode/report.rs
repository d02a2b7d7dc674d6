//! Lenient parser for `M114` position reports.
//!
//! The link is noisy, so a corrupted token must never abort a session. A
//! report is a whitespace separated run of `KEY:VALUE` tokens; only `X`, `Y`
//! and `Z` are used. An unreadable value for one of those keys, or a missing
//! key, degrades that axis to `0.0`. Each axis keeps a record of how its value
//! was obtained so callers can tell a real zero from a degraded one.

use crate::motion::{Axis, Position};

/// How one axis of a report was read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AxisReading {
    Parsed(f64),
    /// The key was present but its value was not a number.
    Malformed,
    Missing,
}

impl AxisReading {
    pub fn value(self) -> f64 {
        match self {
            AxisReading::Parsed(v) => v,
            AxisReading::Malformed | AxisReading::Missing => 0.0,
        }
    }

    pub fn is_valid(self) -> bool {
        matches!(self, AxisReading::Parsed(_))
    }
}

/// Start of Marlin's stepper count suffix in an `M114` reply.
const STEP_COUNT_MARKER: &str = "Count";

#[derive(Debug, Clone, PartialEq)]
pub struct PositionReport {
    pub x: AxisReading,
    pub y: AxisReading,
    pub z: AxisReading,
}

impl PositionReport {
    /// Parse one reply line. Never fails.
    ///
    /// Marlin appends stepper counts (`Count X:800 ...`) after the
    /// coordinates; everything from the `Count` token on is ignored. A
    /// repeated key only replaces a reading that was not a usable number.
    pub fn parse(line: &str) -> Self {
        let mut report = Self {
            x: AxisReading::Missing,
            y: AxisReading::Missing,
            z: AxisReading::Missing,
        };
        for token in line.split_whitespace() {
            if token == STEP_COUNT_MARKER {
                break;
            }
            let Some((key, value)) = token.split_once(':') else {
                continue;
            };
            let axis = match key {
                "X" => Axis::X,
                "Y" => Axis::Y,
                "Z" => Axis::Z,
                _ => continue,
            };
            let slot = report.reading_mut(axis);
            if slot.is_valid() {
                continue;
            }
            *slot = match value.parse::<f64>() {
                Ok(v) if v.is_finite() => AxisReading::Parsed(v),
                _ => AxisReading::Malformed,
            };
        }
        report
    }

    pub fn reading(&self, axis: Axis) -> AxisReading {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    fn reading_mut(&mut self, axis: Axis) -> &mut AxisReading {
        match axis {
            Axis::X => &mut self.x,
            Axis::Y => &mut self.y,
            Axis::Z => &mut self.z,
        }
    }

    /// Position with degraded axes zeroed.
    pub fn position(&self) -> Position {
        Position::new(self.x.value(), self.y.value(), self.z.value())
    }

    /// Axes that did not carry a usable number.
    pub fn degraded_axes(&self) -> Vec<Axis> {
        Axis::ALL
            .into_iter()
            .filter(|axis| !self.reading(*axis).is_valid())
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        !self.degraded_axes().is_empty()
    }
}
