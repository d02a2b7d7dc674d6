// src/motion/tracker.rs - Host-side belief of where the probe is
use super::{quantize, Axis, Position};
use crate::gcode::PositionReport;

/// Where the tracked position last came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingSource {
    /// Nothing known yet; the tracker sits at the origin.
    Initial,
    /// Set to a commanded target without asking the machine.
    Commanded,
    /// Overwritten from a position report.
    Reported,
}

#[derive(Debug, Clone)]
pub struct PositionTracker {
    position: Position,
    source: TrackingSource,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self {
            position: Position::origin(),
            source: TrackingSource::Initial,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn source(&self) -> TrackingSource {
        self.source
    }

    /// Optimistic update after a single-axis move was issued.
    pub fn commanded_axis(&mut self, axis: Axis, target: f64) {
        self.position.set(axis, quantize(target));
        self.source = TrackingSource::Commanded;
    }

    /// Optimistic update after a full move was issued.
    pub fn commanded(&mut self, target: Position) {
        for axis in Axis::ALL {
            self.position.set(axis, quantize(target.get(axis)));
        }
        self.source = TrackingSource::Commanded;
    }

    /// Authoritative update. Degraded axes are taken as reported (`0.0`).
    pub fn reported(&mut self, report: &PositionReport) {
        self.position = report.position();
        self.source = TrackingSource::Reported;
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}
