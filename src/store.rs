// src/store.rs - Captured datapoints for both workflows
use crate::motion::Position;

/// One slot per grid point, filled as the operator saves measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanSlots {
    slots: Vec<Option<Position>>,
}

impl ScanSlots {
    pub fn new(len: usize) -> Self {
        Self {
            slots: vec![None; len],
        }
    }

    /// Store a measurement, returning whatever it replaced.
    pub fn record(&mut self, index: usize, position: Position) -> Option<Position> {
        match self.slots.get_mut(index) {
            Some(slot) => slot.replace(position),
            None => {
                tracing::warn!("Ignoring datapoint for slot {} of {}", index, self.slots.len());
                None
            }
        }
    }

    pub fn get(&self, index: usize) -> Option<Position> {
        self.slots.get(index).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn unset_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_none()).count()
    }

    /// Rows in grid order; `None` marks a point that was never saved.
    pub fn rows(&self) -> &[Option<Position>] {
        &self.slots
    }
}

/// Append-only sequence of points captured in free mode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureLog {
    points: Vec<Position>,
}

impl CaptureLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn capture(&mut self, position: Position) {
        self.points.push(position);
    }

    /// Drop the most recent point. Nothing happens on an empty log.
    pub fn undo(&mut self) -> Option<Position> {
        let removed = self.points.pop();
        if removed.is_none() {
            tracing::debug!("Undo with no captured points");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[Position] {
        &self.points
    }

    pub fn last(&self) -> Option<Position> {
        self.points.last().copied()
    }

    /// Rows in capture order, in the same shape as [`ScanSlots::rows`].
    pub fn rows(&self) -> Vec<Option<Position>> {
        self.points.iter().copied().map(Some).collect()
    }
}
