//! Scan grid planner.
//!
//! Points are laid out X-major, Y-minor: point `(i, j)` sits at index
//! `i * count_y + j`. Navigation and the output file both depend on this
//! order.

use thiserror::Error;

use crate::motion::Position;

/// Largest grid a scan will lay out. Every point is visited by hand.
pub const MAX_GRID_POINTS: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("Need at least 2 points per axis, got {count_x} x {count_y}")]
    TooFewPoints { count_x: usize, count_y: usize },
    #[error("Span must be finite, got {span_x} x {span_y}")]
    InvalidSpan { span_x: f64, span_y: f64 },
    #[error("Grid of {count_x} x {count_y} exceeds {max} points", max = MAX_GRID_POINTS)]
    TooManyPoints { count_x: usize, count_y: usize },
}

/// Planar target of one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub x: f64,
    pub y: f64,
}

/// Immutable set of scan targets plus the height every move is made at.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanGrid {
    points: Vec<GridPoint>,
    start: Position,
    count_x: usize,
    count_y: usize,
}

impl ScanGrid {
    /// Lay out `count_x * count_y` points covering `span_x` by `span_y`
    /// from `start`.
    pub fn generate(
        start: Position,
        count_x: usize,
        count_y: usize,
        span_x: f64,
        span_y: f64,
    ) -> Result<Self, GridError> {
        if count_x < 2 || count_y < 2 {
            return Err(GridError::TooFewPoints { count_x, count_y });
        }
        if !span_x.is_finite() || !span_y.is_finite() {
            return Err(GridError::InvalidSpan { span_x, span_y });
        }

        let total = count_x
            .checked_mul(count_y)
            .filter(|total| *total <= MAX_GRID_POINTS)
            .ok_or(GridError::TooManyPoints { count_x, count_y })?;

        let step = |index: usize, count: usize, span: f64| index as f64 / (count - 1) as f64 * span;
        let mut points = Vec::with_capacity(total);
        for i in 0..count_x {
            let x = start.x + step(i, count_x, span_x);
            for j in 0..count_y {
                let y = start.y + step(j, count_y, span_y);
                points.push(GridPoint { x, y });
            }
        }

        Ok(Self {
            points,
            start,
            count_x,
            count_y,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    pub fn get(&self, index: usize) -> Option<GridPoint> {
        self.points.get(index).copied()
    }

    /// Calibrated start position; its Z is the travel height for the scan.
    pub fn start(&self) -> Position {
        self.start
    }

    pub fn start_z(&self) -> f64 {
        self.start.z
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.count_x, self.count_y)
    }

    pub fn index_of(&self, i: usize, j: usize) -> Option<usize> {
        (i < self.count_x && j < self.count_y).then(|| i * self.count_y + j)
    }

    /// `(i, j)` grid coordinates of a storage index.
    pub fn coords_of(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.points.len()).then(|| (index / self.count_y, index % self.count_y))
    }
}
