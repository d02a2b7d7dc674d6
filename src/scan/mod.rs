//! Rectangle scan workflow.
//!
//! ```text
//! AwaitingCalibration -> Calibrating -> GridGenerated -> Measuring -> Complete
//!                             |                            |  ^
//!                             v                            v  |
//!                          Aborted  <------------------  Aborting
//! ```
//!
//! The operator first jogs the probe to the scan origin and accepts it. The
//! grid is laid out from that point and the probe visits each grid point at
//! the accepted height; the operator lowers it onto the part, saves the
//! reading and moves on. Saving the last point writes the file and parks
//! the machine.

pub mod grid;

pub use grid::{GridError, GridPoint, ScanGrid, MAX_GRID_POINTS};

use std::path::PathBuf;

use crate::config::ScanConfig;
use crate::file_manager;
use crate::gcode::PositionReport;
use crate::input::{Direction, ScanInput};
use crate::motion::{Axis, MotionController, Position};
use crate::session::SessionError;
use crate::store::ScanSlots;

/// Calibration nudge along Z, in mm.
pub const CALIBRATION_Z_STEP: f64 = 1.0;
/// Calibration nudge along X and Y, in mm.
pub const CALIBRATION_XY_STEP: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    AwaitingCalibration,
    Calibrating,
    GridGenerated,
    Measuring,
    /// Quit requested, waiting for yes/no.
    Aborting,
    Complete,
    Aborted,
}

impl ScanState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanState::Complete | ScanState::Aborted)
    }
}

/// What one input did.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanStep {
    /// The input had no meaning in the current state.
    Ignored,
    Moved(Position),
    /// Navigation past either end of the grid; nothing was sent.
    Clamped,
    Verified(PositionReport),
    Accepted { start: Position, points: usize },
    Saved { index: usize, position: Position },
    ConfirmQuit,
    Reprompt,
    QuitCancelled,
    Completed { rows: usize, unset: usize },
    Aborted,
}

#[derive(Debug)]
pub struct RectangleScan {
    state: ScanState,
    layout: ScanConfig,
    output: PathBuf,
    grid: Option<ScanGrid>,
    slots: ScanSlots,
    index: usize,
}

impl RectangleScan {
    pub fn new(layout: ScanConfig, output: PathBuf) -> Self {
        Self {
            state: ScanState::AwaitingCalibration,
            layout,
            output,
            grid: None,
            slots: ScanSlots::new(0),
            index: 0,
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn grid(&self) -> Option<&ScanGrid> {
        self.grid.as_ref()
    }

    pub fn slots(&self) -> &ScanSlots {
        &self.slots
    }

    /// Index of the grid point the probe is parked over.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn output(&self) -> &PathBuf {
        &self.output
    }

    /// Hand control to the operator for calibration.
    pub fn begin_calibration(&mut self) {
        if self.state == ScanState::AwaitingCalibration {
            tracing::info!("Initial calibration");
            self.state = ScanState::Calibrating;
        }
    }

    pub async fn handle(
        &mut self,
        motion: &mut MotionController,
        input: ScanInput,
    ) -> Result<ScanStep, SessionError> {
        match self.state {
            ScanState::Calibrating => self.calibrating(motion, input).await,
            ScanState::Measuring => self.measuring(motion, input).await,
            ScanState::Aborting => Ok(self.aborting(input)),
            ScanState::AwaitingCalibration
            | ScanState::GridGenerated
            | ScanState::Complete
            | ScanState::Aborted => Ok(ScanStep::Ignored),
        }
    }

    async fn calibrating(
        &mut self,
        motion: &mut MotionController,
        input: ScanInput,
    ) -> Result<ScanStep, SessionError> {
        match input {
            ScanInput::Calibrate(axis, direction) => {
                let step = match axis {
                    Axis::Z => CALIBRATION_Z_STEP,
                    Axis::X | Axis::Y => CALIBRATION_XY_STEP,
                };
                motion.jog(axis, step * direction.sign()).await?;
                Ok(ScanStep::Moved(motion.position()))
            }
            ScanInput::Accept => self.accept(motion).await,
            ScanInput::Verify => Ok(ScanStep::Verified(motion.sync_position().await?)),
            ScanInput::Quit => {
                tracing::info!("Scan abandoned during calibration");
                self.state = ScanState::Aborted;
                Ok(ScanStep::Aborted)
            }
            _ => Ok(ScanStep::Ignored),
        }
    }

    async fn accept(&mut self, motion: &mut MotionController) -> Result<ScanStep, SessionError> {
        let start = motion.position();
        tracing::info!("Accepted start position {}", start);
        self.state = ScanState::GridGenerated;

        let grid = ScanGrid::generate(
            start,
            self.layout.points_x,
            self.layout.points_y,
            self.layout.dist_x,
            self.layout.dist_y,
        )?;
        let points = grid.len();
        tracing::info!(
            "Generated {} x {} grid ({} points)",
            self.layout.points_x,
            self.layout.points_y,
            points
        );
        self.slots = ScanSlots::new(points);
        self.grid = Some(grid);
        self.index = 0;
        self.state = ScanState::Measuring;

        self.goto_current(motion).await?;
        Ok(ScanStep::Accepted { start, points })
    }

    async fn measuring(
        &mut self,
        motion: &mut MotionController,
        input: ScanInput,
    ) -> Result<ScanStep, SessionError> {
        match input {
            ScanInput::AdjustZ(step, direction) => {
                motion.jog(Axis::Z, step.size() * direction.sign()).await?;
                Ok(ScanStep::Moved(motion.position()))
            }
            ScanInput::Next => self.navigate(motion, Direction::Positive).await,
            ScanInput::Previous => self.navigate(motion, Direction::Negative).await,
            ScanInput::Save => self.save(motion).await,
            ScanInput::Verify => Ok(ScanStep::Verified(motion.sync_position().await?)),
            ScanInput::Quit => {
                self.state = ScanState::Aborting;
                Ok(ScanStep::ConfirmQuit)
            }
            _ => Ok(ScanStep::Ignored),
        }
    }

    fn aborting(&mut self, input: ScanInput) -> ScanStep {
        match input {
            ScanInput::Confirm(true) => {
                tracing::info!(
                    "Scan aborted with {} of {} points saved",
                    self.slots.len() - self.slots.unset_count(),
                    self.slots.len()
                );
                self.state = ScanState::Aborted;
                ScanStep::Aborted
            }
            ScanInput::Confirm(false) => {
                self.state = ScanState::Measuring;
                ScanStep::QuitCancelled
            }
            _ => ScanStep::Reprompt,
        }
    }

    async fn navigate(
        &mut self,
        motion: &mut MotionController,
        direction: Direction,
    ) -> Result<ScanStep, SessionError> {
        let target = match direction {
            Direction::Positive if self.index + 1 < self.slots.len() => self.index + 1,
            Direction::Negative if self.index > 0 => self.index - 1,
            _ => return Ok(ScanStep::Clamped),
        };
        self.index = target;
        self.goto_current(motion).await?;
        Ok(ScanStep::Moved(motion.position()))
    }

    async fn save(&mut self, motion: &mut MotionController) -> Result<ScanStep, SessionError> {
        let position = motion.position();
        let index = self.index;
        if let Some(previous) = self.slots.record(index, position) {
            tracing::info!("Point {} re-measured (was {})", index, previous);
        }
        tracing::info!("Saved point {}: {}", index, position);

        if index + 1 < self.slots.len() {
            self.index += 1;
            self.goto_current(motion).await?;
            Ok(ScanStep::Saved { index, position })
        } else {
            self.complete(motion).await
        }
    }

    async fn complete(&mut self, motion: &mut MotionController) -> Result<ScanStep, SessionError> {
        self.state = ScanState::Complete;
        let unset = self.slots.unset_count();
        if unset > 0 {
            tracing::warn!(
                "{} of {} grid points were never saved, writing them as {}",
                unset,
                self.slots.len(),
                file_manager::UNSET_SENTINEL
            );
        }
        tracing::info!("All points complete, saving to {}", self.output.display());
        let written = file_manager::write_datapoints(&self.output, self.slots.rows()).await;

        let start = self.grid.as_ref().map(ScanGrid::start).unwrap_or_default();
        motion.park(&start).await?;

        let rows = written.inspect_err(|e| {
            tracing::error!("Failed to save scan to {}: {}", self.output.display(), e);
            for (index, row) in self.slots.rows().iter().enumerate() {
                match row {
                    Some(p) => tracing::error!("Unsaved point {}: {}", index, p),
                    None => tracing::error!("Unsaved point {}: never measured", index),
                }
            }
        })?;
        Ok(ScanStep::Completed { rows, unset })
    }

    /// Move to the current grid point at the scan height. Any Z adjustment
    /// made at the previous point is dropped.
    async fn goto_current(&mut self, motion: &mut MotionController) -> Result<(), SessionError> {
        let Some(grid) = self.grid.as_ref() else {
            return Ok(());
        };
        let Some(point) = grid.get(self.index) else {
            return Ok(());
        };
        tracing::debug!("Going to grid point {} ({}, {})", self.index, point.x, point.y);
        motion.move_to_point(point.x, point.y, grid.start_z()).await?;
        Ok(())
    }
}
