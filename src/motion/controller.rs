// src/motion/controller.rs - Issues moves and keeps the tracker in step
use super::tracker::PositionTracker;
use super::{Axis, Position};
use crate::gcode::{self, GcodeLink, PositionReport};
use crate::hardware::LinkError;

/// Owns the link and the tracked position for one session.
///
/// Moves update the tracker optimistically; [`MotionController::sync_position`]
/// is the only way a device report reaches it.
#[derive(Debug)]
pub struct MotionController {
    link: GcodeLink,
    tracker: PositionTracker,
}

impl MotionController {
    pub fn new(link: GcodeLink) -> Self {
        Self {
            link,
            tracker: PositionTracker::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.tracker.position()
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn link(&self) -> &GcodeLink {
        &self.link
    }

    /// Open the link, run the startup sequence and read back where the
    /// machine ended up.
    pub async fn start(&mut self) -> Result<PositionReport, LinkError> {
        self.link.open().await?;
        tracing::info!("Sending startup G-code");
        self.link.send(gcode::STARTUP_SEQUENCE).await?;
        self.sync_position().await
    }

    /// Send arbitrary G-code without touching the tracker.
    pub async fn send_raw(&mut self, command: &str) -> Result<(), LinkError> {
        self.link.send(command).await
    }

    /// Move a single axis to an absolute target.
    pub async fn move_axis(&mut self, axis: Axis, target: f64) -> Result<(), LinkError> {
        self.link.send(&gcode::move_axis(axis, target)).await?;
        self.tracker.commanded_axis(axis, target);
        Ok(())
    }

    /// Move a single axis relative to the tracked position.
    pub async fn jog(&mut self, axis: Axis, delta: f64) -> Result<(), LinkError> {
        let target = self.tracker.position().get(axis) + delta;
        self.move_axis(axis, target).await
    }

    /// Go to a planar point at a safe height: Z first, then X and Y together.
    pub async fn move_to_point(&mut self, x: f64, y: f64, z: f64) -> Result<(), LinkError> {
        self.link.send(&gcode::move_axis(Axis::Z, z)).await?;
        self.link
            .send(&gcode::move_command(&[(Axis::X, x), (Axis::Y, y)]))
            .await?;
        self.tracker.commanded(Position::new(x, y, z));
        Ok(())
    }

    /// Raise to `start.z`, return to the XY origin, then lower Z to zero.
    pub async fn park(&mut self, start: &Position) -> Result<(), LinkError> {
        tracing::info!("Returning to home position");
        self.link.send(&gcode::homing_sequence(start)).await?;
        self.tracker.commanded(Position::origin());
        Ok(())
    }

    /// Overwrite the tracker with what the machine reports.
    pub async fn sync_position(&mut self) -> Result<PositionReport, LinkError> {
        let report = self.link.query_position().await?;
        self.tracker.reported(&report);
        tracing::debug!("Position from device: {}", self.tracker.position());
        Ok(report)
    }

    pub async fn close(&mut self) -> Result<(), LinkError> {
        self.link.close().await
    }
}
