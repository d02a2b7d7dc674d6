// src/jog.rs - Free manual control
use std::path::PathBuf;

use crate::file_manager;
use crate::gcode::PositionReport;
use crate::input::JogInput;
use crate::motion::{MotionController, Position};
use crate::session::SessionError;
use crate::store::CaptureLog;

#[derive(Debug, Clone, PartialEq)]
pub enum JogStep {
    Ignored,
    Moved(Position),
    Verified(PositionReport),
    Captured { count: usize, position: Position },
    Undone { removed: Option<Position>, count: usize },
    Saved { rows: usize },
    /// The file could not be written; the captured points are kept.
    SaveFailed(String),
    ConfirmQuit,
    Reprompt,
    QuitCancelled,
    Finished,
}

/// Jogs the probe axis by axis and collects points on demand.
///
/// Saving writes the whole log and keeps the session running; only a
/// confirmed quit ends it.
#[derive(Debug)]
pub struct JogController {
    log: CaptureLog,
    output: PathBuf,
    confirming_quit: bool,
    finished: bool,
}

impl JogController {
    pub fn new(output: PathBuf) -> Self {
        Self {
            log: CaptureLog::new(),
            output,
            confirming_quit: false,
            finished: false,
        }
    }

    pub fn log(&self) -> &CaptureLog {
        &self.log
    }

    pub fn is_confirming_quit(&self) -> bool {
        self.confirming_quit
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn handle(
        &mut self,
        motion: &mut MotionController,
        input: JogInput,
    ) -> Result<JogStep, SessionError> {
        if self.finished {
            return Ok(JogStep::Ignored);
        }
        if self.confirming_quit {
            return Ok(match input {
                JogInput::Confirm(true) => {
                    tracing::info!("Leaving free mode with {} points in memory", self.log.len());
                    self.finished = true;
                    JogStep::Finished
                }
                JogInput::Confirm(false) => {
                    self.confirming_quit = false;
                    JogStep::QuitCancelled
                }
                _ => JogStep::Reprompt,
            });
        }

        match input {
            JogInput::Jog(axis, step, direction) => {
                motion.jog(axis, step.size() * direction.sign()).await?;
                Ok(JogStep::Moved(motion.position()))
            }
            JogInput::Capture => {
                let position = motion.position();
                self.log.capture(position);
                tracing::info!("Captured point {}: {}", self.log.len(), position);
                Ok(JogStep::Captured {
                    count: self.log.len(),
                    position,
                })
            }
            JogInput::Undo => {
                let removed = self.log.undo();
                if let Some(p) = removed {
                    tracing::info!("Removed point {}", p);
                }
                Ok(JogStep::Undone {
                    removed,
                    count: self.log.len(),
                })
            }
            JogInput::Save => {
                match file_manager::write_datapoints(&self.output, &self.log.rows()).await {
                    Ok(rows) => Ok(JogStep::Saved { rows }),
                    Err(e) => {
                        tracing::error!(
                            "Failed to save {} points to {}: {}",
                            self.log.len(),
                            self.output.display(),
                            e
                        );
                        Ok(JogStep::SaveFailed(e.to_string()))
                    }
                }
            }
            JogInput::Verify => Ok(JogStep::Verified(motion.sync_position().await?)),
            JogInput::Quit => {
                self.confirming_quit = true;
                Ok(JogStep::ConfirmQuit)
            }
            JogInput::Confirm(_) | JogInput::Other => Ok(JogStep::Ignored),
        }
    }
}
