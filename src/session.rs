// src/session.rs - One operator session against one machine
use std::path::PathBuf;
use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{Config, ScanConfig};
use crate::console::Console;
use crate::file_manager::StoreError;
use crate::gcode::GcodeLink;
use crate::hardware::LinkError;
use crate::input::{self, KeySource, Mode};
use crate::jog::{JogController, JogStep};
use crate::motion::{MotionController, Position};
use crate::scan::{GridError, RectangleScan, ScanState, ScanStep};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Link error: {0}")]
    Link(#[from] LinkError),
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("No workflow selected")]
    NoWorkflow,
}

/// The workflow a session is running.
#[derive(Debug)]
pub enum Workflow {
    Scan(RectangleScan),
    Free(JogController),
}

/// Result of feeding one key to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionStep {
    Scan(ScanStep),
    Free(JogStep),
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every grid point was visited and the file was written.
    Completed,
    /// The operator quit.
    Quit,
    /// The key source ran dry before the workflow finished.
    InputExhausted,
}

/// Everything one run of the machine owns: the link, the tracked position
/// and the workflow's datapoints. There is no state outside this struct.
#[derive(Debug)]
pub struct MachineSession {
    id: Uuid,
    motion: MotionController,
    workflow: Option<Workflow>,
    scan_layout: ScanConfig,
    output: PathBuf,
}

impl MachineSession {
    pub fn new(link: GcodeLink, config: &Config) -> Self {
        Self {
            id: Uuid::new_v4(),
            motion: MotionController::new(link),
            workflow: None,
            scan_layout: config.scan.clone(),
            output: config.output.path.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn position(&self) -> Position {
        self.motion.position()
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn workflow(&self) -> Option<&Workflow> {
        self.workflow.as_ref()
    }

    /// Open the link, home the machine and read where it is.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        tracing::info!("Session {} on {}", self.id, self.motion.link().device_name());
        let report = self.motion.start().await?;
        tracing::info!("Machine ready at {}", report.position());
        Ok(())
    }

    /// Enter a workflow. A scan goes straight into calibration.
    pub fn select(&mut self, mode: Mode) {
        let workflow = match mode {
            Mode::Scan => {
                let mut scan = RectangleScan::new(self.scan_layout.clone(), self.output.clone());
                scan.begin_calibration();
                Workflow::Scan(scan)
            }
            Mode::Free => Workflow::Free(JogController::new(self.output.clone())),
        };
        tracing::info!("Mode: {:?}", mode);
        self.workflow = Some(workflow);
    }

    /// Translate a key for the active workflow and apply it.
    pub async fn handle_key(&mut self, key: char) -> Result<SessionStep, SessionError> {
        match self.workflow.as_mut() {
            Some(Workflow::Scan(scan)) => {
                let event = input::scan_input(scan.state(), key);
                Ok(SessionStep::Scan(scan.handle(&mut self.motion, event).await?))
            }
            Some(Workflow::Free(jog)) => {
                let event = input::jog_input(jog.is_confirming_quit(), key);
                Ok(SessionStep::Free(jog.handle(&mut self.motion, event).await?))
            }
            None => Err(SessionError::NoWorkflow),
        }
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        match self.workflow.as_ref()? {
            Workflow::Scan(scan) => match scan.state() {
                ScanState::Complete => Some(SessionOutcome::Completed),
                ScanState::Aborted => Some(SessionOutcome::Quit),
                _ => None,
            },
            Workflow::Free(jog) => jog.is_finished().then_some(SessionOutcome::Quit),
        }
    }

    /// Release the link. Called on every exit path.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        tracing::info!("Closing session {}", self.id);
        self.motion.close().await?;
        Ok(())
    }
}

async fn select_mode(keys: &mut dyn KeySource, console: &Console) -> Option<Mode> {
    console.mode_menu();
    while let Some(key) = keys.next_key().await {
        if let Some(mode) = input::mode_for_key(key) {
            return Some(mode);
        }
    }
    None
}

async fn drive(
    session: &mut MachineSession,
    mode: Option<Mode>,
    keys: &mut dyn KeySource,
    console: &Console,
) -> Result<SessionOutcome, SessionError> {
    session.start().await?;

    let mode = match mode {
        Some(mode) => mode,
        None => match select_mode(keys, console).await {
            Some(mode) => mode,
            None => return Ok(SessionOutcome::InputExhausted),
        },
    };
    session.select(mode);

    let mut shown_state = None;
    if mode == Mode::Free {
        console.free_legend();
    }
    loop {
        if let Some(outcome) = session.outcome() {
            return Ok(outcome);
        }

        if let Some(Workflow::Scan(scan)) = session.workflow.as_ref() {
            if shown_state != Some(scan.state()) {
                shown_state = Some(scan.state());
                console.scan_legend(scan.state(), scan.index());
            }
        }

        let Some(key) = keys.next_key().await else {
            tracing::warn!("Input ended before the session finished");
            return Ok(SessionOutcome::InputExhausted);
        };
        match session.handle_key(key).await? {
            SessionStep::Scan(step) => {
                let index = match session.workflow.as_ref() {
                    Some(Workflow::Scan(scan)) => scan.index(),
                    _ => 0,
                };
                console.scan_step(&step, index);
            }
            SessionStep::Free(step) => console.jog_step(&step),
        }
    }
}

/// Run a session to its end and close the link whatever happened.
///
/// With `mode` unset, the first `z` (scan) or `x` (free) key picks the
/// workflow.
pub async fn run_session(
    session: &mut MachineSession,
    mode: Option<Mode>,
    keys: &mut dyn KeySource,
    console: &Console,
) -> Result<SessionOutcome, SessionError> {
    let span = tracing::info_span!("session", id = %session.id());
    async move {
        let result = drive(session, mode, keys, console).await;
        if let Err(e) = &result {
            tracing::error!("Session failed: {}", e);
        }
        let closed = session.close().await;
        let outcome = result?;
        closed?;
        tracing::info!("Session finished: {:?}", outcome);
        Ok(outcome)
    }
    .instrument(span)
    .await
}
