// src/input.rs - Operator input: key bindings and key sources
//
// The workflows consume typed events, never raw keys, so the same state
// machines run from a terminal, a script file or a test.

use async_trait::async_trait;
use std::collections::VecDeque;

use crate::motion::Axis;
use crate::scan::ScanState;

/// Sign of a jog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }
}

/// Jog resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Coarse,
    Fine,
}

impl Step {
    /// Step length in mm.
    pub fn size(self) -> f64 {
        match self {
            Step::Coarse => 1.0,
            Step::Fine => 0.1,
        }
    }
}

/// Workflow picked at the mode prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Automated rectangle scan.
    Scan,
    /// Free manual control.
    Free,
}

/// Events understood by the rectangle scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanInput {
    /// Calibration nudge; the step size is fixed per axis.
    Calibrate(Axis, Direction),
    /// Height adjustment at the current grid point.
    AdjustZ(Step, Direction),
    Accept,
    Next,
    Previous,
    Save,
    Verify,
    Quit,
    Confirm(bool),
    Other,
}

/// Events understood by free manual control.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JogInput {
    Jog(Axis, Step, Direction),
    Capture,
    Undo,
    Save,
    Verify,
    Quit,
    Confirm(bool),
    Other,
}

pub fn mode_for_key(key: char) -> Option<Mode> {
    match key {
        'z' => Some(Mode::Scan),
        'x' => Some(Mode::Free),
        _ => None,
    }
}

fn confirm_key(key: char) -> Option<bool> {
    match key.to_ascii_lowercase() {
        'y' => Some(true),
        'n' => Some(false),
        _ => None,
    }
}

/// Translate a key for the scan in its current state.
pub fn scan_input(state: ScanState, key: char) -> ScanInput {
    use Direction::{Negative, Positive};
    match state {
        ScanState::Calibrating => match key {
            'e' => ScanInput::Calibrate(Axis::Z, Positive),
            'q' => ScanInput::Calibrate(Axis::Z, Negative),
            'w' => ScanInput::Calibrate(Axis::Y, Positive),
            's' => ScanInput::Calibrate(Axis::Y, Negative),
            'd' => ScanInput::Calibrate(Axis::X, Positive),
            'a' => ScanInput::Calibrate(Axis::X, Negative),
            'y' => ScanInput::Accept,
            'v' => ScanInput::Verify,
            'x' => ScanInput::Quit,
            _ => ScanInput::Other,
        },
        ScanState::Measuring => match key {
            'w' => ScanInput::AdjustZ(Step::Coarse, Positive),
            's' => ScanInput::AdjustZ(Step::Coarse, Negative),
            'i' => ScanInput::AdjustZ(Step::Fine, Positive),
            'k' => ScanInput::AdjustZ(Step::Fine, Negative),
            'd' => ScanInput::Next,
            'a' => ScanInput::Previous,
            'e' => ScanInput::Save,
            'v' => ScanInput::Verify,
            'x' => ScanInput::Quit,
            _ => ScanInput::Other,
        },
        ScanState::Aborting => confirm_key(key).map_or(ScanInput::Other, ScanInput::Confirm),
        _ => ScanInput::Other,
    }
}

/// Translate a key for free mode. `confirming` is true while a quit is
/// waiting for yes/no.
pub fn jog_input(confirming: bool, key: char) -> JogInput {
    use Direction::{Negative, Positive};
    if confirming {
        return confirm_key(key).map_or(JogInput::Other, JogInput::Confirm);
    }
    match key {
        'd' => JogInput::Jog(Axis::X, Step::Coarse, Positive),
        'l' => JogInput::Jog(Axis::X, Step::Fine, Positive),
        'a' => JogInput::Jog(Axis::X, Step::Coarse, Negative),
        'j' => JogInput::Jog(Axis::X, Step::Fine, Negative),
        'w' => JogInput::Jog(Axis::Y, Step::Coarse, Positive),
        'i' => JogInput::Jog(Axis::Y, Step::Fine, Positive),
        's' => JogInput::Jog(Axis::Y, Step::Coarse, Negative),
        'k' => JogInput::Jog(Axis::Y, Step::Fine, Negative),
        'e' => JogInput::Jog(Axis::Z, Step::Coarse, Positive),
        'o' => JogInput::Jog(Axis::Z, Step::Fine, Positive),
        'q' => JogInput::Jog(Axis::Z, Step::Coarse, Negative),
        'u' => JogInput::Jog(Axis::Z, Step::Fine, Negative),
        'p' => JogInput::Capture,
        'z' => JogInput::Undo,
        'g' => JogInput::Save,
        'v' => JogInput::Verify,
        'x' => JogInput::Quit,
        _ => JogInput::Other,
    }
}

/// Where key presses come from. `None` means no more input will arrive.
#[async_trait]
pub trait KeySource: Send {
    async fn next_key(&mut self) -> Option<char>;
}

/// Replays a fixed sequence of keys.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeys {
    keys: VecDeque<char>,
}

impl ScriptedKeys {
    pub fn new(keys: impl IntoIterator<Item = char>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

#[async_trait]
impl KeySource for ScriptedKeys {
    async fn next_key(&mut self) -> Option<char> {
        self.keys.pop_front()
    }
}

/// Reads single key presses from the terminal in raw mode.
///
/// Raw mode is left again when the source is dropped. `Ctrl-C` and `Esc`
/// arrive as `x`, the quit key of every workflow.
pub struct TerminalKeys {
    _raw: RawModeGuard,
}

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        crossterm::terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = crossterm::terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {}", e);
        }
    }
}

impl TerminalKeys {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            _raw: RawModeGuard::enable()?,
        })
    }

    fn read_key() -> Option<char> {
        use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
        loop {
            match event::read() {
                Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        return Some('x');
                    }
                    KeyCode::Char(c) => return Some(c),
                    KeyCode::Esc => return Some('x'),
                    _ => {}
                },
                Ok(_) => {}
                Err(e) => {
                    tracing::error!("Terminal read error: {}", e);
                    return None;
                }
            }
        }
    }
}

#[async_trait]
impl KeySource for TerminalKeys {
    async fn next_key(&mut self) -> Option<char> {
        tokio::task::spawn_blocking(Self::read_key)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("Key reader task failed: {}", e);
                None
            })
    }
}
