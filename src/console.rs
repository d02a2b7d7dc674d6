// src/console.rs - Operator prompts on stdout
use crossterm::style::Stylize;
use std::io::Write;

use crate::jog::JogStep;
use crate::scan::{ScanState, ScanStep};

const MODE_KEYS: &[(&str, &str)] = &[("Z", "Rectangle"), ("X", "Free")];

const CALIBRATION_KEYS: &[(&str, &str)] = &[
    ("X", "Exit"),
    ("E", "Z Up"),
    ("Q", "Z Down"),
    ("W", "Y Up"),
    ("S", "Y Down"),
    ("D", "X Up"),
    ("A", "X Down"),
    ("V", "Read Position"),
    ("Y", "Accept Start Position"),
];

const MEASURING_KEYS: &[(&str, &str)] = &[
    ("X", "Quit"),
    ("W/I", "Z Up"),
    ("S/K", "Z Down"),
    ("D", "Next Grid Point"),
    ("A", "Previous Grid Point"),
    ("V", "Read Position"),
    ("E", "Save & Next Grid Point"),
];

const FREE_KEYS: &[(&str, &str)] = &[
    ("X", "Quit"),
    ("W/I", "Y Up"),
    ("S/K", "Y Down"),
    ("D/L", "X Up"),
    ("A/J", "X Down"),
    ("E/O", "Z Up"),
    ("Q/U", "Z Down"),
    ("P", "Save Point"),
    ("Z", "Undo Point"),
    ("G", "Save File"),
    ("V", "Read Position"),
];

/// Byte sink that turns `\n` into `\r\n`, for log output written while the
/// terminal is in raw mode.
#[derive(Debug)]
pub struct RawModeWriter<W> {
    inner: W,
}

impl<W: Write> RawModeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for RawModeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for (i, chunk) in buf.split(|b| *b == b'\n').enumerate() {
            if i > 0 {
                self.inner.write_all(b"\r\n")?;
            }
            self.inner.write_all(chunk)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Writes prompts line by line. Lines end in `\r\n` so they stay aligned
/// while the terminal is in raw mode.
#[derive(Debug, Clone, Copy)]
pub struct Console {
    enabled: bool,
}

impl Console {
    pub fn stdout() -> Self {
        Self { enabled: true }
    }

    /// Swallows everything; used for scripted runs and tests.
    pub fn silent() -> Self {
        Self { enabled: false }
    }

    pub fn line(&self, text: &str) {
        if !self.enabled {
            return;
        }
        let mut out = std::io::stdout().lock();
        // Prompts are best effort; a closed stdout must not stop the machine.
        let _ = write!(out, "{}\r\n", text);
        let _ = out.flush();
    }

    fn title(&self, text: &str) {
        self.line(&format!("{}", text.bold()));
    }

    fn legend(&self, keys: &[(&str, &str)]) {
        let text = keys
            .iter()
            .map(|&(key, action)| format!("{}: {}", key.magenta().bold(), action))
            .collect::<Vec<_>>()
            .join("    ");
        self.line(&text);
    }

    pub fn mode_menu(&self) {
        self.title("MODE SELECTION");
        self.legend(MODE_KEYS);
    }

    pub fn scan_legend(&self, state: ScanState, index: usize) {
        match state {
            ScanState::Calibrating => {
                self.title("INITIAL CALIBRATION");
                self.legend(CALIBRATION_KEYS);
            }
            ScanState::Measuring => {
                self.line(&format!("[{}]", index));
                self.legend(MEASURING_KEYS);
            }
            _ => {}
        }
    }

    pub fn free_legend(&self) {
        self.title("FREE CONTROL");
        self.legend(FREE_KEYS);
    }

    pub fn scan_step(&self, step: &ScanStep, index: usize) {
        match step {
            ScanStep::Moved(p) => self.line(&format!("[{}] {}", index, p)),
            ScanStep::Verified(report) => self.line(&format!("[{}] device {}", index, report.position())),
            ScanStep::Accepted { start, points } => {
                self.line(&format!("Accepted position {} ({} grid points)", start, points));
            }
            ScanStep::Saved { index: saved, position } => {
                self.line(&format!("Saved [{}] {}, now at [{}]", saved, position, index));
            }
            ScanStep::ConfirmQuit => self.line("Are you sure you want to quit? [y/n]"),
            ScanStep::Reprompt => self.line("Please input y or n"),
            ScanStep::QuitCancelled => self.line("Not exiting..."),
            ScanStep::Completed { rows, unset } => {
                self.line(&format!("All points complete! Saved {} rows ({} unset)", rows, unset));
            }
            ScanStep::Aborted => self.line("Exiting without saving"),
            ScanStep::Clamped | ScanStep::Ignored => {}
        }
    }

    pub fn jog_step(&self, step: &JogStep) {
        match step {
            JogStep::Moved(p) => self.line(&p.to_string()),
            JogStep::Verified(report) => self.line(&format!("device {}", report.position())),
            JogStep::Captured { count, position } => {
                self.line(&format!("Point {} saved: {}", count, position));
            }
            JogStep::Undone { removed: Some(p), count } => {
                self.line(&format!("Removed {} ({} left)", p, count));
            }
            JogStep::Undone { removed: None, .. } => self.line("No points to undo"),
            JogStep::Saved { rows } => self.line(&format!("Saved {} points to file", rows)),
            JogStep::SaveFailed(reason) => {
                self.line(&format!("Save failed: {} (points kept, press G to retry)", reason));
            }
            JogStep::ConfirmQuit => self.line("Are you sure you want to quit? [y/n]"),
            JogStep::Reprompt => self.line("Please input y or n"),
            JogStep::QuitCancelled => self.line("Not exiting..."),
            JogStep::Finished => self.line("Exiting free mode"),
            JogStep::Ignored => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_mode_writer_line_endings() {
        let mut writer = RawModeWriter::new(Vec::new());
        write!(writer, "INFO first\nINFO second\n").unwrap();
        writer.write_all(b"no newline").unwrap();
        assert_eq!(writer.into_inner(), b"INFO first\r\nINFO second\r\nno newline");
    }
}
