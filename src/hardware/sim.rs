// src/hardware/sim.rs - In-process stand-in for a G-code controller
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{LinkError, Transport};
use crate::motion::{Axis, Position};

const STEPS_PER_MM: [f64; 3] = [80.0, 80.0, 400.0];

#[derive(Debug)]
struct SimState {
    open: bool,
    position: Position,
    inbound: Vec<u8>,
    outbox: VecDeque<Vec<u8>>,
    sent: Vec<String>,
    noise_rate: f64,
    fail_writes: bool,
    rng: StdRng,
}

impl SimState {
    fn execute(&mut self, line: &str) {
        let code = line.split(';').next().unwrap_or("").trim();
        if code.is_empty() {
            return;
        }
        let words = split_words(code);
        match words.first().map(|(letter, value)| (*letter, value.as_str())) {
            Some(('G', "0" | "1")) => {
                for (letter, value) in &words[1..] {
                    let Some(axis) = Axis::from_letter(*letter) else {
                        continue;
                    };
                    if let Ok(v) = value.parse::<f64>() {
                        self.position.set(axis, v);
                    }
                }
            }
            Some(('G', "28")) => self.position = Position::origin(),
            Some(('M', "114")) => {
                let report = self.report_line();
                self.outbox.push_back(report.into_bytes());
            }
            _ => {}
        }
        self.outbox.push_back(b"ok".to_vec());
    }

    fn report_line(&mut self) -> String {
        let p = self.position;
        let mut fields = [
            format!("X:{:.2}", p.x),
            format!("Y:{:.2}", p.y),
            format!("Z:{:.2}", p.z),
        ];
        if self.noise_rate > 0.0 && self.rng.random_bool(self.noise_rate.min(1.0)) {
            let victim = self.rng.random_range(0..fields.len());
            let letter = ['X', 'Y', 'Z'][victim];
            fields[victim] = format!("{}:#?{}", letter, self.rng.random_range(0..100));
        }
        format!(
            "{} {} {} E:0.00 Count X:{} Y:{} Z:{}",
            fields[0],
            fields[1],
            fields[2],
            (p.x * STEPS_PER_MM[0]).round() as i64,
            (p.y * STEPS_PER_MM[1]).round() as i64,
            (p.z * STEPS_PER_MM[2]).round() as i64
        )
    }
}

/// Splits `G0 X1.5Y-2` style text into (letter, value) words.
fn split_words(code: &str) -> Vec<(char, String)> {
    let mut words: Vec<(char, String)> = Vec::new();
    for c in code.chars() {
        if c.is_ascii_alphabetic() {
            words.push((c.to_ascii_uppercase(), String::new()));
        } else if !c.is_whitespace() {
            if let Some((_, value)) = words.last_mut() {
                value.push(c);
            }
        }
    }
    words
}

/// Simulated machine that speaks the same line protocol as the firmware.
///
/// Every command is acknowledged with `ok`; absolute `G0`/`G1` moves update
/// the simulated position, `G28` homes to the origin and `M114` answers with a
/// Marlin style report line.
#[derive(Debug)]
pub struct SimulatedMachine {
    state: Arc<Mutex<SimState>>,
}

/// Test-side view into a [`SimulatedMachine`] that outlives the session.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

fn lock(state: &Mutex<SimState>) -> MutexGuard<'_, SimState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SimulatedMachine {
    pub fn new() -> (Self, SimHandle) {
        Self::with_seed(0x5eed)
    }

    pub fn with_seed(seed: u64) -> (Self, SimHandle) {
        let state = Arc::new(Mutex::new(SimState {
            open: false,
            position: Position::origin(),
            inbound: Vec::new(),
            outbox: VecDeque::new(),
            sent: Vec::new(),
            noise_rate: 0.0,
            fail_writes: false,
            rng: StdRng::seed_from_u64(seed),
        }));
        (
            Self {
                state: state.clone(),
            },
            SimHandle { state },
        )
    }
}

impl SimHandle {
    /// Every line the host transmitted, in order.
    pub fn sent_commands(&self) -> Vec<String> {
        lock(&self.state).sent.clone()
    }

    pub fn clear_log(&self) {
        lock(&self.state).sent.clear();
    }

    pub fn position(&self) -> Position {
        lock(&self.state).position
    }

    /// Move the probe behind the host's back, as an operator nudging it would.
    pub fn place_probe(&self, position: Position) {
        lock(&self.state).position = position;
    }

    /// Probability that a position report carries one corrupted token.
    pub fn set_noise(&self, rate: f64) {
        lock(&self.state).noise_rate = rate;
    }

    /// Make every subsequent write fail as if the cable was pulled.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }

    /// Queue an unsolicited line, e.g. a firmware `echo:` message.
    pub fn push_reply(&self, line: &str) {
        lock(&self.state).outbox.push_back(line.as_bytes().to_vec());
    }

    pub fn pending_replies(&self) -> usize {
        lock(&self.state).outbox.len()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }
}

#[async_trait]
impl Transport for SimulatedMachine {
    async fn open(&mut self) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        state.open = true;
        state.outbox.clear();
        tracing::info!("Simulated machine online");
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        if state.fail_writes {
            return Err(LinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated write failure",
            )));
        }
        state.inbound.extend_from_slice(bytes);
        while let Some(end) = state.inbound.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = state.inbound.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw).trim().to_string();
            if line.is_empty() {
                continue;
            }
            state.sent.push(line.clone());
            state.execute(&line);
        }
        Ok(())
    }

    async fn readline(&mut self) -> Result<Vec<u8>, LinkError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        Ok(state.outbox.pop_front().unwrap_or_default())
    }

    async fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let state = lock(&self.state);
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        Ok(state.outbox.iter().map(|line| line.len() + 1).sum())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        lock(&self.state).open = false;
        tracing::info!("Simulated machine offline");
        Ok(())
    }

    fn name(&self) -> &str {
        "simulator"
    }
}
