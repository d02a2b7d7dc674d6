//! Line protocol on top of a [`Transport`].
//!
//! Commands are framed one per line. The firmware answers with `ok`, echoes
//! and other chatter the host has no use for, so after every line whatever is
//! already waiting is read and dropped. Position queries are the only
//! exchange whose reply is kept.

use std::time::Duration;
use tokio::time::sleep;

use super::report::PositionReport;
use super::{strip_comment, POSITION_QUERY};
use crate::config::LinkConfig;
use crate::hardware::{LinkError, Transport};

/// Upper bound on lines dropped in one drain, so a chatty device cannot
/// hold the control loop.
const MAX_DRAIN_LINES: usize = 64;

/// Fixed delays applied around link exchanges.
#[derive(Debug, Clone, Copy)]
pub struct LinkTiming {
    /// Wait between sending `M114` and reading its reply.
    pub settle: Duration,
    /// Wait before dropping replies to an ordinary command.
    pub drain: Duration,
}

impl From<&LinkConfig> for LinkTiming {
    fn from(link: &LinkConfig) -> Self {
        Self {
            settle: Duration::from_millis(link.settle_ms),
            drain: Duration::from_millis(link.drain_ms),
        }
    }
}

impl LinkTiming {
    /// No delays at all, for in-process devices.
    pub fn immediate() -> Self {
        Self {
            settle: Duration::ZERO,
            drain: Duration::ZERO,
        }
    }
}

pub struct GcodeLink {
    transport: Box<dyn Transport>,
    timing: LinkTiming,
    lines_sent: u64,
}

impl GcodeLink {
    pub fn new(transport: Box<dyn Transport>, timing: LinkTiming) -> Self {
        Self {
            transport,
            timing,
            lines_sent: 0,
        }
    }

    pub async fn open(&mut self) -> Result<(), LinkError> {
        self.transport.open().await
    }

    pub async fn close(&mut self) -> Result<(), LinkError> {
        tracing::debug!("Closing link after {} lines", self.lines_sent);
        self.transport.close().await
    }

    pub fn device_name(&self) -> &str {
        self.transport.name()
    }

    pub fn lines_sent(&self) -> u64 {
        self.lines_sent
    }

    /// Send one or more lines of G-code.
    ///
    /// Blank and comment-only lines are skipped; an empty command is a no-op.
    pub async fn send(&mut self, command: &str) -> Result<(), LinkError> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(());
        }
        for line in command.lines() {
            let code = strip_comment(line);
            if code.is_empty() {
                continue;
            }
            self.write_line(code).await?;
            if !self.timing.drain.is_zero() {
                sleep(self.timing.drain).await;
            }
            self.discard_pending().await?;
        }
        Ok(())
    }

    /// Ask the machine where it is.
    ///
    /// Degraded axes are logged and read as `0.0`; the caller decides whether
    /// that is acceptable. No retry is attempted.
    pub async fn query_position(&mut self) -> Result<PositionReport, LinkError> {
        // A late `ok` must not be mistaken for the report.
        self.discard_pending().await?;
        self.write_line(POSITION_QUERY).await?;
        if !self.timing.settle.is_zero() {
            sleep(self.timing.settle).await;
        }
        let raw = self.transport.readline().await?;
        let line = String::from_utf8_lossy(&raw);
        tracing::debug!("RX: {}", line);

        let report = PositionReport::parse(&line);
        if report.is_degraded() {
            tracing::warn!(
                "Position report {:?} unreadable on {:?}, using 0.0",
                line,
                report.degraded_axes()
            );
        }
        Ok(report)
    }

    async fn write_line(&mut self, code: &str) -> Result<(), LinkError> {
        tracing::debug!("TX: {}", code);
        let framed = format!("{}\n", code);
        if let Err(e) = self.transport.send(framed.as_bytes()).await {
            tracing::error!("Failed to send {:?} to {}: {}", code, self.transport.name(), e);
            return Err(e);
        }
        self.lines_sent += 1;
        Ok(())
    }

    /// Read and drop every reply line already waiting.
    async fn discard_pending(&mut self) -> Result<usize, LinkError> {
        let mut dropped = 0;
        while dropped < MAX_DRAIN_LINES && self.transport.bytes_available().await? > 0 {
            let raw = self.transport.readline().await?;
            tracing::trace!("RX (dropped): {}", String::from_utf8_lossy(&raw));
            dropped += 1;
        }
        Ok(dropped)
    }
}

impl std::fmt::Debug for GcodeLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcodeLink")
            .field("device", &self.transport.name())
            .field("timing", &self.timing)
            .field("lines_sent", &self.lines_sent)
            .finish()
    }
}
