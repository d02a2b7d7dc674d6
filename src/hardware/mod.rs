// src/hardware/mod.rs - Byte-stream transport boundary
pub mod serial;
pub mod sim;

use async_trait::async_trait;
use thiserror::Error;

pub use serial::SerialTransport;
pub use sim::{SimHandle, SimulatedMachine};

/// Faults on the link itself. All of them are fatal to the session.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Link not open")]
    NotOpen,
    #[error("Link closed by device")]
    Closed,
    #[error("Serial error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Newline-framed byte stream to the machine.
///
/// Reads are bounded by a timeout owned by the implementation, so a silent
/// device yields an empty line instead of blocking the control loop.
#[async_trait]
pub trait Transport: Send {
    /// Open the device and let it wake up.
    async fn open(&mut self) -> Result<(), LinkError>;

    /// Write raw bytes.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;

    /// Read one line without its terminator. Empty on timeout.
    async fn readline(&mut self) -> Result<Vec<u8>, LinkError>;

    /// Number of bytes that can be read without waiting.
    async fn bytes_available(&mut self) -> Result<usize, LinkError>;

    async fn close(&mut self) -> Result<(), LinkError>;

    /// Human readable device name for logs.
    fn name(&self) -> &str;
}
