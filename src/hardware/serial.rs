// src/hardware/serial.rs - Serial port transport
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::time::{sleep, timeout};
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

use super::{LinkError, Transport};
use crate::config::LinkConfig;

/// Byte sequence written right after open to wake the controller.
const WAKE_SEQUENCE: &[u8] = b"\r\n\r\n";

/// Serial connection configuration
#[derive(Debug, Clone)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub read_timeout: Duration,
    pub wake_delay: Duration,
}

impl From<&LinkConfig> for SerialConfig {
    fn from(link: &LinkConfig) -> Self {
        Self {
            port_name: link.port.clone(),
            baud_rate: link.baud,
            read_timeout: Duration::from_millis(link.read_timeout_ms),
            wake_delay: Duration::from_millis(link.wake_delay_ms),
        }
    }
}

/// Serial connection statistics
#[derive(Debug, Clone, Default)]
pub struct SerialStats {
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub lines_received: u64,
    pub timeouts: u64,
}

/// Result of one bounded attempt to complete a line.
#[derive(Debug, PartialEq)]
enum LineRead {
    Line(Vec<u8>),
    /// Timed out; any bytes read so far stay in the partial buffer.
    Pending,
    Eof,
}

/// Read up to the next `\n` into `partial`, giving up after `limit`.
///
/// `read_until` appends as it goes, so bytes received before a timeout are
/// kept in `partial` and the next call continues the same line.
async fn read_line_into<R>(
    reader: &mut R,
    partial: &mut Vec<u8>,
    limit: Duration,
) -> std::io::Result<LineRead>
where
    R: AsyncBufRead + Unpin,
{
    match timeout(limit, reader.read_until(b'\n', partial)).await {
        Ok(Ok(0)) => Ok(LineRead::Eof),
        Ok(Ok(_)) => {
            let mut line = std::mem::take(partial);
            while matches!(line.last(), Some(b'\n' | b'\r')) {
                line.pop();
            }
            Ok(LineRead::Line(line))
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::TimedOut => Ok(LineRead::Pending),
        Ok(Err(e)) => Err(e),
        Err(_) => Ok(LineRead::Pending),
    }
}

/// Line-oriented transport over a native serial port.
pub struct SerialTransport {
    config: SerialConfig,
    port: Option<BufReader<SerialStream>>,
    /// Start of a line whose end has not arrived yet.
    partial: Vec<u8>,
    stats: SerialStats,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            port: None,
            partial: Vec::new(),
            stats: SerialStats::default(),
        }
    }

    pub fn stats(&self) -> &SerialStats {
        &self.stats
    }

    fn port_mut(&mut self) -> Result<&mut BufReader<SerialStream>, LinkError> {
        self.port.as_mut().ok_or(LinkError::NotOpen)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn open(&mut self) -> Result<(), LinkError> {
        tracing::info!(
            "Connecting to {} at {} baud",
            self.config.port_name,
            self.config.baud_rate
        );
        let mut stream = tokio_serial::new(&self.config.port_name, self.config.baud_rate)
            .timeout(self.config.read_timeout)
            .open_native_async()?;

        stream.write_all(WAKE_SEQUENCE).await?;
        stream.flush().await?;
        sleep(self.config.wake_delay).await;
        // Drop whatever banner the firmware printed while booting.
        stream.clear(ClearBuffer::Input)?;

        self.port = Some(BufReader::new(stream));
        self.partial.clear();
        tracing::info!("Serial link to {} ready", self.config.port_name);
        Ok(())
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let port = self.port_mut()?;
        let stream = port.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await?;
        self.stats.bytes_sent += bytes.len() as u64;
        Ok(())
    }

    async fn readline(&mut self) -> Result<Vec<u8>, LinkError> {
        let read_timeout = self.config.read_timeout;
        let Some(port) = self.port.as_mut() else {
            return Err(LinkError::NotOpen);
        };
        match read_line_into(port, &mut self.partial, read_timeout).await? {
            LineRead::Line(line) => {
                self.stats.bytes_received += line.len() as u64;
                self.stats.lines_received += 1;
                Ok(line)
            }
            LineRead::Pending => {
                tracing::warn!(
                    "Timeout after {:?} waiting for a line ({} bytes held)",
                    read_timeout,
                    self.partial.len()
                );
                self.stats.timeouts += 1;
                Ok(Vec::new())
            }
            LineRead::Eof => {
                tracing::info!("Serial connection closed by remote");
                Err(LinkError::Closed)
            }
        }
    }

    async fn bytes_available(&mut self) -> Result<usize, LinkError> {
        let port = self.port_mut()?;
        let buffered = port.buffer().len();
        let pending = port.get_ref().bytes_to_read()? as usize;
        Ok(buffered + pending)
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        self.partial.clear();
        if let Some(mut port) = self.port.take() {
            port.get_mut().shutdown().await?;
            tracing::info!(
                "Closed {} ({} bytes sent, {} lines received, {} timeouts)",
                self.config.port_name,
                self.stats.bytes_sent,
                self.stats.lines_received,
                self.stats.timeouts
            );
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.config.port_name
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .field("open", &self.port.is_some())
            .finish()
    }
}
