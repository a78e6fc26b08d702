//! Serial port transport (requires the `hardware-serial` feature).
//!
//! Reads happen on a dedicated OS thread that blocks on the port with a
//! short timeout and forwards every chunk to the inbound channel. Writes
//! run on Tokio's blocking pool against a cloned port handle.

use crate::{
    Result,
    error::ControlError,
    traits::{INBOUND_CHANNEL_CAPACITY, InboundEvent, InboundStream, Transport},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const READ_BUFFER_SIZE: usize = 256;

/// Extra time allowed for the reader thread to exit after its last read.
const READER_JOIN_GRACE: Duration = Duration::from_millis(200);

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyS4`.
    pub path: String,

    pub baud_rate: u32,

    /// How long a blocking read waits before checking for shutdown.
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyS4".to_string(),
            baud_rate: 9600,
            read_timeout: Duration::from_millis(50),
        }
    }
}

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// Transport over a real serial port.
pub struct SerialTransport {
    name: String,
    writer: SharedPort,
    inbound_rx: Option<InboundStream>,
    connected: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    read_timeout: Duration,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open the port and start the reader thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the port cannot be opened or cloned, or the
    /// reader thread cannot be spawned.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(&config.path, config.baud_rate)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| ControlError::transport(format!("failed to open {}: {e}", config.path)))?;
        let reader_port = port
            .try_clone()
            .map_err(|e| ControlError::transport(format!("failed to clone {}: {e}", config.path)))?;

        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_CHANNEL_CAPACITY);
        let connected = Arc::new(AtomicBool::new(true));
        let reader = spawn_reader(reader_port, inbound_tx, Arc::clone(&connected))?;

        info!(
            "Opened serial port {} at {} baud",
            config.path, config.baud_rate
        );

        Ok(Self {
            name: config.path.clone(),
            writer: Arc::new(Mutex::new(port)),
            inbound_rx: Some(inbound_rx),
            connected,
            reader: Some(reader),
            read_timeout: config.read_timeout,
        })
    }
}

fn spawn_reader(
    mut port: Box<dyn SerialPort>,
    tx: mpsc::Sender<InboundEvent>,
    connected: Arc<AtomicBool>,
) -> Result<JoinHandle<()>> {
    let handle = std::thread::Builder::new()
        .name("lockctl-serial-reader".to_string())
        .spawn(move || {
            let mut buf = [0u8; READ_BUFFER_SIZE];
            while connected.load(Ordering::Acquire) {
                match port.read(&mut buf) {
                    Ok(0) => {}
                    Ok(n) => {
                        let chunk = Bytes::copy_from_slice(&buf[..n]);
                        if tx.blocking_send(InboundEvent::Data(chunk)).is_err() {
                            debug!("Inbound stream dropped, stopping serial reader");
                            break;
                        }
                    }
                    Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                    }
                    Err(e) => {
                        warn!("Serial read failed: {}", e);
                        connected.store(false, Ordering::Release);
                        let _ = tx.blocking_send(InboundEvent::Error(e.to_string()));
                        break;
                    }
                }
            }
        })?;
    Ok(handle)
}

impl Transport for SerialTransport {
    fn take_inbound(&mut self) -> Result<InboundStream> {
        self.inbound_rx
            .take()
            .ok_or_else(|| ControlError::transport("inbound stream already taken"))
    }

    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(ControlError::disconnected(self.name.clone()));
        }

        let writer = Arc::clone(&self.writer);
        let data = bytes.to_vec();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut port = writer.lock().unwrap_or_else(PoisonError::into_inner);
            port.write_all(&data)?;
            port.flush()
        })
        .await
        .map_err(|e| ControlError::transport(format!("serial write task failed: {e}")))??;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Stop the link and wait for the reader thread to release its port
    /// handle. The thread exits within one read timeout; if it is still
    /// blocked on a full inbound channel after the grace period it is left
    /// to exit on its own once the stream is dropped.
    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::Release);

        if let Some(reader) = self.reader.take() {
            join_reader(&self.name, reader, self.read_timeout + READER_JOIN_GRACE).await;
        }

        info!("Closed serial port {}", self.name);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Wait up to `limit` for the reader thread. Returns `true` once it has
/// exited.
async fn join_reader(name: &str, reader: JoinHandle<()>, limit: Duration) -> bool {
    let join = tokio::task::spawn_blocking(move || reader.join());
    match tokio::time::timeout(limit, join).await {
        Ok(Ok(Ok(()))) => {
            debug!("Serial reader for {} stopped", name);
            true
        }
        Ok(Ok(Err(_))) => {
            warn!("Serial reader for {} panicked", name);
            true
        }
        Ok(Err(e)) => {
            warn!("Failed to join serial reader for {}: {}", name, e);
            false
        }
        Err(_) => {
            warn!("Serial reader for {} still running after {:?}", name, limit);
            false
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.connected.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_default() {
        let config = SerialConfig::default();
        assert_eq!(config.path, "/dev/ttyS4");
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.read_timeout, Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_join_reader_waits_for_thread_exit() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let reader = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            flag.store(true, Ordering::Release);
        });

        assert!(join_reader("test", reader, Duration::from_secs(5)).await);
        assert!(done.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn test_join_reader_gives_up_after_limit() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let reader = std::thread::spawn(move || {
            while !flag.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
        });

        assert!(!join_reader("test", reader, Duration::from_millis(20)).await);
        release.store(true, Ordering::Release);
    }

    #[test]
    fn test_open_missing_port_fails() {
        let config = SerialConfig {
            path: "/dev/lockctl-does-not-exist".to_string(),
            ..SerialConfig::default()
        };
        assert!(matches!(
            SerialTransport::open(&config),
            Err(ControlError::Transport { .. })
        ));
    }
}
