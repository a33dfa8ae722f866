//! Serial link to the radio modem
//!
//! Owns the port, the fixed line settings and the read-until-quiet burst
//! primitive that provides the only framing this transport has.

pub mod handshake;

use std::io;
use std::thread;

use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::trace;

use crate::core::{Error, RadioConfig, Result, INTER_BYTE_POLL, READ_CHUNK, READ_TIMEOUT, SERIAL_BAUD};

/// Byte-level access to the radio modem.
///
/// The production implementation wraps a system serial port; tests supply
/// scripted ports. Reads and writes may proceed concurrently on separate
/// handles, but each direction is internally serialized.
pub trait RadioPort: Send {
    /// Blocking read of whatever is available, bounded by the port's read
    /// timeout. Returns `Ok(0)` when the timeout elapses with no byte.
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes the whole buffer
    fn write_all_bytes(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Bytes already buffered by the driver, readable without blocking
    fn bytes_pending(&mut self) -> io::Result<u32>;
}

/// A system serial port configured for the radio modem
pub struct SystemPort(Box<dyn SerialPort>);

impl RadioPort for SystemPort {
    fn read_some(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.0.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all_bytes(&mut self, buf: &[u8]) -> io::Result<()> {
        self.0.write_all(buf)?;
        self.0.flush()
    }

    fn bytes_pending(&mut self) -> io::Result<u32> {
        self.0
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

/// The serial link to the radio modem.
///
/// Exactly one task owns reads on a link; the transmit tick writes through
/// an independent [`writer_handle`](SerialLink::writer_handle).
pub struct SerialLink<P: RadioPort> {
    port: P,
}

impl SerialLink<SystemPort> {
    /// Opens and configures the serial device named in the configuration.
    ///
    /// Line settings are fixed: 19200 baud, 8 data bits, no parity, 1 stop
    /// bit, 0.5 s read timeout. Failure here is fatal to the session; the
    /// recovery path is an adaptor restart, not a retry.
    pub fn open(config: &RadioConfig) -> Result<Self> {
        let port = serialport::new(&config.port, SERIAL_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| {
                Error::link_unavailable(format!("failed to open {}: {}", config.port, e))
            })?;
        Ok(SerialLink {
            port: SystemPort(port),
        })
    }

    /// Returns an independent handle for the transmit tick. Reads stay with
    /// this link.
    pub fn writer_handle(&self) -> Result<SystemPort> {
        let clone = self
            .port
            .0
            .try_clone()
            .map_err(|e| Error::link_unavailable(format!("failed to clone port: {}", e)))?;
        Ok(SystemPort(clone))
    }
}

impl<P: RadioPort> SerialLink<P> {
    /// Wraps an already-open port (test entry point)
    pub fn with_port(port: P) -> Self {
        SerialLink { port }
    }

    /// Writes raw bytes to the modem
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port
            .write_all_bytes(bytes)
            .map_err(|e| Error::link_write(e.to_string()))
    }

    /// Reads one quiescent burst off the link.
    ///
    /// Blocks until at least one byte arrives (or the read timeout elapses,
    /// yielding an empty burst), then keeps draining with short inter-byte
    /// polling delays until the driver reports no further bytes pending.
    ///
    /// This "read until quiet" heuristic is the sole framing delimiter the
    /// wire format offers: a burst equals one logical message only while
    /// the far end's transmission gaps exceed [`INTER_BYTE_POLL`]. Known
    /// fragility, inherited from the hardware; do not tune the delay.
    pub fn read_burst(&mut self) -> Result<Vec<u8>> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.port.read_some(&mut chunk)?;
        if n == 0 {
            return Ok(Vec::new());
        }
        let mut burst = chunk[..n].to_vec();
        loop {
            thread::sleep(INTER_BYTE_POLL);
            if self.port.bytes_pending()? == 0 {
                break;
            }
            let n = self.port.read_some(&mut chunk)?;
            if n == 0 {
                break;
            }
            burst.extend_from_slice(&chunk[..n]);
        }
        trace!(len = burst.len(), "burst received");
        Ok(burst)
    }
}
