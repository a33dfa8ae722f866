//! Core types and constants for the Galvanize radio adaptor
//!
//! This module contains the fundamental building blocks used throughout the
//! library: the error taxonomy, the function-code table, configuration and
//! the protocol timing constants.

use std::time::Duration;

pub mod error;
pub mod types;

pub use self::error::{DecodeError, Error, Result};
pub use self::types::{
    characteristics, parse_address, AdaptorState, FunctionCode, RadioConfig, RadioRole,
};

/// Serial line rate (fixed, not negotiated)
pub const SERIAL_BAUD: u32 = 19_200;

/// Blocking read timeout on the serial port
pub const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Inter-byte polling delay used by the read-until-quiet burst heuristic.
///
/// This constant IS the framing: the wire protocol has no delimiter, so a
/// transmission gap longer than this delay is what separates two messages.
/// Shrinking it risks splitting one message into several bursts; enlarging
/// it risks merging two fast-successive messages into one.
pub const INTER_BYTE_POLL: Duration = Duration::from_millis(5);

/// Period of the transmit tick; at most one frame is written per tick
pub const TRANSMIT_TICK: Duration = Duration::from_millis(50);

/// Settling delay after each modem configuration command
pub const COMMAND_DELAY: Duration = Duration::from_secs(2);

/// How long an RSSI query may remain unanswered before the sentinel is
/// emitted instead
pub const RSSI_TIMEOUT: Duration = Duration::from_secs(2);

/// Reading emitted when an RSSI query times out or fails to parse, so
/// callers always get exactly one reading per request
pub const RSSI_SENTINEL: i32 = -1000;

/// Default wakeup interval (seconds) written into bridge-originated frames
pub const DEFAULT_WAKEUP_INTERVAL: u16 = 360;

/// Largest chunk pulled off the port in a single read
pub const READ_CHUNK: usize = 256;
