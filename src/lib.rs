//! Galvanize radio adaptor
//!
//! Bridges Galvanize wireless button/sensor devices to a host message bus
//! over a serial-attached LPRS easyRadio modem: modem handshake, burst
//! framing, the binary frame codec, RSSI queries and paced transmission.

pub mod adaptor;
pub mod core;
pub mod link;
pub mod protocol;

// Re-export commonly used items
pub use adaptor::{AppCommand, AppRequest, BusEvent, CharacteristicData, RadioAdaptor};
pub use core::{AdaptorState, Error, FunctionCode, RadioConfig, RadioRole, Result};
pub use protocol::{Frame, FrameCodec};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
