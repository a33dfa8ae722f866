use serde::Serialize;

use crate::core::FunctionCode;

/// A decoded application frame.
///
/// Wire layout (big-endian):
///
/// ```text
/// [dest:2][src:2][function:1][length:1]([wakeup:2])[payload:0..]
/// ```
///
/// The `length` byte declares the total size of the frame including the
/// header, and the `wakeup` field is only present on frames travelling
/// bridge-to-node for functions other than beacon (see
/// [`FrameCodec`](super::FrameCodec)).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Frame {
    /// Destination station address
    pub destination: u16,
    /// Source station address
    pub source: u16,
    /// Function code
    pub function: FunctionCode,
    /// Wakeup interval in seconds; 0 when the field is absent on the wire
    pub wakeup_interval: u16,
    /// Application payload (may be empty)
    pub payload: Vec<u8>,
}
