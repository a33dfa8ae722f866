//! Binary frame protocol: the wire layout and its pure codec

pub mod codec;
pub mod frame;

pub use self::codec::{FrameCodec, HEADER_LEN, MAX_FRAME_LEN};
pub use self::frame::Frame;
