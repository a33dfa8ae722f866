use bytes::{Buf, BufMut, BytesMut};

use crate::core::{DecodeError, Error, FunctionCode, RadioConfig, RadioRole};

use super::frame::Frame;

/// Fixed header size: destination, source, function, length
pub const HEADER_LEN: usize = 6;

/// Largest total frame size the one-byte length field can declare
pub const MAX_FRAME_LEN: usize = u8::MAX as usize;

/// Size of the optional wakeup-interval field
const WAKEUP_LEN: usize = 2;

/// Pure frame codec, parameterized by the station configuration.
///
/// The wakeup-interval field only exists on frames travelling from a bridge
/// to a node, and never on beacons. Concretely: `encode` emits it when the
/// local role is bridge and the function is not beacon, and `decode`
/// expects it when the local role is node and the function is not beacon.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    role: RadioRole,
    own_address: u16,
    accepted: Vec<u16>,
    wakeup_interval: u16,
}

impl FrameCodec {
    /// Creates a codec for the given station configuration
    pub fn new(config: &RadioConfig) -> Self {
        FrameCodec {
            role: config.role,
            own_address: config.own_address,
            accepted: config.accepted_addresses.clone(),
            wakeup_interval: config.wakeup_interval,
        }
    }

    /// Decodes one burst into a frame.
    ///
    /// The destination is checked against the accepted-address set before
    /// any further parsing; the declared length must be covered by the
    /// bytes actually present or the frame is rejected whole, never
    /// partially interpreted.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, DecodeError> {
        if bytes.len() < HEADER_LEN {
            return Err(DecodeError::Truncated);
        }
        let mut buf = bytes;
        let destination = buf.get_u16();
        if !self.accepted.contains(&destination) {
            return Err(DecodeError::NotForUs(destination));
        }
        let source = buf.get_u16();
        let function_byte = buf.get_u8();
        let declared = buf.get_u8() as usize;
        let function = FunctionCode::from_byte(function_byte)
            .ok_or(DecodeError::UnknownFunction(function_byte))?;
        if declared < HEADER_LEN || declared > bytes.len() {
            return Err(DecodeError::Truncated);
        }
        let (wakeup_interval, payload_start) = match self.role {
            RadioRole::Bridge => (0, HEADER_LEN),
            // Beacons never carry a wakeup field, even towards a node
            RadioRole::Node if function == FunctionCode::Beacon => (0, HEADER_LEN),
            RadioRole::Node => {
                if declared < HEADER_LEN + WAKEUP_LEN {
                    return Err(DecodeError::Truncated);
                }
                let wakeup = u16::from_be_bytes([bytes[6], bytes[7]]);
                (wakeup, HEADER_LEN + WAKEUP_LEN)
            }
        };
        Ok(Frame {
            destination,
            source,
            function,
            wakeup_interval,
            payload: bytes[payload_start..declared].to_vec(),
        })
    }

    /// Encodes an outbound frame, sourcing it from our own address.
    ///
    /// The length byte is back-patched after assembly so it always reflects
    /// the bytes actually emitted. A payload that would push the frame past
    /// [`MAX_FRAME_LEN`] is rejected whole; the length byte never wraps.
    pub fn encode(
        &self,
        destination: u16,
        function: FunctionCode,
        payload: &[u8],
    ) -> Result<Vec<u8>, Error> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + WAKEUP_LEN + payload.len());
        buf.put_u16(destination);
        buf.put_u16(self.own_address);
        buf.put_u8(function.byte());
        buf.put_u8(0); // length placeholder
        if self.role == RadioRole::Bridge && function != FunctionCode::Beacon {
            buf.put_u16(self.wakeup_interval);
        }
        buf.put_slice(payload);
        if buf.len() > MAX_FRAME_LEN {
            return Err(Error::OversizeFrame(buf.len()));
        }
        buf[5] = buf.len() as u8;
        Ok(buf.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge_codec() -> FrameCodec {
        FrameCodec::new(&RadioConfig::new(
            "/dev/null",
            RadioRole::Bridge,
            0x1234,
            &[0xBBBB],
            1,
        ))
    }

    fn node_codec() -> FrameCodec {
        FrameCodec::new(&RadioConfig::new(
            "/dev/null",
            RadioRole::Node,
            0x5678,
            &[0xBBBB],
            1,
        ))
    }

    #[test]
    fn test_round_trip_bridge_to_node() {
        // A bridge-encoded frame is what a node decodes
        let bridge = bridge_codec();
        let node = node_codec();
        for function in FunctionCode::ALL {
            if function == FunctionCode::Beacon {
                continue;
            }
            let bytes = bridge.encode(0x5678, function, b"\x01\x02\x03").unwrap();
            let frame = node.decode(&bytes).unwrap();
            assert_eq!(frame.destination, 0x5678);
            assert_eq!(frame.source, 0x1234);
            assert_eq!(frame.function, function);
            assert_eq!(frame.wakeup_interval, 360);
            assert_eq!(frame.payload, b"\x01\x02\x03");
        }
    }

    #[test]
    fn test_round_trip_node_to_bridge() {
        // Node-originated frames carry no wakeup field
        let bridge = bridge_codec();
        let node = node_codec();
        let bytes = node.encode(0x1234, FunctionCode::Alert, b"\x09").unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 1);
        let frame = bridge.decode(&bytes).unwrap();
        assert_eq!(frame.source, 0x5678);
        assert_eq!(frame.function, FunctionCode::Alert);
        assert_eq!(frame.wakeup_interval, 0);
        assert_eq!(frame.payload, b"\x09");
    }

    #[test]
    fn test_bridge_beacon_is_wakeup_exempt() {
        let bridge = bridge_codec();
        let bytes = bridge.encode(0x5678, FunctionCode::Beacon, b"").unwrap();
        assert_eq!(bytes, vec![0x56, 0x78, 0x12, 0x34, 0xBE, 0x06]);
        // And a node decodes the six-byte beacon without expecting wakeup
        let node = node_codec();
        let frame = node
            .decode(&[0x56, 0x78, 0x12, 0x34, 0xBE, 0x06])
            .unwrap();
        assert_eq!(frame.function, FunctionCode::Beacon);
        assert_eq!(frame.wakeup_interval, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_explicit_beacon_vector() {
        // role=bridge, own=0x1234, beacon to ourselves: 12 34 12 34 BE 06
        let bridge = bridge_codec();
        let bytes = bridge.encode(0x1234, FunctionCode::Beacon, b"").unwrap();
        assert_eq!(bytes, vec![0x12, 0x34, 0x12, 0x34, 0xBE, 0x06]);
        let frame = bridge.decode(&bytes).unwrap();
        assert_eq!(frame.wakeup_interval, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_unknown_function_rejected() {
        let bridge = bridge_codec();
        // Destination matches, function byte 0xFF is not in the table
        let bytes = [0x12, 0x34, 0x56, 0x78, 0xFF, 0x06];
        assert_eq!(
            bridge.decode(&bytes),
            Err(DecodeError::UnknownFunction(0xFF))
        );
    }

    #[test]
    fn test_address_filtering() {
        let bridge = bridge_codec();
        let stranger = [0x99, 0x99, 0x56, 0x78, 0xAA, 0x06];
        assert_eq!(bridge.decode(&stranger), Err(DecodeError::NotForUs(0x9999)));
        // The shared beacon address is accepted too
        let beacon_addressed = [0xBB, 0xBB, 0x56, 0x78, 0xAA, 0x06];
        assert!(bridge.decode(&beacon_addressed).is_ok());

        let node = node_codec();
        let for_node = bridge_codec().encode(0x5678, FunctionCode::Ack, b"").unwrap();
        assert!(node.decode(&for_node).is_ok());
        assert_eq!(
            node.decode(&[0x12, 0x34, 0x56, 0x78, 0xAC, 0x06]),
            Err(DecodeError::NotForUs(0x1234))
        );
    }

    #[test]
    fn test_truncated_header() {
        let bridge = bridge_codec();
        assert_eq!(bridge.decode(&[]), Err(DecodeError::Truncated));
        assert_eq!(
            bridge.decode(&[0x12, 0x34, 0x56, 0x78, 0xAA]),
            Err(DecodeError::Truncated)
        );
    }

    #[test]
    fn test_declared_length_overrun() {
        let bridge = bridge_codec();
        // Declares 10 bytes but only 6 arrived: rejected whole
        let bytes = [0x12, 0x34, 0x56, 0x78, 0xAA, 0x0A];
        assert_eq!(bridge.decode(&bytes), Err(DecodeError::Truncated));
        // Declares less than the header it must contain
        let bytes = [0x12, 0x34, 0x56, 0x78, 0xAA, 0x03];
        assert_eq!(bridge.decode(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_node_decode_missing_wakeup_is_truncated() {
        let node = node_codec();
        // Non-beacon frame towards a node must carry the wakeup field
        let bytes = [0x56, 0x78, 0x12, 0x34, 0xAA, 0x06];
        assert_eq!(node.decode(&bytes), Err(DecodeError::Truncated));
    }

    #[test]
    fn test_trailing_bytes_beyond_declared_length_ignored() {
        let node = node_codec();
        let mut bytes = bridge_codec()
            .encode(0x5678, FunctionCode::Config, b"\x42")
            .unwrap();
        bytes.extend_from_slice(b"\x00\x00");
        let frame = node.decode(&bytes).unwrap();
        assert_eq!(frame.payload, b"\x42");
    }

    #[test]
    fn test_oversize_frame_rejected_whole() {
        let bridge = bridge_codec();
        // Header + wakeup + 300 bytes = 308: does not fit the length byte
        assert!(matches!(
            bridge.encode(0x5678, FunctionCode::Config, &[0u8; 300]),
            Err(Error::OversizeFrame(308))
        ));
        // The largest frame that fits declares itself exactly
        let payload = [0u8; MAX_FRAME_LEN - HEADER_LEN - 2];
        let bytes = bridge
            .encode(0x5678, FunctionCode::Config, &payload)
            .unwrap();
        assert_eq!(bytes.len(), MAX_FRAME_LEN);
        assert_eq!(bytes[5], u8::MAX);
        // One more byte tips it over
        let payload = [0u8; MAX_FRAME_LEN - HEADER_LEN - 1];
        assert!(bridge
            .encode(0x5678, FunctionCode::Config, &payload)
            .is_err());
    }

    #[test]
    fn test_filtering_checked_before_function() {
        let bridge = bridge_codec();
        // Bad function byte AND foreign destination: filtering wins
        let bytes = [0x99, 0x99, 0x56, 0x78, 0xFF, 0x06];
        assert_eq!(bridge.decode(&bytes), Err(DecodeError::NotForUs(0x9999)));
    }
}
