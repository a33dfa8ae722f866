//! Modem configuration handshake
//!
//! Drives the LPRS easyRadio modem through its "ER_CMD" command set: the
//! fixed startup sequence and the two peer-initiated over-the-air
//! reconfiguration exchanges that arrive inline in the byte stream.

use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::core::{RadioConfig, Result, COMMAND_DELAY};

use super::{RadioPort, SerialLink};

/// Enables per-packet RSSI reporting
pub const CMD_RSSI_REPORTING: &[u8] = b"ER_CMD#a00";

/// Sets the 12.5 kHz bandwidth; also the literal the modem sends to open
/// the over-the-air frequency negotiation
pub const CMD_BANDWIDTH: &[u8] = b"ER_CMD#B0";

/// One-shot RSSI probe
pub const CMD_RSSI_PROBE: &[u8] = b"ER_CMD#T8";

/// Literal acknowledgement string
pub const CMD_ACK: &[u8] = b"ACK";

/// Builds the channel/frequency-set command for a channel number
pub fn channel_command(channel: u8) -> Vec<u8> {
    format!("ER_CMD#C{}", channel).into_bytes()
}

/// Handshake progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    Stopped,
    Configuring,
    Listening,
}

/// Drives the modem into its operating mode and services the inline
/// reconfiguration exchanges once listening.
pub struct HandshakeController {
    state: HandshakeState,
    channel: u8,
    command_delay: Duration,
}

impl HandshakeController {
    /// Creates a controller for the configured radio channel
    pub fn new(config: &RadioConfig) -> Self {
        HandshakeController {
            state: HandshakeState::Stopped,
            channel: config.channel,
            command_delay: COMMAND_DELAY,
        }
    }

    /// Creates a controller with an explicit inter-command settling delay
    pub fn with_delay(config: &RadioConfig, command_delay: Duration) -> Self {
        HandshakeController {
            command_delay,
            ..HandshakeController::new(config)
        }
    }

    /// Current handshake state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Runs the fixed startup sequence: RSSI reporting, then bandwidth,
    /// each command acknowledged by us with the literal "ACK".
    ///
    /// The modem's replies are deliberately not read here; the fixed delay
    /// after each write is the whole synchronization. A modem that never
    /// answers degrades silently rather than failing the session.
    pub fn configure<P: RadioPort>(&mut self, link: &mut SerialLink<P>) -> Result<()> {
        self.state = HandshakeState::Configuring;
        for command in [CMD_RSSI_REPORTING, CMD_ACK, CMD_BANDWIDTH, CMD_ACK] {
            link.write(command)?;
            thread::sleep(self.command_delay);
        }
        self.state = HandshakeState::Listening;
        info!("radio initialised");
        Ok(())
    }

    /// Services modem-protocol bytes observed inline in the stream.
    ///
    /// Must be offered every burst before frame decoding is attempted;
    /// matching is exact byte-string equality. Returns whether the burst
    /// was consumed.
    ///
    /// Two exchanges are handled: the modem opening bandwidth negotiation
    /// (answered with "ACK", then the channel command after a settling
    /// delay) and the modem acknowledging the new frequency (answered with
    /// "ACK").
    pub fn handle_inline<P: RadioPort>(
        &mut self,
        burst: &[u8],
        link: &mut SerialLink<P>,
    ) -> Result<bool> {
        if self.state != HandshakeState::Listening {
            return Ok(false);
        }
        if burst == CMD_BANDWIDTH {
            debug!("bandwidth negotiation from modem, sending channel");
            link.write(CMD_ACK)?;
            thread::sleep(self.command_delay);
            link.write(&channel_command(self.channel))?;
            return Ok(true);
        }
        if burst == channel_command(self.channel).as_slice() {
            debug!(channel = self.channel, "frequency change acknowledged");
            link.write(CMD_ACK)?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{RadioConfig, RadioRole};
    use crate::link::testing::MockPort;

    fn config() -> RadioConfig {
        RadioConfig::new("/dev/null", RadioRole::Bridge, 0x1234, &[], 5)
    }

    fn fast_controller() -> HandshakeController {
        HandshakeController::with_delay(&config(), Duration::ZERO)
    }

    #[test]
    fn test_configure_sequence() {
        let mut controller = fast_controller();
        let mut link = SerialLink::with_port(MockPort::new());
        assert_eq!(controller.state(), HandshakeState::Stopped);
        controller.configure(&mut link).unwrap();
        assert_eq!(controller.state(), HandshakeState::Listening);
        assert_eq!(
            link.port.written(),
            vec![
                b"ER_CMD#a00".to_vec(),
                b"ACK".to_vec(),
                b"ER_CMD#B0".to_vec(),
                b"ACK".to_vec(),
            ]
        );
    }

    #[test]
    fn test_bandwidth_negotiation_answered() {
        let mut controller = fast_controller();
        let mut link = SerialLink::with_port(MockPort::new());
        controller.configure(&mut link).unwrap();
        let consumed = controller.handle_inline(b"ER_CMD#B0", &mut link).unwrap();
        assert!(consumed);
        let written = link.port.written();
        assert_eq!(written[4], b"ACK".to_vec());
        assert_eq!(written[5], b"ER_CMD#C5".to_vec());
    }

    #[test]
    fn test_frequency_ack_answered() {
        let mut controller = fast_controller();
        let mut link = SerialLink::with_port(MockPort::new());
        controller.configure(&mut link).unwrap();
        let consumed = controller.handle_inline(b"ER_CMD#C5", &mut link).unwrap();
        assert!(consumed);
        assert_eq!(link.port.written().last().unwrap(), &b"ACK".to_vec());
    }

    #[test]
    fn test_frame_bursts_pass_through() {
        let mut controller = fast_controller();
        let mut link = SerialLink::with_port(MockPort::new());
        controller.configure(&mut link).unwrap();
        let frame = [0x12, 0x34, 0x56, 0x78, 0xAA, 0x06];
        assert!(!controller.handle_inline(&frame, &mut link).unwrap());
        // Near-misses must not match either: equality is exact
        assert!(!controller.handle_inline(b"ER_CMD#B01", &mut link).unwrap());
        assert!(!controller.handle_inline(b"ER_CMD#C6", &mut link).unwrap());
    }

    #[test]
    fn test_inline_ignored_before_listening() {
        let mut controller = fast_controller();
        let mut link = SerialLink::with_port(MockPort::new());
        assert!(!controller.handle_inline(b"ER_CMD#B0", &mut link).unwrap());
        assert!(link.port.written().is_empty());
    }
}
