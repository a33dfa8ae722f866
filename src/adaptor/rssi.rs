//! Signal-strength query sub-protocol
//!
//! A short-lived state machine layered on top of normal reception: one
//! probe command, one echoed acknowledgement, one numeric reading. Every
//! request resolves to exactly one reading on the rssi channel, either the
//! parsed value or the sentinel.

use tokio::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::core::{RSSI_SENTINEL, RSSI_TIMEOUT};
use crate::link::handshake::{CMD_ACK, CMD_RSSI_PROBE};

use super::transmit::TransmitQueue;

/// What the controller made of a burst
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RssiOutcome {
    /// Not part of an RSSI exchange; hand the burst to the frame decoder
    Ignored,
    /// Part of the exchange, no reading yet
    Consumed,
    /// The exchange resolved with this reading (value or sentinel)
    Reading(i32),
}

/// Ephemeral session state; exists only between request and resolution
#[derive(Debug)]
struct RssiSession {
    awaiting_ack: bool,
    awaiting_reading: bool,
    deadline: Instant,
}

/// Runs RSSI queries against the modem. At most one session may be
/// outstanding at a time.
pub struct RssiController {
    session: Option<RssiSession>,
    timeout: Duration,
}

impl Default for RssiController {
    fn default() -> Self {
        Self::new()
    }
}

impl RssiController {
    /// Creates an idle controller with the standard query timeout
    pub fn new() -> Self {
        RssiController {
            session: None,
            timeout: RSSI_TIMEOUT,
        }
    }

    /// Whether a query is outstanding
    pub fn is_pending(&self) -> bool {
        self.session.is_some()
    }

    /// Deadline of the outstanding session, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.session.as_ref().map(|s| s.deadline)
    }

    /// Starts a query by enqueuing the probe command.
    ///
    /// Returns false if a session is already outstanding; the new request
    /// is rejected rather than overwriting the pending session's flags.
    pub fn request(&mut self, queue: &TransmitQueue) -> bool {
        if self.session.is_some() {
            warn!("rssi query already outstanding, rejecting request");
            return false;
        }
        queue.enqueue(CMD_RSSI_PROBE.to_vec());
        self.session = Some(RssiSession {
            awaiting_ack: true,
            awaiting_reading: false,
            deadline: Instant::now() + self.timeout,
        });
        true
    }

    /// Offers a received burst to the outstanding session.
    ///
    /// The probe echo moves the session to awaiting-reading (and sends the
    /// "ACK" the modem expects); the next burst is then parsed as the
    /// reading. A reading that fails to parse resolves to the sentinel, the
    /// same as a timeout, and never surfaces as an error.
    pub fn offer_burst(&mut self, burst: &[u8], queue: &TransmitQueue) -> RssiOutcome {
        let Some(session) = self.session.as_mut() else {
            return RssiOutcome::Ignored;
        };
        if session.awaiting_ack {
            if burst == CMD_RSSI_PROBE {
                debug!("rssi probe acknowledged");
                queue.enqueue(CMD_ACK.to_vec());
                session.awaiting_ack = false;
                session.awaiting_reading = true;
                return RssiOutcome::Consumed;
            }
            // An ordinary frame may arrive mid-session
            return RssiOutcome::Ignored;
        }
        if session.awaiting_reading {
            let reading = parse_reading(burst).unwrap_or_else(|| {
                warn!("unparseable rssi reading, emitting sentinel");
                RSSI_SENTINEL
            });
            self.session = None;
            return RssiOutcome::Reading(reading);
        }
        RssiOutcome::Ignored
    }

    /// Resolves the session with the sentinel if its deadline has passed
    pub fn check_timeout(&mut self, now: Instant) -> Option<i32> {
        match &self.session {
            Some(session) if now >= session.deadline => {
                debug!("rssi query timed out");
                self.session = None;
                Some(RSSI_SENTINEL)
            }
            _ => None,
        }
    }
}

/// Parses the modem's ASCII signal-strength reading
fn parse_reading(burst: &[u8]) -> Option<i32> {
    std::str::from_utf8(burst).ok()?.trim().parse::<i32>().ok()
}
