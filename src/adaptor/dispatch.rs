//! Event fan-out and app command routing
//!
//! Keeps the per-characteristic subscription table, delivers decoded
//! events to every current subscriber, and turns app commands into encoded
//! outbound frames or RSSI requests.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::core::{characteristics, AdaptorState, Error, FunctionCode, RadioConfig, Result};
use crate::protocol::FrameCodec;

use super::rssi::RssiController;
use super::transmit::TransmitQueue;

/// Identity of an app on the host bus
pub type AppId = String;

/// Payload of a characteristic event
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CharacteristicData {
    /// A decoded application frame
    Button {
        function: FunctionCode,
        wakeup: u16,
        data: Vec<u8>,
    },
    /// An undecodable burst, base64 encoded
    Raw { data: String },
    /// A signal-strength reading
    Rssi { value: i32 },
}

/// Events emitted to the host message bus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BusEvent {
    /// One characteristic event delivered to one subscriber
    Characteristic {
        app_id: AppId,
        characteristic: String,
        data: CharacteristicData,
        /// Capture time, epoch seconds
        timestamp: f64,
    },
    /// Adaptor lifecycle state, for the manager status channel
    State { state: AdaptorState },
    /// Service announce sent in reply to an app's init
    Service {
        app_id: AppId,
        characteristics: Vec<String>,
    },
}

/// Commands an app may send
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum AppCommand {
    /// Encode and transmit a frame
    Send {
        destination: u16,
        /// Function name as spelled on the bus, e.g. "include_grant"
        function: String,
        #[serde(default)]
        data: Vec<u8>,
    },
    /// Run a signal-strength query
    RequestRssi,
}

/// Requests arriving from the host bus
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub enum AppRequest {
    /// App came up and wants the service announce
    Init { app_id: AppId },
    /// Replace the app's subscription set with the named characteristics
    Subscribe {
        app_id: AppId,
        characteristics: Vec<String>,
    },
    /// Route a command
    Command { app_id: AppId, command: AppCommand },
}

/// Current capture timestamp in epoch seconds
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1e6
}

/// Routes decoded frames out to subscribers and app commands in to the
/// codec and transmit queue.
pub struct Dispatcher {
    /// Ordered subscriber identities per characteristic
    subscriptions: HashMap<&'static str, Vec<AppId>>,
    events: mpsc::Sender<BusEvent>,
    codec: FrameCodec,
    queue: TransmitQueue,
}

impl Dispatcher {
    /// Creates a dispatcher serving the adaptor's characteristics
    pub fn new(config: &RadioConfig, events: mpsc::Sender<BusEvent>, queue: TransmitQueue) -> Self {
        let subscriptions = characteristics::ALL
            .iter()
            .map(|&name| (name, Vec::new()))
            .collect();
        Dispatcher {
            subscriptions,
            events,
            codec: FrameCodec::new(config),
            queue,
        }
    }

    /// Replaces an app's subscriptions with the named characteristics.
    ///
    /// The identity is first removed from every characteristic, so
    /// re-subscription is idempotent and never leaves stale or duplicate
    /// entries. Unknown characteristic names are logged and skipped.
    pub fn subscribe(&mut self, app_id: &str, requested: &[String]) {
        for subscribers in self.subscriptions.values_mut() {
            subscribers.retain(|id| id != app_id);
        }
        for name in requested {
            match self.subscriptions.get_mut(name.as_str()) {
                Some(subscribers) => {
                    if !subscribers.iter().any(|id| id == app_id) {
                        subscribers.push(app_id.to_string());
                    }
                }
                None => warn!(characteristic = %name, "subscription to unknown characteristic"),
            }
        }
        debug!(app_id, ?requested, "subscriptions updated");
    }

    /// Delivers an event to every current subscriber of a characteristic.
    ///
    /// Zero subscribers is not an error; the event is simply dropped.
    pub async fn dispatch(
        &self,
        characteristic: &str,
        data: CharacteristicData,
        timestamp: f64,
    ) -> Result<()> {
        let Some(subscribers) = self.subscriptions.get(characteristic) else {
            return Ok(());
        };
        for app_id in subscribers {
            self.events
                .send(BusEvent::Characteristic {
                    app_id: app_id.clone(),
                    characteristic: characteristic.to_string(),
                    data: data.clone(),
                    timestamp,
                })
                .await
                .map_err(|e| Error::bus(format!("event channel closed: {}", e)))?;
        }
        Ok(())
    }

    /// Routes one app command.
    ///
    /// Malformed commands (unknown function names) are logged and ignored;
    /// they never crash the adaptor.
    pub fn handle_command(&mut self, app_id: &str, command: AppCommand, rssi: &mut RssiController) {
        match command {
            AppCommand::Send {
                destination,
                function,
                data,
            } => {
                let Some(function) = FunctionCode::from_name(&function) else {
                    warn!(app_id, %function, "command names an unknown function, ignoring");
                    return;
                };
                let frame = match self.codec.encode(destination, function, &data) {
                    Ok(frame) => frame,
                    Err(e) => {
                        warn!(app_id, "rejecting send command: {}", e);
                        return;
                    }
                };
                debug!(app_id, ?function, len = frame.len(), "frame queued");
                self.queue.enqueue(frame);
            }
            AppCommand::RequestRssi => {
                rssi.request(&self.queue);
            }
        }
    }
}
