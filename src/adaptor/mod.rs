//! The radio adaptor: wiring between the serial link, the frame codec and
//! the host message bus
//!
//! Exactly one blocking task owns reads from the link; outbound frames go
//! through the paced transmit tick on an independent port handle. Decoded
//! frames reach the event loop over a channel rather than shared fields.

pub mod dispatch;
pub mod rssi;
pub mod transmit;

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::core::{
    characteristics, AdaptorState, Error, RadioConfig, Result, COMMAND_DELAY, READ_TIMEOUT,
};
use crate::link::handshake::HandshakeController;
use crate::link::{RadioPort, SerialLink};
use crate::protocol::FrameCodec;

pub use self::dispatch::{AppCommand, AppId, AppRequest, BusEvent, CharacteristicData};

use self::dispatch::{now_timestamp, Dispatcher};
use self::rssi::{RssiController, RssiOutcome};
use self::transmit::{FrameSink, TransmitQueue, TransmitScheduler};

/// Publishes lifecycle state on the manager status channel.
///
/// Once the session is up, `Error` is cleared back to `Running`, never to
/// `Starting`; a dead link is recovered by restarting the adaptor.
struct StatusReporter {
    state: AdaptorState,
    events: mpsc::Sender<BusEvent>,
}

impl StatusReporter {
    fn new(events: mpsc::Sender<BusEvent>) -> Self {
        StatusReporter {
            state: AdaptorState::Stopped,
            events,
        }
    }

    async fn set(&mut self, next: AdaptorState) -> Result<()> {
        self.state = next;
        info!(state = ?next, "adaptor state");
        self.events
            .send(BusEvent::State { state: next })
            .await
            .map_err(|e| Error::bus(format!("status channel closed: {}", e)))
    }

    async fn announce_service(&self, app_id: AppId) -> Result<()> {
        self.events
            .send(BusEvent::Service {
                app_id,
                characteristics: characteristics::ALL.iter().map(|s| s.to_string()).collect(),
            })
            .await
            .map_err(|e| Error::bus(format!("event channel closed: {}", e)))
    }
}

/// Bridges one radio modem to the host message bus.
///
/// Constructed with the outward event channel and the inbound request
/// channel; [`run`](RadioAdaptor::run) owns the whole session and returns
/// when the request channel closes or the link dies.
pub struct RadioAdaptor {
    config: RadioConfig,
    events: mpsc::Sender<BusEvent>,
    requests: mpsc::Receiver<AppRequest>,
    command_delay: Duration,
}

impl RadioAdaptor {
    /// Creates an adaptor for the given configuration and bus channels
    pub fn new(
        config: RadioConfig,
        events: mpsc::Sender<BusEvent>,
        requests: mpsc::Receiver<AppRequest>,
    ) -> Self {
        RadioAdaptor {
            config,
            events,
            requests,
            command_delay: COMMAND_DELAY,
        }
    }

    /// Opens the serial device and runs the session to completion.
    ///
    /// A failed open is fatal: the adaptor reports the error state and
    /// returns; restarting the adaptor is the recovery path.
    pub async fn run(self) -> Result<()> {
        let mut status = StatusReporter::new(self.events.clone());
        status.set(AdaptorState::Starting).await?;
        let link = match SerialLink::open(&self.config) {
            Ok(link) => link,
            Err(e) => {
                error!("cannot open radio link: {}", e);
                status.set(AdaptorState::Error).await.ok();
                return Err(e);
            }
        };
        let writer = match link.writer_handle() {
            Ok(writer) => writer,
            Err(e) => {
                error!("cannot clone radio link for writing: {}", e);
                status.set(AdaptorState::Error).await.ok();
                return Err(e);
            }
        };
        self.run_session(link, writer, status).await
    }

    /// Runs the session on an already-open link (also the test entry point)
    async fn run_session<P, W>(
        self,
        mut link: SerialLink<P>,
        writer: W,
        mut status: StatusReporter,
    ) -> Result<()>
    where
        P: RadioPort + 'static,
        W: FrameSink + 'static,
    {
        let RadioAdaptor {
            config,
            events,
            mut requests,
            command_delay,
        } = self;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (queue, scheduler) = TransmitScheduler::new(writer);
        let writer_task = tokio::spawn(scheduler.run(stop_rx.clone()));

        // The reader thread owns all blocking reads and the handshake; it
        // exits after its current read once the stop flag flips.
        let (burst_tx, mut burst_rx) = mpsc::channel::<Vec<u8>>(32);
        let mut handshake = HandshakeController::with_delay(&config, command_delay);
        let reader_stop = stop_rx;
        let reader_task = tokio::task::spawn_blocking(move || -> Result<()> {
            handshake.configure(&mut link)?;
            while !*reader_stop.borrow() {
                let burst = match link.read_burst() {
                    Ok(burst) => burst,
                    Err(e) => {
                        warn!("read error, continuing: {}", e);
                        // A dead port fails instantly; pace the retries
                        std::thread::sleep(READ_TIMEOUT);
                        continue;
                    }
                };
                if burst.is_empty() {
                    continue;
                }
                // Modem-protocol bytes take precedence over frame decoding
                match handshake.handle_inline(&burst, &mut link) {
                    Ok(true) => continue,
                    Ok(false) => {}
                    Err(e) => {
                        warn!("inline handshake reply failed: {}", e);
                        continue;
                    }
                }
                if burst_tx.blocking_send(burst).is_err() {
                    break;
                }
            }
            Ok(())
        });

        let codec = FrameCodec::new(&config);
        let mut dispatcher = Dispatcher::new(&config, events, queue.clone());
        let mut rssi = RssiController::new();

        let result = loop {
            tokio::select! {
                maybe_burst = burst_rx.recv() => match maybe_burst {
                    Some(burst) => {
                        if let Err(e) = handle_burst(&burst, &codec, &dispatcher, &mut rssi, &queue).await {
                            break Err(e);
                        }
                    }
                    None => break Ok(()),
                },
                maybe_request = requests.recv() => match maybe_request {
                    Some(request) => {
                        if let Err(e) = handle_request(request, &mut dispatcher, &mut rssi, &mut status).await {
                            break Err(e);
                        }
                    }
                    // The bus hung up: that is the stop signal
                    None => break Ok(()),
                },
                _ = sleep_until(rssi_wakeup(&rssi)), if rssi.is_pending() => {
                    if let Some(value) = rssi.check_timeout(Instant::now()) {
                        let data = CharacteristicData::Rssi { value };
                        if let Err(e) = dispatcher
                            .dispatch(characteristics::RSSI, data, now_timestamp())
                            .await
                        {
                            break Err(e);
                        }
                    }
                }
            }
        };

        let _ = stop_tx.send(true);
        drop(burst_rx);
        let reader_result = reader_task
            .await
            .map_err(|e| Error::internal(format!("reader task failed: {}", e)))?;
        let _ = writer_task.await;
        if let Err(e) = reader_result {
            error!("radio session failed: {}", e);
            status.set(AdaptorState::Error).await.ok();
            return Err(e);
        }
        status.set(AdaptorState::Stopped).await.ok();
        result
    }
}

/// Deadline the event loop sleeps towards while an RSSI query is pending
fn rssi_wakeup(rssi: &RssiController) -> Instant {
    rssi.deadline()
        .unwrap_or_else(|| Instant::now() + Duration::from_secs(3600))
}

/// Routes one received burst: RSSI session first, then frame decoding.
///
/// Decode failures are local: the burst is logged at debug level, surfaced
/// base64-coded on the spur channel, and dropped.
async fn handle_burst(
    burst: &[u8],
    codec: &FrameCodec,
    dispatcher: &Dispatcher,
    rssi: &mut RssiController,
    queue: &TransmitQueue,
) -> Result<()> {
    let timestamp = now_timestamp();
    match rssi.offer_burst(burst, queue) {
        RssiOutcome::Consumed => return Ok(()),
        RssiOutcome::Reading(value) => {
            return dispatcher
                .dispatch(
                    characteristics::RSSI,
                    CharacteristicData::Rssi { value },
                    timestamp,
                )
                .await;
        }
        RssiOutcome::Ignored => {}
    }
    match codec.decode(burst) {
        Ok(frame) => {
            debug!(function = ?frame.function, source = frame.source, "frame received");
            dispatcher
                .dispatch(
                    characteristics::BUTTON,
                    CharacteristicData::Button {
                        function: frame.function,
                        wakeup: frame.wakeup_interval,
                        data: frame.payload,
                    },
                    timestamp,
                )
                .await
        }
        Err(e) => {
            debug!("dropping burst: {}", e);
            dispatcher
                .dispatch(
                    characteristics::SPUR,
                    CharacteristicData::Raw {
                        data: BASE64.encode(burst),
                    },
                    timestamp,
                )
                .await
        }
    }
}

/// Handles one request from the host bus
async fn handle_request(
    request: AppRequest,
    dispatcher: &mut Dispatcher,
    rssi: &mut RssiController,
    status: &mut StatusReporter,
) -> Result<()> {
    match request {
        AppRequest::Init { app_id } => {
            status.announce_service(app_id).await?;
            status.set(AdaptorState::Running).await
        }
        AppRequest::Subscribe {
            app_id,
            characteristics,
        } => {
            dispatcher.subscribe(&app_id, &characteristics);
            Ok(())
        }
        AppRequest::Command { app_id, command } => {
            dispatcher.handle_command(&app_id, command, rssi);
            Ok(())
        }
    }
}
