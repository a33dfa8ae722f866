//! Paced outbound frame writer
//!
//! The radio cannot absorb back-to-back frames, so outbound traffic goes
//! through a FIFO queue drained at one frame per fixed tick. Throughput is
//! bounded by tick period times frame size; that latency is the contract.

use std::io;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::core::{Error, Result, TRANSMIT_TICK};
use crate::link::{RadioPort, SystemPort};

/// Destination for paced frame writes
pub trait FrameSink: Send {
    /// Writes one raw frame
    fn write_frame(&mut self, bytes: &[u8]) -> Result<()>;
}

impl FrameSink for SystemPort {
    fn write_frame(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_all_bytes(bytes)
            .map_err(|e: io::Error| Error::link_write(e.to_string()))
    }
}

/// Handle for enqueuing outbound frames.
///
/// The queue is unbounded: nothing upstream can carry a backpressure
/// signal, so enqueueing never blocks and never fails while the scheduler
/// is alive.
#[derive(Clone)]
pub struct TransmitQueue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl TransmitQueue {
    /// Queues a raw frame for transmission on a future tick
    pub fn enqueue(&self, frame: Vec<u8>) {
        if self.tx.send(frame).is_err() {
            warn!("transmit scheduler gone, dropping outbound frame");
        }
    }

    /// Queue plus the raw receiving end, for tests that inspect what was
    /// enqueued without running a scheduler
    #[cfg(test)]
    pub(crate) fn test_pair() -> (TransmitQueue, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TransmitQueue { tx }, rx)
    }
}

/// Drains the transmit queue at a fixed cadence, one frame per tick.
pub struct TransmitScheduler<S: FrameSink> {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    sink: S,
    tick: Duration,
}

impl<S: FrameSink> TransmitScheduler<S> {
    /// Creates a scheduler writing to `sink` on the default tick
    pub fn new(sink: S) -> (TransmitQueue, Self) {
        Self::with_tick(sink, TRANSMIT_TICK)
    }

    /// Creates a scheduler with an explicit tick period
    pub fn with_tick(sink: S, tick: Duration) -> (TransmitQueue, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (TransmitQueue { tx }, TransmitScheduler { rx, sink, tick })
    }

    /// Runs until the stop signal fires or every queue handle is dropped.
    ///
    /// A failed write is logged and the frame dropped, never retried;
    /// undelivered-frame loss is an accepted failure mode of this
    /// transport.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.rx.try_recv() {
                        Ok(frame) => {
                            debug!(len = frame.len(), "writing outbound frame");
                            if let Err(e) = self.sink.write_frame(&frame) {
                                warn!("dropping outbound frame: {}", e);
                            }
                        }
                        Err(mpsc::error::TryRecvError::Empty) => {}
                        Err(mpsc::error::TryRecvError::Disconnected) => break,
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
