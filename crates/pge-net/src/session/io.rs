//! Plumbing shared by the client and server loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::time::{Interval, MissedTickBehavior};

use super::callbacks::{CallbackSlot, ErrorHook};
use super::stats::SessionStats;
use crate::Result;
use crate::codec::{Codec, Packet};
use crate::error::NetworkError;
use crate::logging::targets;
use crate::transport::{Endpoint, Transport};

/// Inbound events a receive loop may queue before the owning loop catches up.
/// Datagrams arriving while the queue is full are dropped and counted.
pub(crate) const EVENT_QUEUE_CAPACITY: usize = 1024;

/// A decoded (or undecodable) datagram handed from a receive loop to the
/// loop that owns the session state.
pub(crate) struct Inbound<T> {
    pub source: Endpoint,
    pub packet: Result<Packet<T>>,
}

/// Everything a receive loop needs. The loop never touches session state; it
/// only publishes [`Inbound`] events.
pub(crate) struct Receiver<C: Codec> {
    pub transport: Arc<Transport>,
    pub codec: Arc<C>,
    pub timeout: Duration,
    pub running: Arc<AtomicBool>,
    pub stats: Arc<SessionStats>,
    pub events: mpsc::Sender<Inbound<C::Value>>,
}

impl<C: Codec> Receiver<C> {
    /// Receive until the running flag clears or the owning loop goes away.
    pub async fn run(self) {
        while self.running.load(Ordering::SeqCst) {
            let inbound = match self.transport.receive(self.timeout).await {
                Ok(Some(datagram)) => {
                    self.stats.record_received(datagram.data.len());
                    let packet = self.codec.decode(&datagram.data);
                    if packet.is_err() {
                        self.stats.record_decode_error();
                    }
                    Inbound {
                        source: datagram.source,
                        packet,
                    }
                }
                Ok(None) => continue,
                Err(e @ NetworkError::DatagramTooLarge { sender, .. }) => {
                    self.stats.record_oversized_datagram();
                    Inbound {
                        source: sender,
                        packet: Err(e),
                    }
                }
                Err(e) => {
                    self.stats.record_transport_error();
                    tracing::warn!(target: targets::TRANSPORT, error = %e, "receive failed");
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            if !self.publish(inbound) {
                break;
            }
        }

        tracing::trace!(target: targets::TRANSPORT, "receive loop exited");
    }

    /// Queue an event for the owning loop. Returns false once that loop is gone.
    fn publish(&self, inbound: Inbound<C::Value>) -> bool {
        match self.events.try_send(inbound) {
            Ok(()) => true,
            Err(TrySendError::Full(inbound)) => {
                self.stats.record_dropped_datagram();
                tracing::debug!(
                    target: targets::TRANSPORT,
                    source = %inbound.source,
                    "event queue full, datagram dropped"
                );
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// A tick interval that waits a full period after a late tick instead of
/// bursting to catch up.
pub(crate) fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Send `bytes` to `endpoint`, recording the outcome.
///
/// Oversized payloads go to the error hook. Socket failures are logged and
/// counted only.
pub(crate) async fn deliver(
    transport: &Transport,
    stats: &SessionStats,
    on_error: &CallbackSlot<ErrorHook>,
    endpoint: Endpoint,
    bytes: &[u8],
) {
    match transport.send(endpoint, bytes).await {
        Ok(sent) => stats.record_sent(sent),
        Err(e @ NetworkError::PayloadTooLarge { .. }) => {
            stats.record_rejected_send();
            tracing::warn!(target: targets::TRANSPORT, %endpoint, error = %e, "send rejected");
            on_error.report(&e);
        }
        Err(e) => {
            stats.record_transport_error();
            tracing::warn!(target: targets::TRANSPORT, %endpoint, error = %e, "send failed");
        }
    }
}
