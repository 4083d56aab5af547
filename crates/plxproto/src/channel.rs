//! Duplex message channels.
//!
//! A [`MessagePort`] is one end of an ordered, asynchronous channel: an
//! outbound [`Transport`] plus an inbound receiver of encoded frames. Only the
//! in-process loopback transport lives here; cross-process transports plug in
//! through the same trait.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::error::ChannelError;

/// Outbound half of a port.
pub trait Transport: Send + Sync + 'static {
    /// Deliver one encoded frame to the peer, in order.
    fn post_message(&self, frame: String) -> Result<(), ChannelError>;

    /// Stop delivering. The peer's inbound stream ends once drained.
    fn close(&self);
}

/// One end of a channel.
pub struct MessagePort {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) inbound: mpsc::UnboundedReceiver<String>,
}

impl MessagePort {
    pub fn new(transport: Arc<dyn Transport>, inbound: mpsc::UnboundedReceiver<String>) -> Self {
        Self { transport, inbound }
    }

    /// Split into the raw halves, for callers driving a port by hand.
    pub fn into_parts(self) -> (Arc<dyn Transport>, mpsc::UnboundedReceiver<String>) {
        (self.transport, self.inbound)
    }
}

impl std::fmt::Debug for MessagePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagePort").finish_non_exhaustive()
    }
}

/// In-process transport backed by an unbounded mpsc sender.
#[derive(Debug)]
struct LoopbackTransport {
    tx: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Transport for LoopbackTransport {
    fn post_message(&self, frame: String) -> Result<(), ChannelError> {
        let guard = self.tx.lock().expect("loopback transport mutex poisoned");
        match guard.as_ref() {
            Some(tx) => tx.send(frame).map_err(|_| ChannelError::Closed),
            None => Err(ChannelError::Closed),
        }
    }

    fn close(&self) {
        self.tx.lock().expect("loopback transport mutex poisoned").take();
    }
}

/// A pair of connected in-process ports.
#[derive(Debug)]
pub struct MessageChannel {
    pub port1: MessagePort,
    pub port2: MessagePort,
}

impl MessageChannel {
    pub fn new() -> Self {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();

        // port1 writes into rx2, port2 writes into rx1
        let port1 = MessagePort::new(
            Arc::new(LoopbackTransport {
                tx: Mutex::new(Some(tx2)),
            }),
            rx1,
        );
        let port2 = MessagePort::new(
            Arc::new(LoopbackTransport {
                tx: Mutex::new(Some(tx1)),
            }),
            rx2,
        );

        Self { port1, port2 }
    }

    pub fn into_ports(self) -> (MessagePort, MessagePort) {
        (self.port1, self.port2)
    }
}

impl Default for MessageChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_loopback_delivers_in_order() {
        let (a, b) = MessageChannel::new().into_ports();
        let (a_tx, _a_rx) = a.into_parts();
        let (_b_tx, mut b_rx) = b.into_parts();

        a_tx.post_message("one".into()).unwrap();
        a_tx.post_message("two".into()).unwrap();

        assert_eq!(b_rx.recv().await.as_deref(), Some("one"));
        assert_eq!(b_rx.recv().await.as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream() {
        let (a, b) = MessageChannel::new().into_ports();
        let (a_tx, _a_rx) = a.into_parts();
        let (_b_tx, mut b_rx) = b.into_parts();

        a_tx.post_message("last".into()).unwrap();
        a_tx.close();

        assert_eq!(a_tx.post_message("late".into()), Err(ChannelError::Closed));
        assert_eq!(b_rx.recv().await.as_deref(), Some("last"));
        assert_eq!(b_rx.recv().await, None);
    }
}
