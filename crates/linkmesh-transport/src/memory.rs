//! An in-memory reference transport.
//!
//! This is the one concrete [`Transport`] linkmesh ships. It exists to
//! exercise `linkmesh-conn` end-to-end without a real network.
//!
//! Two [`MemoryTransport`] handles share a [`MemoryHub`]: one side calls
//! [`Transport::listen`] to register an acceptor, the other calls
//! [`Transport::connect`] to dial it. `connect` invokes the listener's
//! `on_accept` synchronously (there is no wire in between) and wires both
//! ends to a pair of unbounded channels pumped on spawned tasks.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use linkmesh_core::error::ConnError;
use linkmesh_core::message::WireMessage;
use linkmesh_core::metadata::Metadata;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::runtime::AsyncMutex;
use crate::traits::{CreateProcessor, OnAccept, PortHandlers, PortProcessor, Transport};

/// Shared rendezvous point between a listening and a dialing
/// [`MemoryTransport`]. Analogous to a loopback address: whoever holds a
/// clone of the same hub can reach whoever is listening on it.
#[derive(Default)]
pub struct MemoryHub {
    acceptor: AsyncMutex<Option<OnAccept>>,
}

impl MemoryHub {
    /// A hub with no registered acceptor.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// The in-memory reference transport. One instance plays the listening
/// role (it calls `listen`), any number can play the dialing role (they
/// call `connect`), all sharing the same [`MemoryHub`].
pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    /// Platform metadata this transport reports for channels it accepts or
    /// dials, e.g. a stand-in for a peer address a real transport would
    /// discover.
    local_platform_metadata: Metadata,
}

impl MemoryTransport {
    /// A transport bound to `hub`, reporting `local_platform_metadata` for
    /// channels it participates in.
    #[must_use]
    pub fn new(hub: Arc<MemoryHub>, local_platform_metadata: Metadata) -> Self {
        Self {
            hub,
            local_platform_metadata,
        }
    }

    /// A pair of transports sharing a fresh hub, with empty platform
    /// metadata on both sides. Convenient for tests.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let hub = MemoryHub::new();
        (
            Self::new(Arc::clone(&hub), Metadata::empty()),
            Self::new(hub, Metadata::empty()),
        )
    }
}

/// One end of a channel wired by [`MemoryTransport`].
struct MemoryPortProcessor {
    outbox: mpsc::UnboundedSender<WireMessage>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl PortProcessor for MemoryPortProcessor {
    async fn send(&self, msg: WireMessage) -> Result<(), ConnError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed.into());
        }
        self.outbox
            .send(msg)
            .map_err(|_| TransportError::ConnectionClosed.into())
    }

    async fn close(&self) -> Result<(), ConnError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Spawn a task that delivers every message arriving on `inbox` to
/// `handlers`, then calls `on_disconnect` once the peer drops its sender.
fn spawn_pump(mut inbox: mpsc::UnboundedReceiver<WireMessage>, handlers: Arc<dyn PortHandlers>) {
    tokio::spawn(async move {
        while let Some(msg) = inbox.recv().await {
            handlers.on_logical_message(msg);
        }
        handlers.on_disconnect();
    });
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn listen(&self, on_accept: OnAccept) -> Result<(), ConnError> {
        *self.hub.acceptor.lock().await = Some(on_accept);
        Ok(())
    }

    async fn connect(
        &self,
        descriptor: &Metadata,
        handlers: Arc<dyn PortHandlers>,
    ) -> Result<(Box<dyn PortProcessor>, Metadata), ConnError> {
        let on_accept = self.hub.acceptor.lock().await.clone().ok_or_else(|| {
            ConnError::from(TransportError::NoDialTarget {
                descriptor: descriptor.canonical_json(),
            })
        })?;

        let (to_listener, from_dialer) = mpsc::unbounded_channel::<WireMessage>();
        let (to_dialer, from_listener) = mpsc::unbounded_channel::<WireMessage>();

        let listener_closed = Arc::new(AtomicBool::new(false));
        let listener_processor = MemoryPortProcessor {
            outbox: to_dialer,
            closed: Arc::clone(&listener_closed),
        };
        let create_processor: CreateProcessor = Box::new(move |listener_handlers| {
            spawn_pump(from_dialer, listener_handlers);
            Box::new(listener_processor)
        });

        on_accept(create_processor, self.local_platform_metadata.clone());

        let dialer_closed = Arc::new(AtomicBool::new(false));
        let dialer_processor = MemoryPortProcessor {
            outbox: to_listener,
            closed: dialer_closed,
        };
        spawn_pump(from_listener, handlers);

        Ok((
            Box::new(dialer_processor),
            self.local_platform_metadata.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    struct RecordingHandlers {
        messages: StdMutex<Vec<WireMessage>>,
        disconnected: AtomicBool,
    }

    impl RecordingHandlers {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                messages: StdMutex::new(Vec::new()),
                disconnected: AtomicBool::new(false),
            })
        }
    }

    impl PortHandlers for RecordingHandlers {
        fn on_logical_message(&self, msg: WireMessage) {
            self.messages.lock().unwrap().push(msg);
        }

        fn on_disconnect(&self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }

        fn on_protocol_error(&self, _err: ConnError) {}
    }

    #[tokio::test]
    async fn connect_without_listener_fails() {
        let (dialer, _listener) = MemoryTransport::pair();
        let handlers = RecordingHandlers::new();
        let err = dialer
            .connect(&Metadata::empty(), handlers)
            .await
            .unwrap_err();
        assert!(err.is_endpoint());
    }

    #[tokio::test]
    async fn connect_invokes_listener_accept_and_pumps_messages() {
        let (dialer, listener) = MemoryTransport::pair();
        let listener_handlers = RecordingHandlers::new();
        let listener_handlers_for_accept = Arc::clone(&listener_handlers);

        listener
            .listen(Arc::new(move |create_processor, _platform_metadata| {
                let _processor = create_processor(listener_handlers_for_accept.clone());
            }))
            .await
            .unwrap();

        let dialer_handlers = RecordingHandlers::new();
        let (processor, _platform_metadata) = dialer
            .connect(&Metadata::empty(), Arc::clone(&dialer_handlers) as Arc<dyn PortHandlers>)
            .await
            .unwrap();

        processor
            .send(WireMessage::IdentityUpdate {
                updates: Metadata::empty(),
            })
            .await
            .unwrap();

        // Give the pump task a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(listener_handlers.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn close_rejects_further_sends() {
        let (dialer, listener) = MemoryTransport::pair();
        listener
            .listen(Arc::new(|create_processor, _platform_metadata| {
                let _processor = create_processor(RecordingHandlers::new());
            }))
            .await
            .unwrap();

        let (processor, _) = dialer
            .connect(&Metadata::empty(), RecordingHandlers::new())
            .await
            .unwrap();

        processor.close().await.unwrap();
        let err = processor
            .send(WireMessage::IdentityUpdate {
                updates: Metadata::empty(),
            })
            .await
            .unwrap_err();
        assert!(err.is_endpoint());
    }
}
