//! Container connection state and change notifications

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};

const EVENT_CAPACITY: usize = 64;

/// Connection state of a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    EstablishingConnection,
    CatchingUp,
    Connected,
}

/// Change notifications raised by a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerEvent {
    Connected,
    Disconnected,
    /// Local changes not yet saved
    Dirty,
    /// All local changes saved
    Saved,
    Disposed,
}

struct ContainerInner {
    id: String,
    state: watch::Sender<ConnectionState>,
    dirty: AtomicBool,
    disposed: AtomicBool,
    events: broadcast::Sender<ContainerEvent>,
}

/// Connection object of an open session.
///
/// Clones share the same underlying container.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("state", &self.connection_state())
            .field("dirty", &self.is_dirty())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Container {
    pub(crate) fn new(id: String) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ContainerInner {
                id,
                state,
                dirty: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                events,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    /// Receiver that always holds the latest connection state
    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Register for change notifications.
    ///
    /// Dropping the returned subscription deregisters it.
    pub fn subscribe(&self) -> EventSubscription {
        EventSubscription {
            receiver: self.inner.events.subscribe(),
        }
    }

    pub(crate) fn set_connection_state(&self, state: ConnectionState) {
        let previous = self.inner.state.send_replace(state);
        if previous == state {
            return;
        }

        tracing::debug!(container_id = %self.inner.id, ?previous, ?state, "Connection state changed");
        match state {
            ConnectionState::Connected => self.emit(ContainerEvent::Connected),
            ConnectionState::Disconnected => self.emit(ContainerEvent::Disconnected),
            _ => {}
        }
    }

    pub(crate) fn mark_dirty(&self) {
        if !self.inner.dirty.swap(true, Ordering::SeqCst) {
            self.emit(ContainerEvent::Dirty);
        }
    }

    pub(crate) fn mark_saved(&self) {
        if self.inner.dirty.swap(false, Ordering::SeqCst) {
            self.emit(ContainerEvent::Saved);
        }
    }

    /// Close the container. Only the first call has an effect.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.set_connection_state(ConnectionState::Disconnected);
        self.emit(ContainerEvent::Disposed);
        tracing::info!(container_id = %self.inner.id, "Container disposed");
    }

    fn emit(&self, event: ContainerEvent) {
        // No subscribers is not an error
        let _ = self.inner.events.send(event);
    }
}

/// Registered listener for container events
pub struct EventSubscription {
    receiver: broadcast::Receiver<ContainerEvent>,
}

impl EventSubscription {
    /// Wait for the next event; `None` once the container is gone.
    ///
    /// Events missed by a slow listener are skipped.
    pub async fn recv(&mut self) -> Option<ContainerEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Container listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered event, without waiting
    pub fn try_recv(&mut self) -> Option<ContainerEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}
