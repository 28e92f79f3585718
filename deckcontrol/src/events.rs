//! Subscriber fan-out for playback state and events.
//!
//! The orchestrator holds non-owning handles to externally owned
//! subscribers; registration and removal are explicit. Notification walks a
//! snapshot of the registry so subscribers may subscribe or unsubscribe from
//! within a callback without corrupting the iteration. No thread confinement
//! is promised: callbacks run on whichever thread produced the event, and
//! any marshaling requirement belongs to the subscriber.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{info, warn};

use crate::model::{DeckEvent, PlaybackState};

/// Two-method callback contract for playback observers.
pub trait EventSubscriber: Send + Sync {
    /// Called with the reconciled state after every change.
    fn on_state_changed(&self, state: &PlaybackState);

    /// Called with the raw event type and the state at the time of the event.
    fn on_event(&self, event: DeckEvent, state: &PlaybackState);
}

#[derive(Clone, Default)]
pub(crate) struct SubscriberRegistry {
    subscribers: Arc<Mutex<Vec<Arc<dyn EventSubscriber>>>>,
}

impl SubscriberRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if subscribers.iter().any(|s| Arc::ptr_eq(s, &subscriber)) {
            warn!("Subscriber already registered");
            return;
        }
        subscribers.push(subscriber);
        info!(total = subscribers.len(), "Subscriber registered");
    }

    pub(crate) fn unsubscribe(&self, subscriber: &Arc<dyn EventSubscriber>) {
        let mut subscribers = self.subscribers.lock().unwrap();
        let before = subscribers.len();
        subscribers.retain(|s| !Arc::ptr_eq(s, subscriber));
        if subscribers.len() < before {
            info!(total = subscribers.len(), "Subscriber unregistered");
        } else {
            warn!("Attempted to unregister subscriber not found");
        }
    }

    pub(crate) fn notify(&self, event: DeckEvent, state: &PlaybackState) {
        let snapshot: Vec<Arc<dyn EventSubscriber>> =
            self.subscribers.lock().unwrap().clone();
        for subscriber in &snapshot {
            subscriber.on_state_changed(state);
        }
        for subscriber in &snapshot {
            subscriber.on_event(event, state);
        }
    }
}

/// Subscriber forwarding every event into a crossbeam channel.
///
/// Convenient for consumers that prefer pulling from a receiver over
/// implementing callbacks.
pub struct ChannelSubscriber {
    tx: Sender<(DeckEvent, PlaybackState)>,
}

impl ChannelSubscriber {
    pub fn create() -> (Arc<Self>, Receiver<(DeckEvent, PlaybackState)>) {
        let (tx, rx) = unbounded();
        (Arc::new(Self { tx }), rx)
    }
}

impl EventSubscriber for ChannelSubscriber {
    fn on_state_changed(&self, _state: &PlaybackState) {}

    fn on_event(&self, event: DeckEvent, state: &PlaybackState) {
        let _ = self.tx.send((event, state.clone()));
    }
}
