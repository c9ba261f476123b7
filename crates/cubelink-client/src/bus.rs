//! Publish/subscribe channel for normalized updates.
//!
//! Each inbound frame's updates are published as one [`UpdateEvent`] under a
//! fixed topic. Subscribers pick the updates they care about with a
//! [`StateFilter`].

use cubelink_core::{DeviceId, StateType, StateUpdate, UPDATE_TOPIC};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

/// The updates from one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateEvent {
    pub topic: &'static str,
    pub updates: Vec<StateUpdate>,
}

/// Fan-out of [`UpdateEvent`]s to any number of subscribers.
///
/// Publishing never blocks. A subscriber that falls more than `capacity`
/// events behind loses the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    topic: &'static str,
    tx: broadcast::Sender<Arc<UpdateEvent>>,
}

impl EventBus {
    /// Events buffered per subscriber before the oldest are dropped.
    pub const DEFAULT_CAPACITY: usize = 256;

    /// Bus publishing under `topic`, buffering up to `capacity` events per subscriber.
    pub fn new(topic: &'static str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { topic, tx }
    }

    /// Topic every event is published under.
    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Publish one frame's updates. Empty sequences are not published.
    ///
    /// Returns the number of subscribers the event reached.
    pub fn publish(&self, updates: Vec<StateUpdate>) -> usize {
        if updates.is_empty() {
            return 0;
        }
        let event = Arc::new(UpdateEvent {
            topic: self.topic,
            updates,
        });
        // No subscribers is not an error.
        self.tx.send(event).unwrap_or(0)
    }

    /// Receive updates matching `filter` from now on.
    pub fn subscribe(&self, filter: StateFilter) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            filter,
            pending: VecDeque::new(),
        }
    }

    /// Live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(UPDATE_TOPIC, Self::DEFAULT_CAPACITY)
    }
}

/// Which updates a subscriber receives. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateFilter {
    pub device_id: Option<DeviceId>,
    pub state_type: Option<StateType>,
}

impl StateFilter {
    /// Match every update.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match updates for one device.
    pub fn device(device_id: DeviceId) -> Self {
        Self {
            device_id: Some(device_id),
            state_type: None,
        }
    }

    /// Narrow to one state type.
    pub fn with_state_type(mut self, state_type: StateType) -> Self {
        self.state_type = Some(state_type);
        self
    }

    /// Whether `update` passes this filter.
    pub fn matches(&self, update: &StateUpdate) -> bool {
        self.device_id.as_ref().is_none_or(|id| *id == update.device_id)
            && self
                .state_type
                .as_ref()
                .is_none_or(|st| *st == update.state_type)
    }
}

/// A filtered view of the bus.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<Arc<UpdateEvent>>,
    filter: StateFilter,
    pending: VecDeque<StateUpdate>,
}

impl Subscription {
    /// Next matching update. `None` once every bus handle is dropped.
    pub async fn recv(&mut self) -> Option<StateUpdate> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }
            match self.rx.recv().await {
                Ok(event) => self.queue(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber fell behind, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching update if one is already buffered.
    pub fn try_recv(&mut self) -> Option<StateUpdate> {
        loop {
            if let Some(update) = self.pending.pop_front() {
                return Some(update);
            }
            match self.rx.try_recv() {
                Ok(event) => self.queue(&event),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "subscriber fell behind, events dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    fn queue(&mut self, event: &UpdateEvent) {
        let filter = &self.filter;
        self.pending
            .extend(event.updates.iter().filter(|u| filter.matches(u)).cloned());
    }
}
