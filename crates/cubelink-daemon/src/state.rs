//! Latest known value of every device state.

use cubelink_client::Subscription;
use cubelink_core::{Circuit, DeviceId, StateType, StateUpdate, StateValue};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A cache shared between the follower task and readers.
pub type SharedCache = Arc<RwLock<StateCache>>;

/// Last value seen per `(device, state type)`.
#[derive(Debug, Default)]
pub struct StateCache {
    values: BTreeMap<(DeviceId, StateType), StateValue>,
}

impl StateCache {
    /// Cache holding the state reported by the bootstrap listing.
    pub fn seeded(circuits: &[Circuit]) -> Self {
        let mut cache = Self::default();
        for update in circuits.iter().flat_map(Circuit::initial_updates) {
            cache.apply(update);
        }
        cache
    }

    /// Record an update. Returns whether the stored value changed.
    pub fn apply(&mut self, update: StateUpdate) -> bool {
        let key = (update.device_id, update.state_type);
        if self.values.get(&key) == Some(&update.value) {
            return false;
        }
        self.values.insert(key, update.value);
        true
    }

    /// Last value of one state of one device.
    pub fn get(&self, device_id: &DeviceId, state_type: &StateType) -> Option<&StateValue> {
        self.values.get(&(device_id.clone(), state_type.clone()))
    }

    /// Every known state of one device.
    pub fn device(&self, device_id: &DeviceId) -> impl Iterator<Item = (&StateType, &StateValue)> {
        self.values
            .iter()
            .filter(move |((id, _), _)| id == device_id)
            .map(|((_, st), value)| (st, value))
    }

    /// Every known state, ordered by device.
    pub fn iter(&self) -> impl Iterator<Item = (&DeviceId, &StateType, &StateValue)> {
        self.values.iter().map(|((id, st), value)| (id, st, value))
    }

    /// Number of known states.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing is known yet.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Apply updates from `subscription` until the bus closes.
pub async fn follow(cache: SharedCache, mut subscription: Subscription) {
    while let Some(update) = subscription.recv().await {
        let (device_id, state_type, value) = (
            update.device_id.clone(),
            update.state_type.clone(),
            update.value.to_string(),
        );
        if cache.write().await.apply(update) {
            tracing::info!(%device_id, %state_type, %value, "state changed");
        }
    }
    tracing::debug!("update stream closed");
}
