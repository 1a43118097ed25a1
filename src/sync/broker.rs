//! Synchronization broker
//!
//! Every change intent passes through here: it is merged into the store, and
//! the resulting authoritative record is fanned out to every other subscribed
//! surface. Surfaces never exchange state with each other directly.

use std::collections::BTreeMap;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info};

use crate::config::{SettingsPatch, SettingsRecord, SettingsStore};
use crate::surface::{SurfaceEvent, SurfaceId, SurfaceKind};
use crate::sync::intent::{ChangeIntent, SaveResult};

struct Subscriber {
    kind: SurfaceKind,
    events: UnboundedSender<SurfaceEvent>,
}

/// What happened when an intent was applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentOutcome {
    /// The authoritative record changed (and was broadcast)
    pub changed: bool,
    /// Number of surfaces the broadcast reached
    pub delivered: usize,
    /// Present for intents persisted immediately
    pub save: Option<SaveResult>,
}

pub struct Broker {
    store: SettingsStore,
    subscribers: BTreeMap<SurfaceId, Subscriber>,
    next_id: u32,
}

impl Broker {
    pub fn new(store: SettingsStore) -> Self {
        Self {
            store,
            subscribers: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn settings(&self) -> &SettingsRecord {
        self.store.current()
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    /// Register a surface. Returns its id and the record it should render first.
    pub fn subscribe(
        &mut self,
        kind: SurfaceKind,
        events: UnboundedSender<SurfaceEvent>,
    ) -> (SurfaceId, SettingsRecord) {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.subscribers.insert(id, Subscriber { kind, events });
        info!(surface = %id, kind = ?kind, "Surface subscribed");
        (id, self.store.current().clone())
    }

    pub fn unsubscribe(&mut self, id: SurfaceId) -> bool {
        match self.subscribers.remove(&id) {
            Some(subscriber) => {
                info!(surface = %id, kind = ?subscriber.kind, "Surface unsubscribed");
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn kind_of(&self, id: SurfaceId) -> Option<SurfaceKind> {
        self.subscribers.get(&id).map(|s| s.kind)
    }

    /// Merge an intent into the store, broadcast, and persist per intent type
    pub fn apply(&mut self, origin: Option<SurfaceId>, intent: ChangeIntent, now: Instant) -> IntentOutcome {
        let discrete = intent.is_discrete();
        let patch = match intent {
            ChangeIntent::Continuous(patch) | ChangeIntent::Commit(patch) => patch,
            ChangeIntent::ToggleRing => SettingsPatch {
                is_on: Some(!self.store.current().is_on),
                ..Default::default()
            },
        };

        let changed = self.store.merge(&patch);
        let delivered = if changed { self.broadcast(origin) } else { 0 };

        let save = if discrete {
            let result = self.store.persist();
            if let Err(e) = &result {
                error!(error = ?e, "Failed to save settings");
            }
            Some(SaveResult::from(&result))
        } else {
            if changed {
                self.store.schedule_persist(now);
            }
            None
        };

        IntentOutcome {
            changed,
            delivered,
            save,
        }
    }

    /// Send the current authoritative record to every subscriber except `origin`.
    /// Subscribers whose channel is gone are dropped silently.
    pub fn broadcast(&mut self, origin: Option<SurfaceId>) -> usize {
        let record = self.store.current().clone();
        let mut delivered = 0;
        let mut gone = Vec::new();

        for (id, subscriber) in &self.subscribers {
            if Some(*id) == origin {
                continue;
            }
            if subscriber.events.send(SurfaceEvent::Settings(record.clone())).is_ok() {
                delivered += 1;
            } else {
                gone.push((*id, subscriber.kind));
            }
        }

        for (id, kind) in gone {
            debug!(surface = %id, kind = ?kind, "Dropping broadcast to closed surface");
            self.subscribers.remove(&id);
        }
        delivered
    }

    /// Deliver a non-settings event to one surface. False if it is gone.
    pub fn notify(&mut self, target: SurfaceId, event: SurfaceEvent) -> bool {
        let Some(subscriber) = self.subscribers.get(&target) else {
            debug!(surface = %target, event = ?event, "Dropping event for unknown surface");
            return false;
        };
        if subscriber.events.send(event).is_err() {
            debug!(surface = %target, "Dropping event for closed surface");
            self.subscribers.remove(&target);
            return false;
        }
        true
    }

    /// Write the record if the debounce window elapsed
    pub fn persist_if_due(&mut self, now: Instant) {
        if let Some(Err(e)) = self.store.persist_if_due(now) {
            error!(error = ?e, "Debounced settings save failed");
        }
    }

    /// Write any pending debounced change now
    pub fn flush(&mut self) {
        if let Some(Err(e)) = self.store.flush() {
            error!(error = ?e, "Failed to flush pending settings");
        }
    }
}
