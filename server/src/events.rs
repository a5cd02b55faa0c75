//! Typed publish/subscribe event bus
//!
//! Simulation subsystems communicate side effects through one bus instance
//! that the engine passes around explicitly. Publication is synchronous:
//! every live subscriber's callback runs on the publishing (simulation)
//! thread, in registration order, before `publish` returns. Subscribing or
//! publishing from any other thread is out of contract.
//!
//! Subscriptions are tied to a [`ListenerHandle`]. Dropping the handle does
//! not remove the subscription immediately; it marks it dead, and the bus
//! garbage-collects dead subscriptions at the next publish or registration
//! for that event kind. A dead subscription's callback is never invoked,
//! including when the handle dies mid-dispatch from an earlier callback.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use shared::object::{MapName, ObjectId};
use shared::{AttackType, ProjectileType};

/// Events the simulation publishes during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// An object was removed from the world this tick
    ObjectDestroyed { object_id: ObjectId },
    /// Two objects collided; `rhs == NO_OBJECT` means "with world geometry"
    NetworkObjectCollision { lhs: ObjectId, rhs: ObjectId },
    /// An NPC acquired a hostile target
    NpcAggro {
        npc_id: ObjectId,
        target_id: ObjectId,
    },
    /// An NPC committed to a swing
    NpcAttack {
        npc_id: ObjectId,
        attack_type: AttackType,
        projectile_type: ProjectileType,
    },
    /// An object crossed into a connected map
    MapChange { map_name: MapName },
}

/// Discriminator for subscription routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ObjectDestroyed,
    NetworkObjectCollision,
    NpcAggro,
    NpcAttack,
    MapChange,
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::ObjectDestroyed { .. } => EventKind::ObjectDestroyed,
            Event::NetworkObjectCollision { .. } => EventKind::NetworkObjectCollision,
            Event::NpcAggro { .. } => EventKind::NpcAggro,
            Event::NpcAttack { .. } => EventKind::NpcAttack,
            Event::MapChange { .. } => EventKind::MapChange,
        }
    }
}

type ListenerId = u64;
type Callback = Box<dyn FnMut(&Event) + Send>;

struct Subscription {
    listener: ListenerId,
    callback: Callback,
}

/// Keeps one subscription alive; dropping it marks the subscription dead
#[must_use = "dropping the handle unsubscribes"]
pub struct ListenerHandle {
    id: ListenerId,
    dead: Arc<Mutex<HashSet<ListenerId>>>,
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.dead.lock().expect("dead-listener set poisoned").insert(self.id);
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

/// Process-wide event router, passed as an explicit collaborator
#[derive(Default)]
pub struct EventBus {
    subscriptions: HashMap<EventKind, Vec<Subscription>>,
    dead: Arc<Mutex<HashSet<ListenerId>>>,
    next_listener: ListenerId,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for one event kind
    ///
    /// The callback runs for every matching publish until the returned
    /// handle is dropped.
    pub fn subscribe<F>(&mut self, kind: EventKind, callback: F) -> ListenerHandle
    where
        F: FnMut(&Event) + Send + 'static,
    {
        self.prune(kind);

        self.next_listener += 1;
        let id = self.next_listener;
        self.subscriptions.entry(kind).or_default().push(Subscription {
            listener: id,
            callback: Box::new(callback),
        });

        ListenerHandle {
            id,
            dead: Arc::clone(&self.dead),
        }
    }

    /// Delivers an event to every live subscriber of its kind, in
    /// registration order, on the calling thread.
    pub fn publish(&mut self, event: Event) {
        let kind = event.kind();
        self.prune(kind);

        let Some(subs) = self.subscriptions.get_mut(&kind) else {
            return;
        };
        for sub in subs.iter_mut() {
            // A handle may die from an earlier callback in this very
            // dispatch; those must not be invoked.
            let is_dead = {
                let dead = self.dead.lock().expect("dead-listener set poisoned");
                dead.contains(&sub.listener)
            };
            if !is_dead {
                (sub.callback)(&event);
            }
        }
    }

    fn prune(&mut self, kind: EventKind) {
        let mut dead = self.dead.lock().expect("dead-listener set poisoned");
        if dead.is_empty() {
            return;
        }
        if let Some(subs) = self.subscriptions.get_mut(&kind) {
            subs.retain(|sub| {
                if dead.contains(&sub.listener) {
                    dead.remove(&sub.listener);
                    false
                } else {
                    true
                }
            });
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscriptions.get(&kind).map_or(0, Vec::len)
    }
}
