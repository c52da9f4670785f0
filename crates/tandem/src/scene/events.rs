//! Maps engine events to proxy ids.
//!
//! The filter sits between the engine and the client's
//! [`SimulationCallbacks`] while results are fetched. Events naming an
//! entity that is awaiting deletion, or that the proxy layer never saw,
//! are dropped and counted.

use tracing::trace;

use crate::callbacks::{EventStats, SimulationCallbacks};
use crate::engine::{
    ActorHandle, ContactPair, EngineEvents, JointHandle, PairFlags, ShapeHandle, TriggerFlags,
};
use crate::proxy::{ActorId, ActorKind, JointId, JointKind, ShapeId, ShapeKind};

use super::store::KindStore;

pub(crate) struct EventFilter<'a> {
    pub actors: &'a KindStore<ActorKind>,
    pub shapes: &'a KindStore<ShapeKind>,
    pub joints: &'a KindStore<JointKind>,
    pub callbacks: &'a mut (dyn SimulationCallbacks + 'static),
    pub stats: &'a mut EventStats,
    /// Joints whose break callback asked for release.
    pub broken: Vec<JointId>,
}

impl EventFilter<'_> {
    fn actor(&self, handle: ActorHandle) -> Option<ActorId> {
        self.actors.resolve_live(handle).map(ActorId::from_slot)
    }

    fn shape(&self, handle: ShapeHandle) -> Option<ShapeId> {
        self.shapes.resolve_live(handle).map(ShapeId::from_slot)
    }

    fn actor_batch(&mut self, handles: &[ActorHandle]) -> Vec<ActorId> {
        let ids: Vec<ActorId> = handles.iter().filter_map(|&handle| self.actor(handle)).collect();
        self.stats.filtered += (handles.len() - ids.len()) as u64;
        ids
    }

    fn dropped(&mut self, event: &'static str) {
        self.stats.filtered += 1;
        trace!(event, "event for an entity awaiting deletion dropped");
    }
}

impl EngineEvents for EventFilter<'_> {
    fn on_wake(&mut self, actors: &[ActorHandle]) {
        let ids = self.actor_batch(actors);
        if !ids.is_empty() {
            self.stats.delivered += 1;
            self.callbacks.on_wake(&ids);
        }
    }

    fn on_sleep(&mut self, actors: &[ActorHandle]) {
        let ids = self.actor_batch(actors);
        if !ids.is_empty() {
            self.stats.delivered += 1;
            self.callbacks.on_sleep(&ids);
        }
    }

    fn on_joint_break(&mut self, breaking_force: f32, joint: JointHandle) -> bool {
        match self.joints.resolve_live(joint) {
            Some(slot) => {
                let id = JointId::from_slot(slot);
                self.stats.delivered += 1;
                if self.callbacks.on_joint_break(breaking_force, id) {
                    self.broken.push(id);
                }
            }
            None => self.dropped("joint_break"),
        }
        // The proxy layer releases broken joints itself, through the
        // regular deferred path.
        false
    }

    fn on_contact(&mut self, pair: &ContactPair<ActorHandle>, events: PairFlags) {
        match (self.actor(pair.actors[0]), self.actor(pair.actors[1])) {
            (Some(a), Some(b)) => {
                self.stats.delivered += 1;
                let mapped = ContactPair {
                    actors: [a, b],
                    normal_force: pair.normal_force,
                    friction_force: pair.friction_force,
                };
                self.callbacks.on_contact(&mapped, events);
            }
            _ => self.dropped("contact"),
        }
    }

    fn on_trigger(&mut self, trigger: ShapeHandle, other: ShapeHandle, status: TriggerFlags) {
        match (self.shape(trigger), self.shape(other)) {
            (Some(trigger), Some(other)) => {
                self.stats.delivered += 1;
                self.callbacks.on_trigger(trigger, other, status);
            }
            _ => self.dropped("trigger"),
        }
    }

    fn filter_actor_pair(&mut self, a: ActorHandle, b: ActorHandle) -> bool {
        match (self.actor(a), self.actor(b)) {
            (Some(a), Some(b)) => {
                self.stats.delivered += 1;
                self.callbacks.filter_actor_pair(a, b)
            }
            _ => {
                self.dropped("pair_filter");
                true
            }
        }
    }
}
