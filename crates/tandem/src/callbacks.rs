//! # Client Callbacks
//!
//! Two outward channels:
//!
//! - [`SimulationCallbacks`]: engine events after they were mapped from
//!   engine handles to proxy ids. Events about entities awaiting deletion
//!   never reach it.
//! - [`CommitFailureSink`]: entities the engine refused to instance. The
//!   entity stays buffered and dirty, so every later commit retries it and
//!   reports again with a higher attempt count.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::error;

use tandem_core::SlotId;

use crate::engine::{ContactPair, PairFlags, TriggerFlags};
use crate::error::EngineError;
use crate::proxy::{ActorId, EntityKind, JointId, ShapeId};

// =============================================================================
// SIMULATION EVENTS
// =============================================================================

/// Receives filtered simulation events during
/// [`fetch_results`](crate::SceneProxy::fetch_results).
///
/// Every method has a no-op default.
pub trait SimulationCallbacks {
    /// Actors woke up.
    fn on_wake(&mut self, _actors: &[ActorId]) {}

    /// Actors fell asleep.
    fn on_sleep(&mut self, _actors: &[ActorId]) {}

    /// A joint broke. Return `true` to have the proxy layer release it.
    fn on_joint_break(&mut self, _breaking_force: f32, _joint: JointId) -> bool {
        false
    }

    /// Contact report for an actor pair.
    fn on_contact(&mut self, _pair: &ContactPair<ActorId>, _events: PairFlags) {}

    /// A shape entered, stayed in or left a trigger shape.
    fn on_trigger(&mut self, _trigger: ShapeId, _other: ShapeId, _status: TriggerFlags) {}

    /// Decides whether an actor pair collides. Defaults to `true`.
    fn filter_actor_pair(&mut self, _a: ActorId, _b: ActorId) -> bool {
        true
    }
}

impl SimulationCallbacks for () {}

/// Event counters maintained by the event filter.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EventStats {
    /// Events handed to [`SimulationCallbacks`].
    pub delivered: u64,
    /// Events dropped because an entity is awaiting deletion or unknown.
    pub filtered: u64,
}

// =============================================================================
// COMMIT FAILURES
// =============================================================================

/// An entity the engine refused to instance.
#[derive(Clone, Debug)]
pub struct CommitFailure {
    /// Kind of the entity.
    pub kind: EntityKind,
    /// Slot of the entity; wrap it in the matching id type to address it.
    pub entity: SlotId,
    /// Engine error returned by the creation call.
    pub error: EngineError,
    /// Number of failed attempts including this one.
    pub attempts: u32,
}

/// Receives instancing failures.
pub trait CommitFailureSink: Send + Sync {
    /// Called once per failed instancing attempt.
    fn on_instance_failed(&self, failure: &CommitFailure);
}

/// Default sink: logs at error level.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogFailureSink;

impl CommitFailureSink for LogFailureSink {
    fn on_instance_failed(&self, failure: &CommitFailure) {
        error!(
            kind = %failure.kind,
            entity = %failure.entity,
            attempts = failure.attempts,
            error = %failure.error,
            "engine refused to instance entity"
        );
    }
}

/// Sink that keeps every failure in memory.
#[derive(Debug, Default)]
pub struct FailureLog {
    failures: Mutex<Vec<CommitFailure>>,
}

impl FailureLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.failures.lock().len()
    }

    /// Returns `true` if nothing has failed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.lock().is_empty()
    }

    /// Copies the recorded failures.
    #[must_use]
    pub fn snapshot(&self) -> Vec<CommitFailure> {
        self.failures.lock().clone()
    }

    /// Takes the recorded failures, leaving the log empty.
    pub fn drain(&self) -> Vec<CommitFailure> {
        std::mem::take(&mut *self.failures.lock())
    }
}

impl CommitFailureSink for FailureLog {
    fn on_instance_failed(&self, failure: &CommitFailure) {
        self.failures.lock().push(failure.clone());
    }
}

/// Sink that forwards failures over a channel.
#[derive(Clone, Debug)]
pub struct ChannelFailureSink {
    sender: Sender<CommitFailure>,
}

impl ChannelFailureSink {
    /// Wraps an existing sender.
    #[must_use]
    pub fn new(sender: Sender<CommitFailure>) -> Self {
        Self { sender }
    }

    /// Creates a sink and the receiving end of its unbounded channel.
    #[must_use]
    pub fn unbounded() -> (Self, Receiver<CommitFailure>) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        (Self { sender }, receiver)
    }
}

impl CommitFailureSink for ChannelFailureSink {
    fn on_instance_failed(&self, failure: &CommitFailure) {
        // A dropped receiver means nobody listens anymore.
        let _ = self.sender.send(failure.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(attempts: u32) -> CommitFailure {
        CommitFailure {
            kind: EntityKind::Joint,
            entity: SlotId::new(3, 0),
            error: EngineError::UnresolvedActor,
            attempts,
        }
    }

    #[test]
    fn test_failure_log_drain() {
        let log = FailureLog::new();
        log.on_instance_failed(&failure(1));
        log.on_instance_failed(&failure(2));

        assert_eq!(log.len(), 2);
        let drained = log.drain();
        assert_eq!(drained[1].attempts, 2);
        assert!(log.is_empty());
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, receiver) = ChannelFailureSink::unbounded();
        sink.on_instance_failed(&failure(1));

        let received = receiver.try_recv().unwrap();
        assert_eq!(received.kind, EntityKind::Joint);
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, receiver) = ChannelFailureSink::unbounded();
        drop(receiver);
        sink.on_instance_failed(&failure(1));
    }
}
