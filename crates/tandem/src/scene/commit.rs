//! Bookkeeping shared by one commit pass.

use tracing::{error, trace};

use tandem_core::{PairFlagTable, SlotId};

use crate::callbacks::{CommitFailure, CommitFailureSink};
use crate::engine::PairFlags;
use crate::error::{EngineError, EngineResult};
use crate::proxy::{EntityKind, ProxyKind};

use super::store::{Endpoint, KindStore};

/// Outcome of [`commit_updates`](crate::SceneProxy::commit_updates).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Entities that got an engine object during this pass.
    pub instanced: usize,
    /// Entities whose pending overrides were fully applied.
    pub flushed: usize,
    /// Entities the engine refused to instance.
    pub failed: usize,
    /// Buffered field writes the engine rejected. The values are dropped.
    pub rejected: usize,
    /// Pair overrides pushed to the engine.
    pub pairs_applied: usize,
    /// Pair overrides discarded because an endpoint was released.
    pub pairs_dropped: usize,
}

/// Outcome of [`commit_deletes`](crate::SceneProxy::commit_deletes).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteStats {
    /// Engine objects destroyed, including shapes freed with their actor.
    pub destroyed: usize,
    /// Entities that never had an engine object.
    pub discarded: usize,
    /// Material indices returned to the pool.
    pub materials_recycled: usize,
    /// Pair overrides purged with their endpoints.
    pub pairs_purged: usize,
}

/// Live, dirty and dead counts of one entity kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KindCounts {
    /// Entities not released.
    pub live: usize,
    /// Entities with uncommitted state.
    pub dirty: usize,
    /// Released entities waiting for the delete commit.
    pub dead: usize,
}

/// Per-kind [`KindCounts`] of a scene.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingCounts {
    /// Actors.
    pub actors: KindCounts,
    /// Shapes.
    pub shapes: KindCounts,
    /// Joints.
    pub joints: KindCounts,
    /// Materials, including the default one.
    pub materials: KindCounts,
    /// Fluids.
    pub fluids: KindCounts,
    /// Cloths.
    pub cloths: KindCounts,
    /// Soft bodies.
    pub soft_bodies: KindCounts,
}

impl PendingCounts {
    /// Returns `true` if no entity has uncommitted state or a pending delete.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        [
            self.actors,
            self.shapes,
            self.joints,
            self.materials,
            self.fluids,
            self.cloths,
            self.soft_bodies,
        ]
        .iter()
        .all(|counts| counts.dirty == 0 && counts.dead == 0)
    }
}

/// State threaded through one `commit_updates` pass.
pub(crate) struct CommitPass<'a> {
    sink: &'a dyn CommitFailureSink,
    pub stats: CommitStats,
}

impl<'a> CommitPass<'a> {
    pub fn new(sink: &'a dyn CommitFailureSink) -> Self {
        Self { sink, stats: CommitStats::default() }
    }

    pub fn report_failure(&mut self, kind: EntityKind, entity: SlotId, error: EngineError, attempts: u32) {
        self.stats.failed += 1;
        self.sink.on_instance_failed(&CommitFailure { kind, entity, error, attempts });
    }

    /// Pushes one buffered override to the engine, if present.
    pub fn apply<T>(
        &mut self,
        kind: EntityKind,
        field: &'static str,
        value: Option<T>,
        set: impl FnOnce(T) -> EngineResult<()>,
    ) {
        let Some(value) = value else {
            return;
        };
        if let Err(err) = set(value) {
            self.stats.rejected += 1;
            error!(%kind, field, error = %err, "engine rejected buffered write");
        }
    }
}

/// Pushes pending pair overrides whose endpoints are both instanced.
///
/// Pairs with a released endpoint are dropped. Pairs waiting on a
/// buffered endpoint stay pending.
pub(crate) fn flush_pairs<K, E>(
    engine: &mut E,
    store: &KindStore<K>,
    flags: &PairFlagTable<SlotId, PairFlags>,
    pending: &mut PairFlagTable<SlotId, ()>,
    stats: &mut CommitStats,
    mut apply: impl FnMut(&mut E, K::Handle, K::Handle, PairFlags) -> EngineResult<()>,
) where
    K: ProxyKind,
{
    let queued: Vec<(SlotId, SlotId)> = pending.iter().map(|(a, b, ())| (a, b)).collect();
    for (a, b) in queued {
        match (store.endpoint(a), store.endpoint(b)) {
            (Endpoint::Ready(ha), Endpoint::Ready(hb)) => {
                let value = flags.get(a, b).unwrap_or_default();
                if let Err(err) = apply(engine, ha, hb, value) {
                    error!(kind = %K::KIND, error = %err, "engine rejected pair flags");
                }
                pending.remove(a, b);
                stats.pairs_applied += 1;
            }
            (Endpoint::Gone, _) | (_, Endpoint::Gone) => {
                pending.remove(a, b);
                stats.pairs_dropped += 1;
            }
            _ => trace!(kind = %K::KIND, %a, %b, "pair waits for instancing"),
        }
    }
}
