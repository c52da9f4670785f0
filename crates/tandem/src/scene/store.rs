//! Per-kind record storage with live and dirty tracking.

use std::collections::HashMap;

use tracing::trace;

use tandem_core::{IndexedRegistry, SlotArena, SlotId};

use crate::engine::PhysicsScene;
use crate::error::{EngineResult, ProxyError, ProxyResult};
use crate::proxy::{Committer, DirtyIndex, LiveIndex, ProxyKind, ProxyState, Record};

use super::commit::{CommitPass, KindCounts};

/// How a pair override endpoint stands at commit time.
pub(crate) enum Endpoint<H> {
    /// Instanced; the override can be applied.
    Ready(H),
    /// Still buffered.
    Waiting,
    /// Released or unknown; the override is moot.
    Gone,
}

/// Records of one kind plus the registries that track them.
pub(crate) struct KindStore<K: ProxyKind> {
    records: SlotArena<Record<K>>,
    live: IndexedRegistry<SlotId, LiveIndex>,
    dirty: IndexedRegistry<SlotId, DirtyIndex>,
    dead: Vec<SlotId>,
    by_handle: HashMap<K::Handle, SlotId>,
}

impl<K: ProxyKind> KindStore<K> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: SlotArena::with_capacity(capacity),
            live: IndexedRegistry::with_capacity(capacity),
            dirty: IndexedRegistry::new(),
            dead: Vec::new(),
            by_handle: HashMap::with_capacity(capacity),
        }
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    pub fn record(&self, id: SlotId) -> ProxyResult<&Record<K>> {
        self.records.get(id).ok_or(ProxyError::StaleHandle { kind: K::KIND })
    }

    pub fn record_mut(&mut self, id: SlotId) -> ProxyResult<&mut Record<K>> {
        self.records.get_mut(id).ok_or(ProxyError::StaleHandle { kind: K::KIND })
    }

    /// Like [`record_mut`](Self::record_mut), rejecting released records.
    pub fn writable(&mut self, id: SlotId) -> ProxyResult<&mut Record<K>> {
        let record = self.record_mut(id)?;
        if record.state == ProxyState::AwaitingDelete {
            return Err(ProxyError::AwaitingDelete { kind: K::KIND });
        }
        Ok(record)
    }

    pub fn is_live(&self, id: SlotId) -> bool {
        self.records
            .get(id)
            .is_some_and(|record| record.state != ProxyState::AwaitingDelete)
    }

    pub fn is_dirty(&self, id: SlotId) -> bool {
        self.dirty.contains(&self.records, id)
    }

    pub fn handle_of(&self, id: SlotId) -> Option<K::Handle> {
        self.records.get(id).and_then(|record| record.handle)
    }

    /// Maps an engine handle back to its record.
    pub fn resolve(&self, handle: K::Handle) -> Option<SlotId> {
        self.by_handle.get(&handle).copied()
    }

    /// Like [`resolve`](Self::resolve), ignoring released records.
    pub fn resolve_live(&self, handle: K::Handle) -> Option<SlotId> {
        self.resolve(handle).filter(|&id| self.is_live(id))
    }

    pub fn endpoint(&self, id: SlotId) -> Endpoint<K::Handle> {
        match self.records.get(id) {
            Some(record) => match (record.state, record.handle) {
                (ProxyState::Instanced, Some(handle)) => Endpoint::Ready(handle),
                (ProxyState::Buffered, _) => Endpoint::Waiting,
                _ => Endpoint::Gone,
            },
            None => Endpoint::Gone,
        }
    }

    pub fn live_ids(&self) -> &[SlotId] {
        self.live.as_slice()
    }

    pub fn counts(&self) -> KindCounts {
        KindCounts {
            live: self.live.len(),
            dirty: self.dirty.len(),
            dead: self.dead.len(),
        }
    }

    // =========================================================================
    // BUFFERED ACCESS
    // =========================================================================

    /// Adds a buffered record to the live set. Callers mark it dirty.
    pub fn create(&mut self, desc: K::Desc, links: K::Links) -> ProxyResult<SlotId> {
        let id = self.records.insert(Record::new(desc, links));
        self.live.push_back(&mut self.records, id)?;
        Ok(id)
    }

    /// Adds a record whose engine object already exists.
    pub fn adopt(&mut self, desc: K::Desc, links: K::Links, handle: K::Handle) -> ProxyResult<SlotId> {
        let id = self.create(desc, links)?;
        let record = self.record_mut(id)?;
        record.handle = Some(handle);
        record.state = ProxyState::Instanced;
        self.by_handle.insert(handle, id);
        Ok(id)
    }

    pub fn mark_dirty(&mut self, id: SlotId) -> ProxyResult<()> {
        if !self.dirty.contains(&self.records, id) {
            self.dirty.push_back(&mut self.records, id)?;
        }
        Ok(())
    }

    /// Buffered read: pending override, else engine value, else descriptor.
    pub fn read<E, T>(
        &self,
        engine: &E,
        id: SlotId,
        pending: impl FnOnce(&K::Fields) -> Option<T>,
        current: impl FnOnce(&E, K::Handle) -> EngineResult<T>,
        initial: impl FnOnce(&K::Desc) -> T,
    ) -> ProxyResult<T> {
        let record = self.record(id)?;
        if let Some(value) = pending(&record.pending) {
            return Ok(value);
        }
        match record.live_handle() {
            Some(handle) => current(engine, handle).map_err(|err| ProxyError::engine(K::KIND, err)),
            None => Ok(initial(&record.desc)),
        }
    }

    /// Buffered write: records an override and marks the entity dirty.
    pub fn write(&mut self, id: SlotId, apply: impl FnOnce(&mut K::Fields)) -> ProxyResult<()> {
        apply(&mut self.writable(id)?.pending);
        self.mark_dirty(id)
    }

    /// Moves a record to `AwaitingDelete` and queues it for the delete commit.
    pub fn release(&mut self, id: SlotId) -> ProxyResult<()> {
        let record = self.record_mut(id)?;
        if record.state == ProxyState::AwaitingDelete {
            return Err(ProxyError::AlreadyReleased { kind: K::KIND });
        }
        record.state = ProxyState::AwaitingDelete;
        record.pending = K::Fields::default();

        self.live.remove(&mut self.records, id)?;
        self.dirty.remove_if_tracked(&mut self.records, id);
        self.dead.push(id);
        trace!(kind = %K::KIND, %id, "released");
        Ok(())
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    /// Instances `id` if needed and flushes its overrides.
    ///
    /// Returns `false` if the entity stays dirty for a retry.
    pub fn commit_entry<E, C>(&mut self, engine: &mut E, committer: &mut C, id: SlotId, pass: &mut CommitPass<'_>) -> bool
    where
        E: PhysicsScene,
        C: Committer<K, E>,
    {
        let Some(record) = self.records.get_mut(id) else {
            return true;
        };
        let handle = match (record.state, record.handle) {
            (ProxyState::AwaitingDelete, _) => return true,
            (ProxyState::Instanced, Some(handle)) => handle,
            _ => match committer.instance(engine, record) {
                Ok(handle) => {
                    record.handle = Some(handle);
                    record.state = ProxyState::Instanced;
                    record.attempts = 0;
                    self.by_handle.insert(handle, id);
                    pass.stats.instanced += 1;
                    trace!(kind = %K::KIND, %id, ?handle, "instanced");
                    handle
                }
                Err(err) => {
                    record.attempts += 1;
                    let attempts = record.attempts;
                    pass.report_failure(K::KIND, id, err, attempts);
                    return false;
                }
            },
        };

        if !committer.flush(engine, handle, record, pass) {
            return false;
        }
        pass.stats.flushed += 1;
        self.dirty.remove_if_tracked(&mut self.records, id);
        true
    }

    /// Commits every dirty entity. Failed entities stay dirty.
    pub fn commit_dirty<E, C>(&mut self, engine: &mut E, committer: &mut C, pass: &mut CommitPass<'_>)
    where
        E: PhysicsScene,
        C: Committer<K, E>,
    {
        let snapshot: Vec<SlotId> = self.dirty.iter().collect();
        for id in snapshot {
            self.commit_entry(engine, committer, id, pass);
        }
    }

    /// Frees every released record, handing them over for engine cleanup.
    pub fn drain_dead(&mut self) -> Vec<(SlotId, Record<K>)> {
        let dead = std::mem::take(&mut self.dead);
        let mut freed = Vec::with_capacity(dead.len());
        for id in dead {
            if let Some(record) = self.records.remove(id) {
                if let Some(handle) = record.handle {
                    self.by_handle.remove(&handle);
                }
                freed.push((id, record));
            }
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ActorDesc, ActorHandle, HeadlessScene};
    use crate::proxy::{ActorKind, ActorLinks, EntityKind};

    fn store() -> KindStore<ActorKind> {
        KindStore::with_capacity(4)
    }

    #[test]
    fn test_write_marks_dirty_once() {
        let mut store = store();
        let id = store.create(ActorDesc::default(), ActorLinks::default()).unwrap();

        store.write(id, |f| f.mass = Some(2.0)).unwrap();
        store.write(id, |f| f.mass = Some(3.0)).unwrap();

        assert_eq!(store.counts(), KindCounts { live: 1, dirty: 1, dead: 0 });
        assert!(store.is_dirty(id));
    }

    #[test]
    fn test_read_falls_back_to_descriptor() {
        let mut store = store();
        let engine = HeadlessScene::new();
        let id = store.create(ActorDesc::default().with_mass(7.0), ActorLinks::default()).unwrap();

        let read = |store: &KindStore<ActorKind>| {
            store.read(&engine, id, |f| f.mass, |e, h| e.actor_mass(h), |d| d.mass)
        };
        assert_eq!(read(&store).unwrap(), 7.0);

        store.write(id, |f| f.mass = Some(1.5)).unwrap();
        assert_eq!(read(&store).unwrap(), 1.5);
    }

    #[test]
    fn test_release_leaves_live_and_dirty() {
        let mut store = store();
        let id = store.create(ActorDesc::default(), ActorLinks::default()).unwrap();
        store.mark_dirty(id).unwrap();

        store.release(id).unwrap();

        assert_eq!(store.counts(), KindCounts { live: 0, dirty: 0, dead: 1 });
        assert!(!store.is_live(id));
        assert_eq!(store.release(id), Err(ProxyError::AlreadyReleased { kind: EntityKind::Actor }));
        assert_eq!(
            store.write(id, |f| f.sleeping = Some(true)),
            Err(ProxyError::AwaitingDelete { kind: EntityKind::Actor })
        );

        let freed = store.drain_dead();
        assert_eq!(freed.len(), 1);
        assert!(store.record(id).is_err());
    }

    #[test]
    fn test_adopted_record_resolves() {
        let mut store = store();
        let handle = ActorHandle::from_raw(9);
        let id = store.adopt(ActorDesc::default(), ActorLinks::default(), handle).unwrap();

        assert_eq!(store.resolve(handle), Some(id));
        assert!(matches!(store.endpoint(id), Endpoint::Ready(h) if h == handle));

        store.release(id).unwrap();
        assert_eq!(store.resolve_live(handle), None);
        assert!(matches!(store.endpoint(id), Endpoint::Gone));
    }
}
