//! Joint proxies.
//!
//! A joint names its actors by proxy id. Instancing resolves them to
//! engine handles, so joints commit after actors and a joint whose actor
//! failed to instance fails with it and retries on the next commit.

use tandem_shared::Vec3;

use crate::api::JointApi;
use crate::engine::{ActorHandle, JointDesc, JointFlags, JointHandle, JointState, PhysicsScene};
use crate::error::{EngineError, EngineResult, ProxyError, ProxyResult};
use crate::scene::{CommitPass, KindStore, SceneProxy};

use super::actor::ActorKind;
use super::{ActorId, Committer, EntityKind, JointId, ProxyKind, ProxyState, Record};

pub(crate) struct JointKind;

#[derive(Debug, Default)]
pub(crate) struct JointFields {
    pub breakable: Option<(f32, f32)>,
    pub global_anchor: Option<Vec3>,
    pub global_axis: Option<Vec3>,
    pub flags: Option<JointFlags>,
}

impl ProxyKind for JointKind {
    const KIND: EntityKind = EntityKind::Joint;
    type Desc = JointDesc<ActorId>;
    type Fields = JointFields;
    type Handle = JointHandle;
    type Links = ();
}

/// Resolves jointed actors through the actor store.
pub(crate) struct JointCommitter<'a> {
    pub actors: &'a KindStore<ActorKind>,
}

impl<E: PhysicsScene> Committer<JointKind, E> for JointCommitter<'_> {
    fn instance(&mut self, engine: &mut E, record: &Record<JointKind>) -> EngineResult<JointHandle> {
        let desc = record
            .desc
            .try_map_actors(|id| self.actors.handle_of(id.slot()).ok_or(EngineError::UnresolvedActor))?;
        engine.create_joint(&desc)
    }

    fn flush(
        &mut self,
        engine: &mut E,
        handle: JointHandle,
        record: &mut Record<JointKind>,
        pass: &mut CommitPass<'_>,
    ) -> bool {
        let fields = &mut record.pending;
        let kind = EntityKind::Joint;
        pass.apply(kind, "breakable", fields.breakable.take(), |(force, torque)| {
            engine.set_joint_breakable(handle, force, torque)
        });
        pass.apply(kind, "global_anchor", fields.global_anchor.take(), |v| {
            engine.set_joint_global_anchor(handle, v)
        });
        pass.apply(kind, "global_axis", fields.global_axis.take(), |v| {
            engine.set_joint_global_axis(handle, v)
        });
        pass.apply(kind, "flags", fields.flags.take(), |v| engine.set_joint_flags(handle, v));
        true
    }
}

/// Buffered view of one joint.
pub struct JointProxy<'a, E: PhysicsScene> {
    scene: &'a mut SceneProxy<E>,
    id: JointId,
}

impl<'a, E: PhysicsScene> JointProxy<'a, E> {
    pub(crate) fn new(scene: &'a mut SceneProxy<E>, id: JointId) -> Self {
        Self { scene, id }
    }

    /// Proxy id.
    #[inline]
    #[must_use]
    pub fn id(&self) -> JointId {
        self.id
    }

    /// Lifecycle state.
    ///
    /// # Errors
    ///
    /// [`ProxyError::StaleHandle`] once the joint has been deleted.
    pub fn state(&self) -> ProxyResult<ProxyState> {
        let result = self.scene.joints.record(self.id.slot()).map(|record| record.state);
        self.scene.guard(result)
    }

    fn read<T>(
        &self,
        pending: impl FnOnce(&JointFields) -> Option<T>,
        current: impl FnOnce(&E, JointHandle) -> EngineResult<T>,
        initial: impl FnOnce(&JointDesc<ActorId>) -> T,
    ) -> ProxyResult<T> {
        let result = self.scene.joints.read(&self.scene.engine, self.id.slot(), pending, current, initial);
        self.scene.guard(result)
    }

    fn write(&mut self, apply: impl FnOnce(&mut JointFields)) -> ProxyResult<()> {
        let result = self.scene.joints.write(self.id.slot(), apply);
        self.scene.guard(result)
    }
}

impl<E: PhysicsScene> JointApi for JointProxy<'_, E> {
    type Actor = ActorId;

    fn actors(&self) -> ProxyResult<[Option<ActorId>; 2]> {
        let result = self.scene.joints.record(self.id.slot()).map(|record| record.desc.actors);
        self.scene.guard(result)
    }

    fn joint_state(&self) -> ProxyResult<JointState> {
        self.read(|_| None, |e, h| e.joint_state(h), |_| JointState::Unbound)
    }

    fn breakable(&self) -> ProxyResult<(f32, f32)> {
        self.read(|f| f.breakable, |e, h| e.joint_breakable(h), |d| (d.max_force, d.max_torque))
    }

    fn set_breakable(&mut self, max_force: f32, max_torque: f32) -> ProxyResult<()> {
        self.write(|f| f.breakable = Some((max_force, max_torque)))
    }

    buffered_field!(global_anchor, set_global_anchor, Vec3, global_anchor, joint_global_anchor);
    buffered_field!(global_axis, set_global_axis, Vec3, global_axis, joint_global_axis);
    buffered_field!(flags, set_flags, JointFlags, flags, joint_flags);
}

/// Direct view of an engine joint.
pub struct EngineJoint<'a, E: PhysicsScene> {
    engine: &'a mut E,
    handle: JointHandle,
}

impl<'a, E: PhysicsScene> EngineJoint<'a, E> {
    /// Wraps `handle` of `engine`.
    pub fn new(engine: &'a mut E, handle: JointHandle) -> Self {
        Self { engine, handle }
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> JointHandle {
        self.handle
    }

    fn fail(err: EngineError) -> ProxyError {
        ProxyError::engine(EntityKind::Joint, err)
    }
}

impl<E: PhysicsScene> JointApi for EngineJoint<'_, E> {
    type Actor = ActorHandle;

    fn actors(&self) -> ProxyResult<[Option<ActorHandle>; 2]> {
        self.engine.joint_actors(self.handle).map_err(Self::fail)
    }

    fn joint_state(&self) -> ProxyResult<JointState> {
        self.engine.joint_state(self.handle).map_err(Self::fail)
    }

    fn breakable(&self) -> ProxyResult<(f32, f32)> {
        self.engine.joint_breakable(self.handle).map_err(Self::fail)
    }

    fn set_breakable(&mut self, max_force: f32, max_torque: f32) -> ProxyResult<()> {
        self.engine
            .set_joint_breakable(self.handle, max_force, max_torque)
            .map_err(Self::fail)
    }

    engine_field!(global_anchor, set_global_anchor, Vec3, joint_global_anchor, set_joint_global_anchor);
    engine_field!(global_axis, set_global_axis, Vec3, joint_global_axis, set_joint_global_axis);
    engine_field!(flags, set_flags, JointFlags, joint_flags, set_joint_flags);
}
