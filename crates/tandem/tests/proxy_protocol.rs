//! # Proxy Protocol Tests
//!
//! End-to-end checks of the buffered write / commit cycle against the
//! headless engine:
//!
//! 1. **Buffering**: reads see writes before any commit, the engine sees nothing
//! 2. **Commit**: last write wins, one dirty entry per entity, fixed kind order
//! 3. **Failures**: refused instancing is reported, retried, and isolated
//! 4. **Barrier**: nothing reaches the engine while a step is in flight
//!
//! Run with: cargo test -p tandem --test proxy_protocol

use std::sync::Arc;

use tandem::{
    ActorApi, ActorDesc, ActorFlags, ActorHandle, ChannelFailureSink, ClothApi, ClothDesc,
    EntityKind, EntityRef, EngineError, FailureLog, FluidApi, FluidDesc, Geometry, HeadlessScene,
    JointApi, JointDesc, JointState, JointType, MaterialApi, MaterialDesc, MaterialIndex, MeshDesc,
    MisusePolicy, PairFlags, PhysicsScene, ProxyError, ProxyState, SceneConfig, SceneProxy,
    ShapeApi, ShapeDesc, SoftBodyApi, SoftBodyDesc, Transform, Vec3,
};

fn scene() -> SceneProxy<HeadlessScene> {
    let config = SceneConfig::default().with_misuse(MisusePolicy::Report);
    SceneProxy::new(HeadlessScene::new(), config).unwrap()
}

fn cube() -> ShapeDesc {
    ShapeDesc::new(Geometry::Box {
        half_extents: Vec3::new(0.5, 0.5, 0.5),
    })
}

fn triangle() -> MeshDesc {
    MeshDesc {
        vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
        indices: vec![0, 1, 2],
    }
}

fn tetrahedron() -> MeshDesc {
    MeshDesc {
        vertices: vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z],
        indices: vec![0, 1, 2, 3],
    }
}

// ============================================================================
// BUFFERING
// ============================================================================

#[test]
fn buffered_read_sees_write_before_commit() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default()).unwrap();
    let pose = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));

    scene.actor(ball).set_global_pose(pose).unwrap();

    assert_eq!(scene.actor(ball).global_pose().unwrap(), pose);
    assert_eq!(scene.actor(ball).state().unwrap(), ProxyState::Buffered);
    assert_eq!(scene.engine().actor_count(), 0);
    assert_eq!(scene.engine().call_count("set_actor_global_pose"), 0);
}

#[test]
fn unmodified_entity_reads_back_its_descriptor() {
    let mut scene = scene();
    let pose = Transform::from_position(Vec3::new(0.0, 4.0, 0.0));
    let desc = ActorDesc::dynamic(pose).with_mass(2.0);
    let ball = scene.create_actor(desc.clone()).unwrap();

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.instanced, 1);
    assert_eq!(stats.failed, 0);

    let actor = scene.actor(ball);
    assert_eq!(actor.state().unwrap(), ProxyState::Instanced);
    assert!(actor.is_dynamic().unwrap());
    assert_eq!(actor.global_pose().unwrap(), desc.global_pose);
    assert_eq!(actor.linear_velocity().unwrap(), desc.linear_velocity);
    assert_eq!(actor.angular_velocity().unwrap(), desc.angular_velocity);
    assert_eq!(actor.mass().unwrap(), desc.mass);
    assert_eq!(actor.linear_damping().unwrap(), desc.linear_damping);
    assert_eq!(actor.angular_damping().unwrap(), desc.angular_damping);
    assert_eq!(actor.group().unwrap(), desc.group);
    assert_eq!(actor.dominance_group().unwrap(), desc.dominance_group);
    assert_eq!(actor.flags().unwrap(), desc.flags);
    assert_eq!(actor.body_flags().unwrap(), desc.body_flags);
    assert_eq!(actor.is_sleeping().unwrap(), desc.sleeping);
}

// ============================================================================
// COMMIT
// ============================================================================

#[test]
fn last_write_wins_with_one_dirty_entry() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default()).unwrap();

    scene.actor(ball).set_mass(5.0).unwrap();
    scene.actor(ball).set_mass(7.0).unwrap();
    assert_eq!(scene.pending().actors.dirty, 1);

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.flushed, 1);
    assert_eq!(scene.pending().actors.dirty, 0);

    let handle = scene.as_unbuffered_actor(EntityRef::Proxy(ball)).unwrap();
    assert_eq!(scene.engine().actor_mass(handle), Ok(7.0));
    assert_eq!(scene.engine().call_count("set_actor_mass"), 1);
}

#[test]
fn writes_to_instanced_actor_apply_once_per_commit() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default()).unwrap();
    scene.commit_updates().unwrap();

    scene.actor(ball).set_group(3).unwrap();
    scene.actor(ball).set_flags(ActorFlags::DISABLE_RESPONSE).unwrap();
    scene.actor(ball).set_group(4).unwrap();
    scene.commit_updates().unwrap();

    let handle = scene.as_unbuffered_actor(EntityRef::Proxy(ball)).unwrap();
    assert_eq!(scene.engine().actor_group(handle), Ok(4));
    assert_eq!(scene.engine().actor_flags(handle), Ok(ActorFlags::DISABLE_RESPONSE));
    assert_eq!(scene.engine().call_count("set_actor_group"), 1);

    // Nothing pending: a second commit is a no-op.
    let idle = scene.commit_updates().unwrap();
    assert_eq!(idle.flushed, 0);
    assert_eq!(scene.engine().call_count("set_actor_group"), 1);
}

#[test]
fn forces_accumulate_until_commit() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default().with_mass(1.0)).unwrap();

    scene.actor(ball).add_force(Vec3::X).unwrap();
    scene.actor(ball).add_force(Vec3::X).unwrap();
    scene.commit_updates().unwrap();

    assert_eq!(scene.engine().call_count("add_actor_force"), 1);
}

#[test]
fn shapes_attach_before_actor_fields() {
    let mut scene = scene();
    let body = scene
        .create_actor(ActorDesc::default().with_shape(cube().with_density(2.0)))
        .unwrap();
    scene.actor(body).set_mass(4.0).unwrap();

    let shapes = scene.actor(body).shapes().unwrap();
    assert_eq!(shapes.len(), 1);
    assert_eq!(scene.shape(shapes[0]).state().unwrap(), ProxyState::Buffered);

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.instanced, 2);

    // The shape adds density mass on attach; the explicit mass lands after it.
    assert_eq!(scene.actor(body).mass().unwrap(), 4.0);
    assert_eq!(scene.shape(shapes[0]).actor().unwrap(), body);
    assert_eq!(scene.shape(shapes[0]).state().unwrap(), ProxyState::Instanced);
    assert_eq!(scene.engine().shape_count(), 1);
}

#[test]
fn shape_write_rides_on_owner_commit() {
    let mut scene = scene();
    let body = scene.create_actor(ActorDesc::default()).unwrap();
    scene.commit_updates().unwrap();

    let shape = scene.actor(body).add_shape(cube()).unwrap();
    scene.shape(shape).set_skin_width(0.05).unwrap();
    assert_eq!(scene.pending().actors.dirty, 1);
    assert_eq!(scene.pending().shapes.dirty, 0);
    assert_eq!(scene.shape(shape).skin_width().unwrap(), 0.05);

    scene.commit_updates().unwrap();

    let handle = scene.as_unbuffered_shape(EntityRef::Proxy(shape)).unwrap();
    assert_eq!(scene.engine().shape_skin_width(handle), Ok(0.05));
    let owner = scene.as_unbuffered_actor(EntityRef::Proxy(body)).unwrap();
    assert_eq!(scene.engine().actor_shapes(owner), vec![handle]);
}

#[test]
fn materials_commit_before_the_shapes_using_them() {
    let mut scene = scene();
    let ice = MaterialDesc {
        dynamic_friction: 0.05,
        static_friction: 0.1,
        ..MaterialDesc::default()
    };
    let index = scene.create_material(ice).unwrap();
    assert_eq!(index, MaterialIndex(1));

    let body = scene
        .create_actor(ActorDesc::default().with_shape(cube().with_material(index)))
        .unwrap();
    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.failed, 0);

    let shape = scene.actor(body).shapes().unwrap()[0];
    assert_eq!(scene.shape(shape).material().unwrap(), index);
    assert_eq!(scene.material(index).static_friction().unwrap(), 0.1);
    assert_eq!(scene.material(index).index(), index);
    assert_eq!(scene.material_count(), 2);
}

#[test]
fn rejected_field_write_is_counted_and_dropped() {
    let mut scene = scene();
    let index = scene.create_material(MaterialDesc::default()).unwrap();
    scene.commit_updates().unwrap();

    scene.material(index).set_restitution(2.0).unwrap();
    assert_eq!(scene.material(index).restitution().unwrap(), 2.0);

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.rejected, 1);
    assert_eq!(scene.material(index).restitution().unwrap(), 0.0);
}

#[test]
fn joint_binds_its_actors_after_commit() {
    let mut scene = scene();
    let a = scene.create_actor(ActorDesc::default()).unwrap();
    let b = scene.create_actor(ActorDesc::default()).unwrap();
    let hinge = scene
        .create_joint(JointDesc::new(JointType::Revolute, [Some(a), Some(b)]).breakable(50.0, 60.0))
        .unwrap();

    assert_eq!(scene.joint(hinge).joint_state().unwrap(), JointState::Unbound);
    assert_eq!(scene.joint(hinge).breakable().unwrap(), (50.0, 60.0));

    scene.joint(hinge).set_global_anchor(Vec3::Y).unwrap();
    scene.commit_updates().unwrap();

    assert_eq!(scene.joint(hinge).joint_state().unwrap(), JointState::Simulating);
    assert_eq!(scene.joint(hinge).actors().unwrap(), [Some(a), Some(b)]);
    let handle = scene.as_unbuffered_joint(EntityRef::Proxy(hinge)).unwrap();
    assert_eq!(scene.engine().joint_global_anchor(handle), Ok(Vec3::Y));
}

#[test]
fn joint_to_same_actor_is_rejected() {
    let mut scene = scene();
    let a = scene.create_actor(ActorDesc::default()).unwrap();

    let result = scene.create_joint(JointDesc::new(JointType::Fixed, [Some(a), Some(a)]));
    assert_eq!(result, Err(ProxyError::SelfPair));
    assert_eq!(scene.joint_count(), 0);
}

#[test]
fn fluid_particles_queue_until_commit() {
    let mut scene = scene();
    let water = scene
        .create_fluid(FluidDesc {
            max_particles: 4,
            particles: vec![Vec3::ZERO],
            ..FluidDesc::default()
        })
        .unwrap();

    scene.fluid(water).add_particles(&[Vec3::X, Vec3::Y]).unwrap();
    assert_eq!(scene.fluid(water).particle_count().unwrap(), 3);

    scene.commit_updates().unwrap();
    let handle = scene.as_unbuffered_fluid(EntityRef::Proxy(water)).unwrap();
    assert_eq!(scene.engine().fluid_particle_count(handle), Ok(3));

    // Capacity caps both the buffered estimate and the engine.
    scene.fluid(water).add_particles(&[Vec3::Z; 5]).unwrap();
    assert_eq!(scene.fluid(water).particle_count().unwrap(), 4);
    scene.commit_updates().unwrap();
    assert_eq!(scene.engine().fluid_particle_count(handle), Ok(4));
}

#[test]
fn deformables_buffer_like_rigid_bodies() {
    let mut scene = scene();
    let sheet = scene.create_cloth(ClothDesc::new(triangle())).unwrap();
    let jelly = scene.create_soft_body(SoftBodyDesc::new(tetrahedron())).unwrap();

    scene.cloth(sheet).set_damping(0.25).unwrap();
    scene.soft_body(jelly).set_volume_stiffness(0.75).unwrap();
    assert_eq!(scene.cloth(sheet).thickness().unwrap(), 0.01);

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.instanced, 2);

    let cloth = scene.as_unbuffered_cloth(EntityRef::Proxy(sheet)).unwrap();
    let body = scene.as_unbuffered_soft_body(EntityRef::Proxy(jelly)).unwrap();
    assert_eq!(scene.engine().cloth_damping(cloth), Ok(0.25));
    assert_eq!(scene.engine().soft_body_volume_stiffness(body), Ok(0.75));
    assert_eq!(scene.cloth_count(), 1);
    assert_eq!(scene.soft_body_count(), 1);
}

// ============================================================================
// PAIR FLAGS
// ============================================================================

#[test]
fn pair_flags_are_symmetric_and_deferred() {
    let mut scene = scene();
    let a = scene.create_actor(ActorDesc::default()).unwrap();
    let b = scene.create_actor(ActorDesc::default()).unwrap();

    scene.set_actor_pair_flags(a, b, PairFlags::NOTIFY_ON_TOUCH).unwrap();
    assert_eq!(scene.actor_pair_flags(b, a), Some(PairFlags::NOTIFY_ON_TOUCH));

    scene.set_actor_pair_flags(b, a, PairFlags::IGNORE_PAIR).unwrap();
    assert_eq!(scene.actor_pair_flags(a, b), Some(PairFlags::IGNORE_PAIR));
    assert_eq!(scene.engine().call_count("set_actor_pair_flags"), 0);

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.pairs_applied, 1);

    let ha = scene.as_unbuffered_actor(EntityRef::Proxy(a)).unwrap();
    let hb = scene.as_unbuffered_actor(EntityRef::Proxy(b)).unwrap();
    assert_eq!(scene.engine().actor_pair_flags(ha, hb), Ok(PairFlags::IGNORE_PAIR));
}

#[test]
fn pair_waits_for_both_ends_to_instance() {
    let mut scene = scene().with_failure_sink(Arc::new(FailureLog::new()));
    let good = scene.create_actor(ActorDesc::default()).unwrap();
    let bad = scene.create_actor(ActorDesc::default().with_mass(-1.0)).unwrap();

    scene.set_actor_pair_flags(good, bad, PairFlags::IGNORE_PAIR).unwrap();
    let stats = scene.commit_updates().unwrap();

    assert_eq!(stats.pairs_applied, 0);
    assert_eq!(stats.pairs_dropped, 0);
    assert_eq!(scene.engine().call_count("set_actor_pair_flags"), 0);
}

#[test]
fn self_pairs_are_rejected() {
    let mut scene = scene();
    let a = scene.create_actor(ActorDesc::default().with_shape(cube())).unwrap();
    let shape = scene.actor(a).shapes().unwrap()[0];

    assert_eq!(
        scene.set_actor_pair_flags(a, a, PairFlags::IGNORE_PAIR),
        Err(ProxyError::SelfPair)
    );
    assert_eq!(
        scene.set_shape_pair_flags(shape, shape, PairFlags::IGNORE_PAIR),
        Err(ProxyError::SelfPair)
    );
    assert_eq!(scene.actor_pair_flags(a, a), None);
}

// ============================================================================
// FAILURES
// ============================================================================

#[test]
fn failed_instance_is_reported_and_retried() {
    let log = Arc::new(FailureLog::new());
    let mut scene = scene().with_failure_sink(log.clone());
    let broken = scene.create_actor(ActorDesc::default().with_mass(-1.0)).unwrap();
    let fine = scene.create_actor(ActorDesc::default()).unwrap();

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.instanced, 1);
    assert_eq!(scene.actor(fine).state().unwrap(), ProxyState::Instanced);
    assert_eq!(scene.actor(broken).state().unwrap(), ProxyState::Buffered);
    assert_eq!(scene.pending().actors.dirty, 1);

    scene.commit_updates().unwrap();

    let failures = log.snapshot();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].kind, EntityKind::Actor);
    assert_eq!(failures[0].entity, broken.slot());
    assert!(matches!(failures[0].error, EngineError::InvalidDescriptor(_)));
    assert_eq!(failures[0].attempts, 1);
    assert_eq!(failures[1].attempts, 2);
}

#[test]
fn joint_on_refused_actor_fails_with_it() {
    let (sink, failures) = ChannelFailureSink::unbounded();
    let mut scene = scene().with_failure_sink(Arc::new(sink));
    let broken = scene.create_actor(ActorDesc::default().with_mass(-1.0)).unwrap();
    let joint = scene
        .create_joint(JointDesc::new(JointType::Fixed, [Some(broken), None]))
        .unwrap();

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.failed, 2);

    let reported: Vec<_> = failures.try_iter().collect();
    assert_eq!(reported.len(), 2);
    assert_eq!(reported[1].kind, EntityKind::Joint);
    assert_eq!(reported[1].error, EngineError::UnresolvedActor);
    assert_eq!(scene.joint(joint).state().unwrap(), ProxyState::Buffered);
    // Unbuffering commits the actor first, which is refused again.
    assert_eq!(
        scene.as_unbuffered_joint(EntityRef::Proxy(joint)),
        Err(ProxyError::NotInstanced { kind: EntityKind::Actor })
    );
}

#[test]
fn refused_shape_does_not_hold_back_actor_fields() {
    let log = Arc::new(FailureLog::new());
    let mut scene = scene().with_failure_sink(log.clone());
    let body = scene.create_actor(ActorDesc::default().with_mass(1.0)).unwrap();
    scene.flush().unwrap();
    let handle = scene.as_unbuffered_actor(EntityRef::Proxy(body)).unwrap();

    let plane = scene
        .create_shape(
            body,
            ShapeDesc::new(Geometry::Plane {
                normal: Vec3::Y,
                distance: 0.0,
            }),
        )
        .unwrap();
    scene.actor(body).set_mass(7.0).unwrap();

    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(scene.engine().actor_mass(handle).unwrap(), 7.0);
    assert_eq!(scene.engine().call_count("set_actor_mass"), 1);
    assert_eq!(scene.shape(plane).state().unwrap(), ProxyState::Buffered);
    assert_eq!(scene.pending().actors.dirty, 1);

    // The shape is retried, the mass is not written again.
    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(scene.engine().call_count("set_actor_mass"), 1);
    assert_eq!(scene.pending().actors.dirty, 1);

    let failures = log.snapshot();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].kind, EntityKind::Shape);
    assert_eq!(failures[0].entity, plane.slot());
    assert_eq!(failures[1].attempts, 2);
}

// ============================================================================
// CONVERSIONS
// ============================================================================

#[test]
fn unbuffering_commits_on_demand() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default()).unwrap();
    scene.actor(ball).set_mass(3.0).unwrap();

    let handle = scene.as_unbuffered_actor(EntityRef::Proxy(ball)).unwrap();

    assert_eq!(scene.engine().actor_count(), 1);
    assert_eq!(scene.engine().actor_mass(handle), Ok(3.0));
    assert_eq!(scene.pending().actors.dirty, 0);
    assert_eq!(scene.as_buffered_actor(EntityRef::Real(handle)), Ok(ball));
    assert_eq!(scene.as_buffered_actor(EntityRef::Proxy(ball)), Ok(ball));
}

#[test]
fn unknown_handle_does_not_resolve() {
    let scene = scene();
    let stranger = ActorHandle::from_raw(999);

    assert_eq!(
        scene.as_buffered_actor(EntityRef::Real(stranger)),
        Err(ProxyError::StaleHandle { kind: EntityKind::Actor })
    );
}

// ============================================================================
// BARRIER
// ============================================================================

#[test]
fn commit_during_step_is_refused() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default()).unwrap();
    scene.flush().unwrap();
    scene.simulate(0.1).unwrap();

    assert!(!scene.is_writable());
    assert_eq!(scene.commit_updates(), Err(ProxyError::NotWritable));
    assert_eq!(scene.commit_deletes(), Err(ProxyError::NotWritable));
    assert_eq!(scene.simulate(0.1), Err(ProxyError::NotWritable));
    assert!(scene.engine_mut().is_err());

    // Buffered writes keep working and stay off the engine.
    scene.actor(ball).set_mass(9.0).unwrap();
    assert_eq!(scene.actor(ball).mass().unwrap(), 9.0);
    assert_eq!(scene.engine().call_count("set_actor_mass"), 0);

    assert!(scene.fetch_results(true).unwrap());
    let stats = scene.commit_updates().unwrap();
    assert_eq!(stats.flushed, 1);
    assert_eq!(scene.engine().call_count("set_actor_mass"), 1);
}

#[test]
#[should_panic(expected = "proxy misuse")]
fn commit_during_step_panics_under_panic_policy() {
    let config = SceneConfig::default().with_misuse(MisusePolicy::Panic);
    let mut scene = SceneProxy::new(HeadlessScene::new(), config).unwrap();
    scene.simulate(0.1).unwrap();

    let _ = scene.commit_updates();
}

#[test]
fn step_moves_dynamic_actor() {
    let mut scene = scene();
    let ball = scene.create_actor(ActorDesc::default()).unwrap();
    scene.actor(ball).set_linear_velocity(Vec3::X).unwrap();
    scene.flush().unwrap();

    scene.simulate(0.5).unwrap();
    assert!(scene.fetch_results(true).unwrap());

    let pose = scene.actor(ball).global_pose().unwrap();
    assert!((pose.position.x - 0.5).abs() < 1e-6);
    assert_eq!(scene.gate().frame_count(), 1);
}

#[test]
fn scene_config_loads_from_toml() {
    let config = SceneConfig::from_toml_str("max_materials = 3\nmisuse = \"report\"").unwrap();
    let mut scene = SceneProxy::new(HeadlessScene::new(), config).unwrap();

    assert_eq!(scene.create_material(MaterialDesc::default()), Ok(MaterialIndex(1)));
    assert_eq!(scene.create_material(MaterialDesc::default()), Ok(MaterialIndex(2)));
    assert_eq!(
        scene.create_material(MaterialDesc::default()),
        Err(ProxyError::MaterialIndicesExhausted { capacity: 3 })
    );
}
