//! # Event Filtering Tests
//!
//! Engine events reach the client only as proxy ids, and only for
//! entities the client still holds.
//!
//! Run with: cargo test -p tandem --test event_filtering

use std::sync::Arc;

use parking_lot::Mutex;

use tandem::{
    ActorDesc, ActorHandle, ActorId, ContactPair, EntityRef, EventStats, Geometry, HeadlessEvent,
    HeadlessScene, JointApi, JointDesc, JointId, JointState, JointType, MisusePolicy, PairFlags,
    PhysicsScene, ProxyError, SceneConfig, SceneProxy, ShapeDesc, ShapeId, SimulationCallbacks,
    TriggerFlags, Vec3,
};

// ============================================================================
// RECORDER
// ============================================================================

#[derive(Default)]
struct Seen {
    woke: Vec<Vec<ActorId>>,
    contacts: Vec<[ActorId; 2]>,
    breaks: Vec<JointId>,
    triggers: Vec<(ShapeId, ShapeId, TriggerFlags)>,
    filtered_pairs: Vec<(ActorId, ActorId)>,
}

/// Records every callback; answers joint breaks and pair filters with
/// fixed values.
struct Recorder {
    seen: Arc<Mutex<Seen>>,
    release_broken: bool,
    collide: bool,
}

impl Recorder {
    fn install(scene: &mut SceneProxy<HeadlessScene>, release_broken: bool, collide: bool) -> Arc<Mutex<Seen>> {
        let seen = Arc::new(Mutex::new(Seen::default()));
        scene.set_callbacks(Box::new(Self {
            seen: Arc::clone(&seen),
            release_broken,
            collide,
        }));
        seen
    }
}

impl SimulationCallbacks for Recorder {
    fn on_wake(&mut self, actors: &[ActorId]) {
        self.seen.lock().woke.push(actors.to_vec());
    }

    fn on_joint_break(&mut self, _breaking_force: f32, joint: JointId) -> bool {
        self.seen.lock().breaks.push(joint);
        self.release_broken
    }

    fn on_contact(&mut self, pair: &ContactPair<ActorId>, _events: PairFlags) {
        self.seen.lock().contacts.push(pair.actors);
    }

    fn on_trigger(&mut self, trigger: ShapeId, other: ShapeId, status: TriggerFlags) {
        self.seen.lock().triggers.push((trigger, other, status));
    }

    fn filter_actor_pair(&mut self, a: ActorId, b: ActorId) -> bool {
        self.seen.lock().filtered_pairs.push((a, b));
        self.collide
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn scene() -> SceneProxy<HeadlessScene> {
    let config = SceneConfig::default().with_misuse(MisusePolicy::Report);
    SceneProxy::new(HeadlessScene::new(), config).unwrap()
}

/// Two committed actors and their engine handles.
fn two_actors(scene: &mut SceneProxy<HeadlessScene>) -> ([ActorId; 2], [ActorHandle; 2]) {
    let a = scene.create_actor(ActorDesc::default()).unwrap();
    let b = scene.create_actor(ActorDesc::default()).unwrap();
    scene.flush().unwrap();
    let ha = scene.as_unbuffered_actor(EntityRef::Proxy(a)).unwrap();
    let hb = scene.as_unbuffered_actor(EntityRef::Proxy(b)).unwrap();
    ([a, b], [ha, hb])
}

fn step(scene: &mut SceneProxy<HeadlessScene>, events: Vec<HeadlessEvent>) {
    let engine = scene.engine_mut().unwrap();
    for event in events {
        engine.queue_event(event);
    }
    scene.simulate(1.0 / 60.0).unwrap();
    assert!(scene.fetch_results(true).unwrap());
}

// ============================================================================
// FILTERING
// ============================================================================

#[test]
fn wake_batch_drops_released_actors() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let ([a, b], [ha, hb]) = two_actors(&mut scene);
    scene.release_actor(b).unwrap();

    step(&mut scene, vec![HeadlessEvent::Wake(vec![ha, hb])]);

    assert_eq!(seen.lock().woke, vec![vec![a]]);
    assert_eq!(scene.event_stats(), EventStats { delivered: 1, filtered: 1 });
}

#[test]
fn wake_batch_of_only_released_actors_is_skipped() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let ([a, _], [ha, _]) = two_actors(&mut scene);
    scene.release_actor(a).unwrap();

    step(&mut scene, vec![HeadlessEvent::Wake(vec![ha])]);

    assert!(seen.lock().woke.is_empty());
    assert_eq!(scene.event_stats().delivered, 0);
}

#[test]
fn contact_maps_handles_to_ids() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let ([a, b], [ha, hb]) = two_actors(&mut scene);

    let pair = ContactPair {
        actors: [ha, hb],
        normal_force: Vec3::Y,
        friction_force: Vec3::ZERO,
    };
    step(&mut scene, vec![HeadlessEvent::Contact { pair, events: PairFlags::NOTIFY_ON_TOUCH }]);

    assert_eq!(seen.lock().contacts, vec![[a, b]]);
}

#[test]
fn contact_with_released_actor_is_dropped() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let ([_, b], [ha, hb]) = two_actors(&mut scene);
    scene.release_actor(b).unwrap();

    let pair = ContactPair {
        actors: [ha, hb],
        normal_force: Vec3::Y,
        friction_force: Vec3::ZERO,
    };
    step(&mut scene, vec![HeadlessEvent::Contact { pair, events: PairFlags::NOTIFY_ON_TOUCH }]);

    assert!(seen.lock().contacts.is_empty());
    assert_eq!(scene.event_stats().filtered, 1);
}

#[test]
fn event_for_unknown_handle_is_dropped() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let (_, [ha, _]) = two_actors(&mut scene);

    let stranger = ActorHandle::from_raw(9_999);
    step(&mut scene, vec![HeadlessEvent::Wake(vec![ha, stranger])]);

    assert_eq!(seen.lock().woke.len(), 1);
    assert_eq!(seen.lock().woke[0].len(), 1);
    assert_eq!(scene.event_stats().filtered, 1);
}

#[test]
fn trigger_reports_shape_ids() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let sensor = scene
        .create_actor(ActorDesc::default().with_shape(ShapeDesc::new(Geometry::Sphere { radius: 2.0 })))
        .unwrap();
    let visitor = scene
        .create_actor(ActorDesc::default().with_shape(ShapeDesc::new(Geometry::Sphere { radius: 0.5 })))
        .unwrap();
    scene.flush().unwrap();

    let trigger = scene.actor(sensor).shapes().unwrap()[0];
    let other = scene.actor(visitor).shapes().unwrap()[0];
    let trigger_handle = scene.as_unbuffered_shape(EntityRef::Proxy(trigger)).unwrap();
    let other_handle = scene.as_unbuffered_shape(EntityRef::Proxy(other)).unwrap();

    step(
        &mut scene,
        vec![HeadlessEvent::Trigger {
            trigger: trigger_handle,
            other: other_handle,
            status: TriggerFlags::ON_ENTER,
        }],
    );

    assert_eq!(seen.lock().triggers, vec![(trigger, other, TriggerFlags::ON_ENTER)]);
}

// ============================================================================
// JOINT BREAKS
// ============================================================================

fn breakable_joint(scene: &mut SceneProxy<HeadlessScene>) -> (JointId, tandem::JointHandle) {
    let ([a, b], _) = two_actors(scene);
    let desc = JointDesc::new(JointType::Fixed, [Some(a), Some(b)]).breakable(10.0, 10.0);
    let joint = scene.create_joint(desc).unwrap();
    scene.flush().unwrap();
    let handle = scene.as_unbuffered_joint(EntityRef::Proxy(joint)).unwrap();
    (joint, handle)
}

#[test]
fn broken_joint_released_when_callback_asks() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, true, true);
    let (joint, handle) = breakable_joint(&mut scene);

    step(&mut scene, vec![HeadlessEvent::JointBreak { joint: handle, force: 25.0 }]);

    assert_eq!(seen.lock().breaks, vec![joint]);
    assert_eq!(scene.joint_count(), 0);
    assert_eq!(scene.engine().joint_count(), 1);

    scene.commit_deletes().unwrap();
    assert_eq!(scene.engine().joint_count(), 0);
}

#[test]
fn broken_joint_kept_when_callback_declines() {
    let mut scene = scene();
    let _seen = Recorder::install(&mut scene, false, true);
    let (joint, handle) = breakable_joint(&mut scene);

    step(&mut scene, vec![HeadlessEvent::JointBreak { joint: handle, force: 25.0 }]);

    assert_eq!(scene.joint_ids(), vec![joint]);
    assert_eq!(scene.joint(joint).joint_state().unwrap(), JointState::Broken);
}

#[test]
fn broken_joint_kept_when_release_disabled() {
    let config = SceneConfig {
        release_broken_joints: false,
        misuse: MisusePolicy::Report,
        ..SceneConfig::default()
    };
    let mut scene = SceneProxy::new(HeadlessScene::new(), config).unwrap();
    let seen = Recorder::install(&mut scene, true, true);
    let (joint, handle) = breakable_joint(&mut scene);

    step(&mut scene, vec![HeadlessEvent::JointBreak { joint: handle, force: 25.0 }]);

    assert_eq!(seen.lock().breaks.len(), 1);
    assert_eq!(scene.joint_ids(), vec![joint]);
}

// ============================================================================
// PAIR FILTER
// ============================================================================

#[test]
fn rejected_pair_becomes_ignored_in_engine() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, false);
    let ([a, b], [ha, hb]) = two_actors(&mut scene);

    step(&mut scene, vec![HeadlessEvent::PairFilter(ha, hb)]);

    assert_eq!(seen.lock().filtered_pairs, vec![(a, b)]);
    assert_eq!(scene.engine().actor_pair_flags(ha, hb), Ok(PairFlags::IGNORE_PAIR));
}

#[test]
fn pair_filter_with_released_actor_collides() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, false);
    let ([a, _], [ha, hb]) = two_actors(&mut scene);
    scene.release_actor(a).unwrap();

    step(&mut scene, vec![HeadlessEvent::PairFilter(ha, hb)]);

    assert!(seen.lock().filtered_pairs.is_empty());
    assert_eq!(scene.event_stats().filtered, 1);
}

// ============================================================================
// FETCH
// ============================================================================

#[test]
fn events_wait_for_completed_fetch() {
    let mut scene = scene();
    let seen = Recorder::install(&mut scene, false, true);
    let ([a, _], [ha, _]) = two_actors(&mut scene);

    let engine = scene.engine_mut().unwrap();
    engine.set_latency(2);
    engine.queue_event(HeadlessEvent::Wake(vec![ha]));
    scene.simulate(0.1).unwrap();

    assert!(!scene.fetch_results(false).unwrap());
    assert!(!scene.fetch_results(false).unwrap());
    assert!(!scene.is_writable());
    assert!(seen.lock().woke.is_empty());

    assert!(scene.fetch_results(false).unwrap());
    assert!(scene.is_writable());
    assert_eq!(seen.lock().woke, vec![vec![a]]);
}

#[test]
fn fetch_without_step_is_refused() {
    let mut scene = scene();

    assert_eq!(scene.fetch_results(true), Err(ProxyError::NotSimulating));
}
