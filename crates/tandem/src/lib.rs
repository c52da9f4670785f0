//! # Tandem
//!
//! A double-buffered proxy layer over a single-threaded physics engine.
//!
//! Client code talks to proxies. Proxies record every write and serve
//! reads from the buffer, the engine, or the creation descriptor. Nothing
//! reaches the engine until the scene commits, and the scene only commits
//! between steps.
//!
//! ```text
//!   ┌──────────────┐   buffered writes   ┌──────────────┐  commit_updates  ┌──────────┐
//!   │ client code  │ ──────────────────► │  SceneProxy  │ ───────────────► │  engine  │
//!   │              │ ◄────────────────── │  (records)   │ ◄─────────────── │ (step)   │
//!   └──────────────┘   filtered events   └──────────────┘   fetch_results  └──────────┘
//! ```
//!
//! ## Quick start
//!
//! ```
//! use tandem::{ActorApi, ActorDesc, HeadlessScene, SceneConfig, SceneProxy};
//!
//! let mut scene = SceneProxy::new(HeadlessScene::new(), SceneConfig::default())?;
//! let ball = scene.create_actor(ActorDesc::default().with_mass(2.0))?;
//! scene.actor(ball).set_mass(3.0)?;
//!
//! scene.flush()?;
//! scene.simulate(1.0 / 60.0)?;
//! scene.fetch_results(true)?;
//!
//! assert_eq!(scene.actor(ball).mass()?, 3.0);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod callbacks;
pub mod config;
pub mod engine;
pub mod error;
pub mod proxy;
pub mod scene;

pub use api::{
    ActorApi, ActorRef, ClothApi, ClothRef, EntityRef, FluidApi, FluidRef, JointApi, JointRef,
    MaterialApi, ShapeApi, ShapeRef, SoftBodyApi, SoftBodyRef,
};
pub use callbacks::{
    ChannelFailureSink, CommitFailure, CommitFailureSink, EventStats, FailureLog, LogFailureSink,
    SimulationCallbacks,
};
pub use config::{MisusePolicy, SceneConfig};
pub use engine::{
    ActorDesc, ActorFlags, ActorHandle, BodyFlags, ClothDesc, ClothFlags, ClothHandle,
    ContactPair, EngineEvents, FluidDesc, FluidFlags, FluidHandle, Geometry, HeadlessEvent,
    HeadlessScene, JointDesc, JointFlags, JointHandle, JointState, JointType, MaterialDesc,
    MaterialFlags, MaterialIndex, MeshDesc, PairFlags, PhysicsScene, ShapeDesc, ShapeFlags,
    ShapeHandle, SoftBodyDesc, SoftBodyFlags, SoftBodyHandle, TriggerFlags,
};
pub use error::{ConfigError, EngineError, EngineResult, ProxyError, ProxyResult};
pub use proxy::{
    ActorId, ActorProxy, ClothId, ClothProxy, EngineActor, EngineCloth, EngineFluid, EngineJoint,
    EngineMaterial, EngineShape, EngineSoftBody, EntityKind, FluidId, FluidProxy, JointId,
    JointProxy, MaterialProxy, ProxyState, ShapeId, ShapeProxy, SoftBodyId, SoftBodyProxy,
};
pub use scene::{CommitStats, DeleteStats, KindCounts, PendingCounts, SceneProxy};

pub use tandem_shared::{Quat, Transform, Vec3};
