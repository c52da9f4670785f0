//! # Synchronization
//!
//! Step gating between the caller and an asynchronous simulation.

mod gate;

pub use gate::SimulationGate;
