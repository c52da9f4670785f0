//! # Simulation Gate
//!
//! Tracks whether a simulation step is in flight.
//!
//! ## Protocol
//!
//! ```text
//!   writable ──try_begin()──► in flight ──finish()──► writable
//!      ▲                                                 │
//!      └─────────────── frame_count += 1 ◄───────────────┘
//! ```
//!
//! While a step is in flight the engine owns its state and must not be
//! written. The gate is atomic so observers on other threads (a render
//! thread, a profiler) can poll it through an `Arc` without locking.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic writable/in-flight flag with a completed-step counter.
#[derive(Debug, Default)]
pub struct SimulationGate {
    /// Whether a step has started and not yet finished.
    in_flight: AtomicBool,

    /// Number of completed steps.
    frame_count: AtomicU64,
}

impl SimulationGate {
    /// Creates a writable gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
            frame_count: AtomicU64::new(0),
        }
    }

    /// Creates a writable gate behind an `Arc`.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Returns `true` when no step is in flight.
    #[inline]
    #[must_use]
    pub fn is_writable(&self) -> bool {
        !self.in_flight.load(Ordering::Acquire)
    }

    /// Returns `true` while a step is in flight.
    #[inline]
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of steps that have finished.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Closes the gate for a new step.
    ///
    /// Returns `false` (and changes nothing) if a step is already in flight.
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Reopens the gate after a step completed.
    ///
    /// Returns `false` (and changes nothing) if no step was in flight.
    pub fn finish(&self) -> bool {
        let finished = self
            .in_flight
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if finished {
            self.frame_count.fetch_add(1, Ordering::Relaxed);
        }
        finished
    }
}
