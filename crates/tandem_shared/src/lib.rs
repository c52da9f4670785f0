//! # Tandem Shared
//!
//! Numeric types that flow between client code, the proxy layer and the
//! simulation engine.
//!
//! ## Rule
//!
//! These are pass-through values. The proxy layer buffers and copies them;
//! it never performs physics on them. Keep this crate free of any engine or
//! proxy dependency so backends can share it.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod math;

pub use math::{Quat, Transform, Vec3};
