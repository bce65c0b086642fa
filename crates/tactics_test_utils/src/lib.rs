//! # Tactics Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Fixture configs, units and simulations
//! - A scripted obstacle service with axis-aligned walls
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod obstacles;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
