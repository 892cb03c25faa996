//! Synthesis pipeline, pure Rust, deterministic for a given `ParameterSet`.
//!
//! The same code backs the threaded orchestrator and the inline render
//! used by WASM hosts.

pub mod filter;
pub mod harmonics;
pub mod normalize;
pub mod random;
pub mod renderer;
pub mod shape;
pub mod synth;
