//! stackform: application layer over `stackform-core`
//!
//! Declares the items-service stack, loads synth configuration, and writes
//! the emitted template for the external provisioning platform.

pub mod config;
pub mod stacks;
pub mod synth;

pub use config::SynthConfig;
