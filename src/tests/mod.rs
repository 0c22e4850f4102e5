//! Integration testing module
//!
//! End-to-end conversions of synthesized WAV files:
//! - Output format for both presets
//! - Trailing audio survives the flush
//! - Progress reporting
//! - Error paths and lifecycle

pub mod e2e;
pub mod fixtures;
