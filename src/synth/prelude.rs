// Shared constants for the synth core.

pub use core::f32::consts::{PI, TAU};

pub use std::sync::OnceLock;

/// Shortest stage/ramp duration we honor, in seconds. Rates below this
/// clamp up to avoid division blow-ups.
pub const MIN_STAGE_SECONDS: f32 = 0.001;

/// Longest stage duration we honor, in seconds.
pub const MAX_STAGE_SECONDS: f32 = 10.0;

/// Frequencies at or below zero clamp to this instead.
pub const MIN_FREQUENCY_HZ: f32 = 1.0e-3;

/// Levels with magnitude below this snap to exactly zero (denormal guard).
pub const DENORMAL_THRESHOLD: f32 = 1.0e-10;
