//! Real-time polyphonic FM/wavetable synthesis voice engine.
//!
//! The synthesis core lives in [`synth`]; `audio`, `input`, and
//! `runtime` are the native host glue behind the `native` feature.

#[cfg(feature = "native")]
pub mod audio;
#[cfg(feature = "native")]
pub mod input;
#[cfg(feature = "native")]
pub mod runtime;
pub mod synth;
