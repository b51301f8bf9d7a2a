/// Engine-wide construction parameters. Polyphony and block size are
/// fixed once the engine is built; the sample rate can be re-announced
/// by the audio backend before the stream starts.
#[derive(Clone, Debug)]
pub struct SynthConfig {
    pub sample_rate: f32,
    pub max_polyphony: usize,
    /// Largest block `process_buffer` renders in one pass. Bigger
    /// requests are chunked into several passes of at most this size.
    pub max_block_size: usize,
    /// Semitone span of a full pitch-bend deflection.
    pub pitch_bend_range: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            max_polyphony: 16,
            max_block_size: 512,
            pitch_bend_range: 2.0,
        }
    }
}
