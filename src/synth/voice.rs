use std::sync::Arc;

use crate::synth::algorithm::{Algorithm, OPERATOR_COUNT};
use crate::synth::envelope::EnvelopeGenerator;
use crate::synth::interpolator::WavetableInterpolator;
use crate::synth::operator::Operator;
use crate::synth::params::{PatchConfig, SourceMode};
use crate::synth::wavetable::WavetableData;

/// One polyphonic voice: four owned operators, an algorithm reference
/// (by bank index), an amplitude envelope, and an optional wavetable
/// source. Allocated once by the engine and reused across notes.
pub struct Voice {
    operators: [Operator; OPERATOR_COUNT],
    envelope: EnvelopeGenerator,
    interpolator: WavetableInterpolator,
    wavetable: Option<Arc<WavetableData>>,
    wavetable_phase: f32,
    frame_scan: f32,

    algorithm_index: usize,
    source: SourceMode,
    ratios: [f32; OPERATOR_COUNT],
    levels: [f32; OPERATOR_COUNT],
    tuning: f32,

    note: u8,
    velocity: u8,
    active: bool,
    start_time: u64,
    base_frequency: f32,
    sample_rate: f32,
}

impl Voice {
    pub fn new(sample_rate: f32) -> Self {
        let patch = PatchConfig::default();
        Self {
            operators: std::array::from_fn(|_| Operator::new(sample_rate)),
            envelope: EnvelopeGenerator::new(sample_rate),
            interpolator: WavetableInterpolator::new(patch.interpolation, sample_rate),
            wavetable: None,
            wavetable_phase: 0.0,
            frame_scan: 0.0,
            algorithm_index: 0,
            source: patch.source,
            ratios: [1.0; OPERATOR_COUNT],
            levels: [1.0; OPERATOR_COUNT],
            tuning: 440.0,
            note: 0,
            velocity: 0,
            active: false,
            start_time: 0,
            base_frequency: 0.0,
            sample_rate: sample_rate.max(1.0),
        }
    }

    /// Copy the current global patch into this voice. Called by the
    /// engine just before `note_on`, so re-triggered notes pick up the
    /// latest settings without re-parameterizing sounding ones.
    pub fn configure(
        &mut self,
        patch: &PatchConfig,
        algorithm_index: usize,
        wavetable: Option<Arc<WavetableData>>,
        tuning: f32,
    ) {
        self.algorithm_index = algorithm_index;
        self.source = patch.source;
        self.tuning = tuning;
        for (operator, params) in self.operators.iter_mut().zip(patch.operators.iter()) {
            operator.set_modulation_index(params.modulation_index);
            operator.set_feedback_amount(params.feedback);
        }
        for (slot, params) in self.ratios.iter_mut().zip(patch.operators.iter()) {
            *slot = params.ratio;
        }
        for (slot, params) in self.levels.iter_mut().zip(patch.operators.iter()) {
            *slot = params.level;
        }
        self.envelope.set_config(patch.envelope);
        self.interpolator.set_kind(patch.interpolation);
        self.wavetable = wavetable;
    }

    /// Activate the voice for a note. Operator frequencies follow the
    /// configured ratios, amplitudes scale with velocity, and all phase
    /// and feedback history resets for a clean start.
    pub fn note_on(&mut self, note: u8, velocity: u8, start_time: u64) {
        let note = note.min(127);
        let velocity = velocity.min(127);
        self.note = note;
        self.velocity = velocity;
        self.active = true;
        self.start_time = start_time;
        self.base_frequency = self.tuning * 2.0_f32.powf((note as f32 - 69.0) / 12.0);

        let velocity_scale = velocity as f32 / 127.0;
        for i in 0..OPERATOR_COUNT {
            let operator = &mut self.operators[i];
            operator.set_frequency(self.base_frequency * self.ratios[i]);
            operator.set_amplitude(self.levels[i] * velocity_scale);
            operator.reset();
        }
        self.wavetable_phase = 0.0;
        self.envelope.trigger(velocity_scale, note);
    }

    /// Begin the envelope release. The voice keeps sounding (and keeps
    /// its pool slot) until the envelope reports finished.
    pub fn note_off(&mut self) {
        self.envelope.release();
    }

    /// Force a fixed ~10 ms release; stealing and panic-stop only.
    pub fn quick_release(&mut self) {
        self.envelope.quick_release();
    }

    /// Immediately zero the voice and free its slot.
    pub fn silence(&mut self) {
        self.envelope.reset();
        for operator in self.operators.iter_mut() {
            operator.reset();
        }
        self.wavetable_phase = 0.0;
        self.active = false;
    }

    /// Render one sample through the configured source, scaled by the
    /// envelope. Returns 0 when the envelope is idle or finished.
    pub fn process_sample(&mut self, algorithm: &Algorithm) -> f32 {
        if !self.active || !self.envelope.is_active() {
            return 0.0;
        }
        self.envelope.process_sample();
        let level = self.envelope.level();

        let raw = match self.source {
            SourceMode::Fm => algorithm.process_sample(&mut self.operators),
            SourceMode::Wavetable => self.wavetable_sample(),
        };
        raw * level
    }

    fn wavetable_sample(&mut self) -> f32 {
        // A voice without a table degrades to silence, never to a crash.
        let table = match &self.wavetable {
            Some(table) => table,
            None => return 0.0,
        };
        let frame_size = table.frame_size() as f32;
        let frequency = self.operators[0].frequency();

        let position = self.wavetable_phase;
        self.wavetable_phase = (position + frequency * frame_size / self.sample_rate) % frame_size;

        let frame_position = self.frame_scan * (table.frame_count() - 1) as f32;
        let sample =
            self.interpolator
                .interpolate_sample(table, frame_position, position, frequency);
        sample * self.operators[0].amplitude()
    }

    /// Fan-out target for the engine's pitch-bend: fractional detune
    /// applied to every operator, live.
    pub fn set_pitch_modulation(&mut self, pitch_modulation: f32) {
        for operator in self.operators.iter_mut() {
            operator.set_pitch_modulation(pitch_modulation);
        }
    }

    /// Fan-out target for the mod wheel: wavetable frame scan in [0, 1].
    pub fn set_frame_scan(&mut self, frame_scan: f32) {
        self.frame_scan = frame_scan.clamp(0.0, 1.0);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        for operator in self.operators.iter_mut() {
            operator.set_sample_rate(sample_rate);
        }
        self.envelope.set_sample_rate(sample_rate);
        self.interpolator.set_sample_rate(sample_rate);
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn velocity(&self) -> u8 {
        self.velocity
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn algorithm_index(&self) -> usize {
        self.algorithm_index
    }

    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    #[cfg(test)]
    pub fn operator(&self, index: usize) -> &Operator {
        &self.operators[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::algorithm::builtin_bank;
    use crate::synth::envelope::{CurveType, StageConfig};
    use crate::synth::prelude::MIN_STAGE_SECONDS;

    const SAMPLE_RATE: f32 = 44_100.0;

    fn simple_fm_voice() -> (Voice, Algorithm) {
        let bank = builtin_bank();
        let mut voice = Voice::new(SAMPLE_RATE);
        let mut patch = PatchConfig::default();
        patch.envelope.attack = StageConfig::new(CurveType::Snap, MIN_STAGE_SECONDS, 1.0);
        voice.configure(&patch, 0, None, 440.0);
        (voice, bank[0].clone())
    }

    #[test]
    fn note_on_sets_operator_frequencies_from_ratios() {
        let (mut voice, _algorithm) = simple_fm_voice();
        voice.note_on(69, 127, 0);
        assert!((voice.base_frequency() - 440.0).abs() < 1e-3);
        assert!((voice.operator(0).base_frequency() - 440.0).abs() < 1e-3);
        assert!((voice.operator(1).base_frequency() - 880.0).abs() < 1e-2);
    }

    #[test]
    fn velocity_scales_operator_amplitude() {
        let (mut voice, _algorithm) = simple_fm_voice();
        voice.note_on(60, 64, 0);
        let expected = 1.0 * 64.0 / 127.0;
        assert!((voice.operator(0).amplitude() - expected).abs() < 1e-5);
    }

    #[test]
    fn inactive_voice_renders_silence() {
        let (mut voice, algorithm) = simple_fm_voice();
        assert_eq!(voice.process_sample(&algorithm), 0.0);
    }

    #[test]
    fn voice_stays_active_through_release_then_finishes() {
        let (mut voice, algorithm) = simple_fm_voice();
        voice.note_on(60, 100, 0);
        for _ in 0..1_000 {
            voice.process_sample(&algorithm);
        }
        voice.note_off();
        assert!(voice.is_active());
        assert!(voice.is_releasing());
        // Default release is 0.3 s; run well past it.
        for _ in 0..(0.4 * SAMPLE_RATE) as usize {
            voice.process_sample(&algorithm);
        }
        assert!(voice.is_finished());
        assert_eq!(voice.process_sample(&algorithm), 0.0);
    }

    #[test]
    fn quick_release_silences_within_ten_ms() {
        let (mut voice, algorithm) = simple_fm_voice();
        voice.note_on(60, 100, 0);
        for _ in 0..1_000 {
            voice.process_sample(&algorithm);
        }
        voice.quick_release();
        for _ in 0..(0.011 * SAMPLE_RATE) as usize {
            voice.process_sample(&algorithm);
        }
        assert!(voice.is_finished());
    }

    #[test]
    fn retrigger_resets_phase_history() {
        let (mut voice, algorithm) = simple_fm_voice();
        voice.note_on(60, 100, 0);
        let first: Vec<f32> = (0..32).map(|_| voice.process_sample(&algorithm)).collect();
        for _ in 0..500 {
            voice.process_sample(&algorithm);
        }
        voice.note_on(60, 100, 1);
        let second: Vec<f32> = (0..32).map(|_| voice.process_sample(&algorithm)).collect();
        for (a, b) in first.iter().zip(second.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn wavetable_source_without_table_is_silent() {
        let bank = builtin_bank();
        let mut voice = Voice::new(SAMPLE_RATE);
        let mut patch = PatchConfig::default();
        patch.source = SourceMode::Wavetable;
        voice.configure(&patch, 0, None, 440.0);
        voice.note_on(60, 100, 0);
        for _ in 0..64 {
            assert_eq!(voice.process_sample(&bank[0]), 0.0);
        }
    }

    #[test]
    fn wavetable_source_renders_through_interpolator() {
        let bank = builtin_bank();
        let mut voice = Voice::new(SAMPLE_RATE);
        let mut patch = PatchConfig::default();
        patch.source = SourceMode::Wavetable;
        patch.envelope.attack = StageConfig::new(CurveType::Snap, MIN_STAGE_SECONDS, 1.0);
        let table = Arc::new(WavetableData::sine_saw_morph(4, 256));
        voice.configure(&patch, 0, Some(table), 440.0);
        voice.note_on(69, 127, 0);
        let energy: f32 = (0..512)
            .map(|_| voice.process_sample(&bank[0]).abs())
            .sum();
        assert!(energy > 1.0, "wavetable voice should produce signal");
    }
}
