use crate::synth::prelude::{MIN_FREQUENCY_HZ, TAU};
use crate::synth::sine_table;

/// Highest modulation index a setter will accept.
pub const MAX_MODULATION_INDEX: f32 = 10.0;

/// A phase-accumulating sine generator with a phase-modulation input and
/// an internal single-sample feedback path.
///
/// The operator owns its phase; the voice resets it on note start and
/// drives it once per sample through [`Operator::process_sample`].
#[derive(Clone, Debug)]
pub struct Operator {
    /// Effective frequency in Hz, `base_frequency * (1 + pitch_modulation)`.
    frequency: f32,
    base_frequency: f32,
    phase: f32, // in [0, TAU)
    phase_increment: f32,
    amplitude: f32,
    modulation_index: f32,
    feedback_amount: f32,
    previous_output: f32,
    pitch_modulation: f32,
    sample_rate: f32,
}

impl Operator {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frequency: 440.0,
            base_frequency: 440.0,
            phase: 0.0,
            phase_increment: TAU * 440.0 / sample_rate,
            amplitude: 1.0,
            modulation_index: 1.0,
            feedback_amount: 0.0,
            previous_output: 0.0,
            pitch_modulation: 0.0,
            sample_rate: sample_rate.max(1.0),
        }
    }

    /// Produce one sample and advance the phase. `modulation_input` is
    /// the summed output of the operators modulating this one.
    pub fn process_sample(&mut self, modulation_input: f32) -> f32 {
        let phase_arg = self.phase
            + modulation_input * self.modulation_index
            + self.previous_output * self.feedback_amount;
        let sample = self.amplitude * sine_table::sin(phase_arg);

        self.phase = (self.phase + self.phase_increment).rem_euclid(TAU);
        self.previous_output = sample;
        sample
    }

    /// Reset phase and feedback history for a fresh note.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.previous_output = 0.0;
    }

    fn update_increment(&mut self) {
        self.frequency = self.base_frequency * (1.0 + self.pitch_modulation);
        self.phase_increment = TAU * self.frequency / self.sample_rate;
    }

    pub fn set_frequency(&mut self, frequency: f32) {
        self.base_frequency = frequency.max(MIN_FREQUENCY_HZ);
        self.update_increment();
    }

    /// Fractional detune applied on top of the base frequency, e.g.
    /// `2^(semitones/12) - 1` for a pitch-bend deflection.
    pub fn set_pitch_modulation(&mut self, pitch_modulation: f32) {
        self.pitch_modulation = pitch_modulation.max(-0.99);
        self.update_increment();
    }

    pub fn set_amplitude(&mut self, amplitude: f32) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    pub fn set_modulation_index(&mut self, modulation_index: f32) {
        self.modulation_index = modulation_index.clamp(0.0, MAX_MODULATION_INDEX);
    }

    pub fn set_feedback_amount(&mut self, feedback_amount: f32) {
        self.feedback_amount = feedback_amount.clamp(0.0, 1.0);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
        self.update_increment();
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    pub fn base_frequency(&self) -> f32 {
        self.base_frequency
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn phase_increment(&self) -> f32 {
        self.phase_increment
    }

    pub fn amplitude(&self) -> f32 {
        self.amplitude
    }

    pub fn modulation_index(&self) -> f32 {
        self.modulation_index
    }

    pub fn feedback_amount(&self) -> f32 {
        self.feedback_amount
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::prelude::TAU;

    const SAMPLE_RATE: f32 = 44_100.0;

    #[test]
    fn phase_increment_matches_definition() {
        for &(freq, ratio) in &[(110.0, 1.0), (440.0, 3.5), (261.63, 0.5), (1760.0, 7.01)] {
            let mut op = Operator::new(SAMPLE_RATE);
            op.set_frequency(freq * ratio);
            // Same expression, same order of operations: the increment
            // must reproduce 2*pi*f*r/sr to the last bit.
            let expected = TAU * (freq * ratio) / SAMPLE_RATE;
            assert_eq!(
                op.phase_increment().to_bits(),
                expected.to_bits(),
                "increment for f={} r={}",
                freq,
                ratio
            );
        }
    }

    #[test]
    fn first_sample_is_zero_then_rises() {
        let mut op = Operator::new(SAMPLE_RATE);
        op.set_frequency(441.0);
        let first = op.process_sample(0.0);
        assert_eq!(first, 0.0); // sin(0)
        let second = op.process_sample(0.0);
        assert!(second > 0.0);
    }

    #[test]
    fn quarter_period_reaches_peak() {
        let mut op = Operator::new(SAMPLE_RATE);
        op.set_frequency(100.0);
        let quarter = (SAMPLE_RATE / 100.0 / 4.0).round() as usize;
        let mut last = 0.0;
        for _ in 0..=quarter {
            last = op.process_sample(0.0);
        }
        assert!(last > 0.99, "expected near-peak, got {}", last);
    }

    #[test]
    fn feedback_uses_previous_output() {
        let mut plain = Operator::new(SAMPLE_RATE);
        let mut fed = Operator::new(SAMPLE_RATE);
        plain.set_frequency(440.0);
        fed.set_frequency(440.0);
        fed.set_feedback_amount(0.8);

        // Identical until the feedback term has a nonzero history: the
        // first sample is sin(0) = 0, so the second still sees zero.
        assert_eq!(plain.process_sample(0.0), fed.process_sample(0.0));
        assert_eq!(plain.process_sample(0.0), fed.process_sample(0.0));
        let a = plain.process_sample(0.0);
        let b = fed.process_sample(0.0);
        assert!((a - b).abs() > 1e-6);
    }

    #[test]
    fn setters_clamp_to_documented_ranges() {
        let mut op = Operator::new(SAMPLE_RATE);
        op.set_frequency(-5.0);
        assert!(op.base_frequency() > 0.0);
        op.set_amplitude(2.0);
        assert_eq!(op.amplitude(), 1.0);
        op.set_modulation_index(99.0);
        assert_eq!(op.modulation_index(), MAX_MODULATION_INDEX);
        op.set_feedback_amount(-1.0);
        assert_eq!(op.feedback_amount(), 0.0);
    }

    #[test]
    fn pitch_modulation_scales_increment() {
        let mut op = Operator::new(SAMPLE_RATE);
        op.set_frequency(200.0);
        let base = op.phase_increment();
        op.set_pitch_modulation(2.0_f32.powf(2.0 / 12.0) - 1.0); // +2 semitones
        let bent = op.phase_increment();
        assert!((bent / base - 2.0_f32.powf(2.0 / 12.0)).abs() < 1e-5);
    }
}
