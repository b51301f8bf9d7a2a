use std::sync::Arc;

use crate::synth::algorithm::{builtin_bank, Algorithm, OPERATOR_COUNT};
use crate::synth::config::SynthConfig;
use crate::synth::envelope::{EnvelopeConfig, EnvelopeStage};
use crate::synth::interpolator::InterpolationKind;
use crate::synth::params::{ParamId, PatchConfig, SourceMode, RATIO_RANGE};
use crate::synth::prelude::{MAX_STAGE_SECONDS, MIN_STAGE_SECONDS};
use crate::synth::voice::Voice;
use crate::synth::wavetable::WavetableData;

/// The polyphonic voice pool and its control surface.
///
/// Voices are allocated once at construction and only ever reused.
/// `process_buffer` is the real-time entry point: it renders into a
/// caller-owned buffer with no allocation, chunking oversized requests
/// into passes of at most the configured block size. Control-path calls
/// (note events, parameter setters) must be serialized against the
/// render call by the host; the bundled runtime does this with a
/// message queue drained at the top of each block.
pub struct SynthEngine {
    config: SynthConfig,
    voices: Vec<Voice>,
    bank: Vec<Algorithm>,
    patch: PatchConfig,
    wavetable: Arc<WavetableData>,

    master_volume: f32,
    tuning: f32,
    pitch_bend: f32,
    mod_wheel: f32,
    sample_clock: u64,
    mix_buffer: Vec<f32>,
}

impl SynthEngine {
    pub fn new(config: SynthConfig) -> Self {
        let sample_rate = config.sample_rate.max(1.0);
        let max_polyphony = config.max_polyphony.max(1);
        let max_block = config.max_block_size.max(1);
        let voices = (0..max_polyphony).map(|_| Voice::new(sample_rate)).collect();
        Self {
            config: SynthConfig {
                sample_rate,
                max_polyphony,
                max_block_size: max_block,
                ..config
            },
            voices,
            bank: builtin_bank(),
            patch: PatchConfig::default(),
            wavetable: Arc::new(WavetableData::sine_saw_morph(8, 2048)),
            master_volume: 0.8,
            tuning: 440.0,
            pitch_bend: 0.0,
            mod_wheel: 0.0,
            sample_clock: 0,
            mix_buffer: vec![0.0; max_block],
        }
    }

    // --- Note events -------------------------------------------------

    /// Trigger a note, stealing a voice if the pool is full. Returns
    /// false only when allocation is truly impossible (empty pool).
    pub fn note_on(&mut self, note: u8, velocity: u8) -> bool {
        let note = note.min(127);
        let velocity = velocity.min(127);

        let slot = match self.find_free_voice() {
            Some(slot) => Some(slot),
            None => self.steal_voice(),
        };
        let Some(slot) = slot else {
            return false;
        };

        let algorithm_index = self.patch.algorithm_id.clamp(1, self.bank.len()) - 1;
        let wavetable = match self.patch.source {
            SourceMode::Wavetable => Some(self.wavetable.clone()),
            SourceMode::Fm => None,
        };
        let start_time = self.sample_clock;
        let pitch_modulation = self.pitch_modulation();
        let mod_wheel = self.mod_wheel;

        let voice = &mut self.voices[slot];
        voice.configure(&self.patch, algorithm_index, wavetable, self.tuning);
        voice.set_pitch_modulation(pitch_modulation);
        voice.set_frame_scan(mod_wheel);
        voice.note_on(note, velocity, start_time);
        true
    }

    /// Release the most recently triggered sounding voice on `note`
    /// that is not already releasing. Re-triggered notes therefore
    /// release newest-first.
    pub fn note_off(&mut self, note: u8) {
        let mut best: Option<usize> = None;
        for (index, voice) in self.voices.iter().enumerate() {
            if voice.is_active() && voice.note() == note && !voice.is_releasing() {
                let newer = match best {
                    None => true,
                    Some(current) => voice.start_time() > self.voices[current].start_time(),
                };
                if newer {
                    best = Some(index);
                }
            }
        }
        if let Some(index) = best {
            self.voices[index].note_off();
        }
    }

    /// Graceful release of every sounding voice.
    pub fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut() {
            if voice.is_active() {
                voice.note_off();
            }
        }
    }

    /// Panic: silence every voice and clear the active set at once.
    /// Takes effect from the next sample processed; never fails.
    pub fn stop_all_voices(&mut self) {
        for voice in self.voices.iter_mut() {
            if voice.is_active() {
                voice.silence();
            }
        }
    }

    fn find_free_voice(&self) -> Option<usize> {
        self.voices.iter().position(|voice| !voice.is_active())
    }

    /// Deterministic stealing: prefer the oldest releasing voice, then
    /// the oldest voice outright. In-order iteration with a strict
    /// comparison breaks start-time ties toward the lowest index.
    fn steal_voice(&self) -> Option<usize> {
        self.oldest_matching(|voice| voice.is_active() && voice.is_releasing())
            .or_else(|| self.oldest_matching(|voice| voice.is_active()))
    }

    fn oldest_matching(&self, predicate: impl Fn(&Voice) -> bool) -> Option<usize> {
        let mut best: Option<(usize, u64)> = None;
        for (index, voice) in self.voices.iter().enumerate() {
            if !predicate(voice) {
                continue;
            }
            let better = match best {
                None => true,
                Some((_, start)) => voice.start_time() < start,
            };
            if better {
                best = Some((index, voice.start_time()));
            }
        }
        best.map(|(index, _)| index)
    }

    // --- Rendering ---------------------------------------------------

    /// Render into a caller-owned mono buffer. Requests longer than the
    /// configured block size run as several internal passes.
    pub fn process_buffer(&mut self, output: &mut [f32]) {
        let max_block = self.config.max_block_size;
        for chunk in output.chunks_mut(max_block) {
            self.render_block(chunk);
        }
    }

    /// Single-sample convenience; bit-identical to `process_buffer`
    /// over a one-frame buffer.
    pub fn process_sample(&mut self) -> f32 {
        let mut frame = [0.0_f32; 1];
        self.process_buffer(&mut frame);
        frame[0]
    }

    fn render_block(&mut self, output: &mut [f32]) {
        let frames = output.len();
        let mix = &mut self.mix_buffer[..frames];
        mix.fill(0.0);

        for voice in self.voices.iter_mut() {
            if !voice.is_active() {
                continue;
            }
            let algorithm = &self.bank[voice.algorithm_index()];
            for sample in mix.iter_mut() {
                *sample += voice.process_sample(algorithm);
            }
        }

        // Retire voices whose envelope finished during this pass.
        for voice in self.voices.iter_mut() {
            if voice.is_active() && voice.is_finished() {
                voice.deactivate();
            }
        }

        let gain = self.master_volume;
        for (out, &mixed) in output.iter_mut().zip(mix.iter()) {
            *out = mixed * gain;
        }
        self.sample_clock += frames as u64;
    }

    // --- Parameters --------------------------------------------------

    /// Dispatch a parameter change by id. Values clamp to their
    /// documented ranges; out-of-range operator indices are no-ops.
    pub fn set_param(&mut self, id: ParamId, value: f32) {
        match id {
            ParamId::MasterVolume => self.set_master_volume(value),
            ParamId::Algorithm => self.set_algorithm(value.round().max(1.0) as usize),
            ParamId::Tuning => self.set_tuning(value),
            ParamId::PitchBend => self.set_pitch_bend(value),
            ParamId::ModWheel => self.set_mod_wheel(value),
            ParamId::OperatorRatio(op) => self.set_operator_ratio(op, value),
            ParamId::OperatorLevel(op) => self.set_operator_level(op, value),
            ParamId::OperatorModulationIndex(op) => self.set_operator_modulation_index(op, value),
            ParamId::OperatorFeedback(op) => self.set_operator_feedback(op, value),
            ParamId::EnvelopeRate(stage) => self.set_envelope_rate(stage, value),
            ParamId::EnvelopeTarget(stage) => self.set_envelope_target(stage, value),
        }
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Select an algorithm by 1-based bank id. Applies to subsequently
    /// triggered notes; sounding voices keep the graph they started on.
    pub fn set_algorithm(&mut self, id: usize) {
        self.patch.algorithm_id = id.clamp(1, self.bank.len());
    }

    pub fn algorithm_id(&self) -> usize {
        self.patch.algorithm_id
    }

    pub fn algorithm_name(&self, id: usize) -> Option<&'static str> {
        self.bank.get(id.checked_sub(1)?).map(|a| a.name())
    }

    pub fn set_tuning(&mut self, a4_hz: f32) {
        self.tuning = a4_hz.clamp(400.0, 480.0);
    }

    /// Pitch bend in [-1, 1], scaled by the configured semitone range.
    /// Re-parameterizes sounding voices immediately.
    pub fn set_pitch_bend(&mut self, bend: f32) {
        self.pitch_bend = bend.clamp(-1.0, 1.0);
        let modulation = self.pitch_modulation();
        for voice in self.voices.iter_mut() {
            voice.set_pitch_modulation(modulation);
        }
    }

    fn pitch_modulation(&self) -> f32 {
        let semitones = self.pitch_bend * self.config.pitch_bend_range;
        2.0_f32.powf(semitones / 12.0) - 1.0
    }

    /// Mod wheel in [0, 1]; drives the wavetable frame scan, live.
    pub fn set_mod_wheel(&mut self, value: f32) {
        self.mod_wheel = value.clamp(0.0, 1.0);
        for voice in self.voices.iter_mut() {
            voice.set_frame_scan(self.mod_wheel);
        }
    }

    pub fn set_operator_ratio(&mut self, op_index: usize, ratio: f32) {
        if op_index >= OPERATOR_COUNT {
            eprintln!("Operator index {} out of bounds", op_index);
            return;
        }
        self.patch.operators[op_index].ratio = ratio.clamp(RATIO_RANGE.0, RATIO_RANGE.1);
    }

    pub fn operator_ratio(&self, op_index: usize) -> Option<f32> {
        self.patch.operators.get(op_index).map(|p| p.ratio)
    }

    pub fn set_operator_level(&mut self, op_index: usize, level: f32) {
        if op_index >= OPERATOR_COUNT {
            eprintln!("Operator index {} out of bounds", op_index);
            return;
        }
        self.patch.operators[op_index].level = level.clamp(0.0, 1.0);
    }

    pub fn set_operator_modulation_index(&mut self, op_index: usize, modulation_index: f32) {
        if op_index >= OPERATOR_COUNT {
            eprintln!("Operator index {} out of bounds", op_index);
            return;
        }
        self.patch.operators[op_index].modulation_index = modulation_index.clamp(0.0, 10.0);
    }

    pub fn set_operator_feedback(&mut self, op_index: usize, feedback: f32) {
        if op_index >= OPERATOR_COUNT {
            eprintln!("Operator index {} out of bounds", op_index);
            return;
        }
        self.patch.operators[op_index].feedback = feedback.clamp(0.0, 1.0);
    }

    pub fn set_envelope_rate(&mut self, stage: EnvelopeStage, seconds: f32) {
        self.patch.envelope.stage_mut(stage).rate =
            seconds.clamp(MIN_STAGE_SECONDS, MAX_STAGE_SECONDS);
    }

    pub fn set_envelope_target(&mut self, stage: EnvelopeStage, target: f32) {
        self.patch.envelope.stage_mut(stage).target_level = target.clamp(0.0, 1.0);
    }

    pub fn set_envelope_config(&mut self, envelope: EnvelopeConfig) {
        self.patch.envelope = envelope;
    }

    pub fn set_source_mode(&mut self, source: SourceMode) {
        self.patch.source = source;
    }

    pub fn set_interpolation(&mut self, kind: InterpolationKind) {
        self.patch.interpolation = kind;
    }

    pub fn set_wavetable(&mut self, wavetable: Arc<WavetableData>) {
        self.wavetable = wavetable;
    }

    pub fn set_patch(&mut self, patch: PatchConfig) {
        self.patch = patch;
    }

    pub fn patch(&self) -> &PatchConfig {
        &self.patch
    }

    /// Announce the audio device's true sample rate before streaming.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.config.sample_rate = sample_rate.max(1.0);
        for voice in self.voices.iter_mut() {
            voice.set_sample_rate(self.config.sample_rate);
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate
    }

    pub fn max_polyphony(&self) -> usize {
        self.config.max_polyphony
    }

    // --- Status ------------------------------------------------------

    pub fn active_voice_count(&self) -> usize {
        self.voices.iter().filter(|voice| voice.is_active()).count()
    }

    pub fn is_active(&self) -> bool {
        self.voices.iter().any(|voice| voice.is_active())
    }

    /// Notes currently held by active voices, in voice-index order.
    pub fn active_notes(&self) -> Vec<u8> {
        self.voices
            .iter()
            .filter(|voice| voice.is_active())
            .map(|voice| voice.note())
            .collect()
    }

    /// Per-voice status of the active set, in voice-index order.
    /// Control-path only; allocates.
    pub fn voice_statuses(&self) -> Vec<VoiceStatus> {
        self.voices
            .iter()
            .filter(|voice| voice.is_active())
            .map(|voice| VoiceStatus {
                note: voice.note(),
                velocity: voice.velocity(),
                start_time: voice.start_time(),
                releasing: voice.is_releasing(),
            })
            .collect()
    }
}

/// Read-only snapshot of one active voice, for hosts and tests.
#[derive(Clone, Copy, Debug)]
pub struct VoiceStatus {
    pub note: u8,
    pub velocity: u8,
    pub start_time: u64,
    pub releasing: bool,
}

impl Default for SynthEngine {
    fn default() -> Self {
        Self::new(SynthConfig::default())
    }
}
