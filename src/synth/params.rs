use crate::synth::algorithm::OPERATOR_COUNT;
use crate::synth::envelope::{EnvelopeConfig, EnvelopeStage};
use crate::synth::interpolator::InterpolationKind;
use crate::synth::note::NoteEvent;
use crate::synth::operator::MAX_MODULATION_INDEX;

/// Documented clamp range for operator frequency ratios.
pub const RATIO_RANGE: (f32, f32) = (0.1, 32.0);

/// Which render source a voice uses, chosen per patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SourceMode {
    /// FM operator graph (the algorithm's carrier sum).
    Fm,
    /// Wavetable playback through the frame interpolator.
    Wavetable,
}

/// Per-operator patch parameters, clamped at construction.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OperatorParams {
    /// Frequency ratio relative to the note's base frequency.
    pub ratio: f32,
    /// Output level scaling the operator amplitude.
    pub level: f32,
    pub modulation_index: f32,
    pub feedback: f32,
}

impl OperatorParams {
    pub fn new(ratio: f32, level: f32, modulation_index: f32, feedback: f32) -> Self {
        Self {
            ratio: ratio.clamp(RATIO_RANGE.0, RATIO_RANGE.1),
            level: level.clamp(0.0, 1.0),
            modulation_index: modulation_index.clamp(0.0, MAX_MODULATION_INDEX),
            feedback: feedback.clamp(0.0, 1.0),
        }
    }
}

impl Default for OperatorParams {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 0.0)
    }
}

/// Everything a preset store persists about the synthesis setup:
/// the algorithm choice, operator table, envelope, and render source.
/// Copied into each voice when a note is triggered.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PatchConfig {
    /// Algorithm id, 1-based into the built-in bank.
    pub algorithm_id: usize,
    pub operators: [OperatorParams; OPERATOR_COUNT],
    pub envelope: EnvelopeConfig,
    pub source: SourceMode,
    pub interpolation: InterpolationKind,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            algorithm_id: 1,
            operators: [
                OperatorParams::new(1.0, 1.0, 1.0, 0.0), // carrier
                OperatorParams::new(2.0, 0.6, 1.0, 0.0), // A
                OperatorParams::new(3.0, 0.4, 1.0, 0.0), // B1
                OperatorParams::new(0.5, 0.4, 1.0, 0.0), // B2
            ],
            envelope: EnvelopeConfig::default(),
            source: SourceMode::Fm,
            interpolation: InterpolationKind::CatmullRom,
        }
    }
}

/// Engine parameters addressable by id. The control path (MIDI mapper,
/// host UI) talks to the engine through this table instead of holding
/// callbacks into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamId {
    MasterVolume,
    Algorithm,
    Tuning,
    PitchBend,
    ModWheel,
    OperatorRatio(usize),
    OperatorLevel(usize),
    OperatorModulationIndex(usize),
    OperatorFeedback(usize),
    EnvelopeRate(EnvelopeStage),
    EnvelopeTarget(EnvelopeStage),
}

/// A control-path event, queued by input glue and drained by the
/// runtime at the top of each render block.
#[derive(Clone, Copy, Debug)]
pub enum ControlMessage {
    Note(NoteEvent),
    Param(ParamId, f32),
    AllNotesOff,
    StopAllVoices,
}
