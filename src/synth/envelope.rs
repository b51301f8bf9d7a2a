use crate::synth::prelude::{
    DENORMAL_THRESHOLD, MAX_STAGE_SECONDS, MIN_STAGE_SECONDS, PI,
};

/// Release rate forced by [`EnvelopeGenerator::quick_release`], used for
/// voice stealing and panic stops.
pub const QUICK_RELEASE_SECONDS: f32 = 0.010;

/// Where the envelope state machine currently is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopePhase {
    Idle,
    Delay,
    Attack,
    Decay,
    Sustain,
    Release,
    Finished,
}

/// One of the five configured segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EnvelopeStage {
    Delay,
    Attack,
    Decay,
    Sustain,
    Release,
}

impl EnvelopeStage {
    fn phase(self) -> EnvelopePhase {
        match self {
            EnvelopeStage::Delay => EnvelopePhase::Delay,
            EnvelopeStage::Attack => EnvelopePhase::Attack,
            EnvelopeStage::Decay => EnvelopePhase::Decay,
            EnvelopeStage::Sustain => EnvelopePhase::Sustain,
            EnvelopeStage::Release => EnvelopePhase::Release,
        }
    }

    fn next(self) -> Option<EnvelopeStage> {
        match self {
            EnvelopeStage::Delay => Some(EnvelopeStage::Attack),
            EnvelopeStage::Attack => Some(EnvelopeStage::Decay),
            EnvelopeStage::Decay => Some(EnvelopeStage::Sustain),
            EnvelopeStage::Sustain => None, // never auto-advances
            EnvelopeStage::Release => None,
        }
    }

    fn previous(self) -> Option<EnvelopeStage> {
        match self {
            EnvelopeStage::Delay => None,
            EnvelopeStage::Attack => Some(EnvelopeStage::Delay),
            EnvelopeStage::Decay => Some(EnvelopeStage::Attack),
            EnvelopeStage::Sustain => Some(EnvelopeStage::Decay),
            EnvelopeStage::Release => Some(EnvelopeStage::Sustain),
        }
    }
}

/// Shape applied to a stage's normalized progress.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CurveType {
    Linear,
    Exponential,
    Logarithmic,
    Sine,
    Power(f32),
    Snap,
}

impl CurveType {
    /// Map progress p in [0, 1] to the shaped blend factor.
    pub fn apply(self, p: f32) -> f32 {
        let p = p.clamp(0.0, 1.0);
        match self {
            CurveType::Linear => p,
            CurveType::Exponential => 1.0 - (-5.0 * p).exp(),
            CurveType::Logarithmic => (1.0 + 9.0 * p).log10(),
            CurveType::Sine => (p * PI / 2.0).sin(),
            CurveType::Power(k) => p.powf(k.max(1.0e-3)),
            CurveType::Snap => {
                if p > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Rate, curve and destination level for one stage.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageConfig {
    pub curve: CurveType,
    /// Stage duration in seconds, clamped to [0.001, 10].
    pub rate: f32,
    pub target_level: f32,
}

impl StageConfig {
    pub fn new(curve: CurveType, rate: f32, target_level: f32) -> Self {
        Self {
            curve,
            rate: rate.clamp(MIN_STAGE_SECONDS, MAX_STAGE_SECONDS),
            target_level: target_level.clamp(0.0, 1.0),
        }
    }
}

/// How a trigger interacts with an already-running envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TriggerMode {
    /// Always restart from the first stage (level resets to zero).
    Retrigger,
    /// Restart only when the envelope is not already active.
    Legato,
    /// Advance to the next stage instead of restarting when active.
    Cycle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LoopMode {
    Off,
    /// Re-enter decay each time the sustain ramp completes.
    SustainLoop,
    /// Jump back to `loop_start` when `loop_end` completes.
    FullLoop,
    /// Walk backward through the stages between `loop_start` and
    /// `loop_end`, reversing direction at either end.
    PingPong,
}

/// Full envelope description, copied into a voice at configuration time.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvelopeConfig {
    pub delay: StageConfig,
    pub attack: StageConfig,
    pub decay: StageConfig,
    pub sustain: StageConfig,
    pub release: StageConfig,
    /// How much velocity scales the output level, 0 = not at all.
    pub velocity_sensitivity: f32,
    /// Exponent shaping normalized velocity.
    pub velocity_curve: f32,
    /// Octaves-per-octave stretch of stage durations away from
    /// `center_note`. Zero disables tracking.
    pub key_tracking: f32,
    pub center_note: u8,
    pub trigger_mode: TriggerMode,
    pub loop_mode: LoopMode,
    pub loop_start: EnvelopeStage,
    pub loop_end: EnvelopeStage,
}

impl EnvelopeConfig {
    pub fn stage(&self, stage: EnvelopeStage) -> &StageConfig {
        match stage {
            EnvelopeStage::Delay => &self.delay,
            EnvelopeStage::Attack => &self.attack,
            EnvelopeStage::Decay => &self.decay,
            EnvelopeStage::Sustain => &self.sustain,
            EnvelopeStage::Release => &self.release,
        }
    }

    pub fn stage_mut(&mut self, stage: EnvelopeStage) -> &mut StageConfig {
        match stage {
            EnvelopeStage::Delay => &mut self.delay,
            EnvelopeStage::Attack => &mut self.attack,
            EnvelopeStage::Decay => &mut self.decay,
            EnvelopeStage::Sustain => &mut self.sustain,
            EnvelopeStage::Release => &mut self.release,
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            delay: StageConfig::new(CurveType::Linear, 0.001, 0.0),
            attack: StageConfig::new(CurveType::Linear, 0.01, 1.0),
            decay: StageConfig::new(CurveType::Exponential, 0.1, 0.8),
            sustain: StageConfig::new(CurveType::Linear, 0.05, 0.8),
            release: StageConfig::new(CurveType::Exponential, 0.3, 0.0),
            // Velocity already scales operator amplitude at note start;
            // envelope-side sensitivity is opt-in on top of that.
            velocity_sensitivity: 0.0,
            velocity_curve: 1.5,
            key_tracking: 0.0,
            center_note: 60,
            trigger_mode: TriggerMode::Retrigger,
            loop_mode: LoopMode::Off,
            loop_start: EnvelopeStage::Attack,
            loop_end: EnvelopeStage::Sustain,
        }
    }
}

/// Per-voice amplitude envelope.
///
/// `Idle -> Delay -> Attack -> Decay -> Sustain -> Release -> Finished`,
/// with `Finished` reusable as idle. Every stage ramps from the level it
/// was entered at toward its configured target, so the contour stays
/// continuous across stage boundaries; only a retrigger resets the level
/// discontinuously.
#[derive(Clone, Debug)]
pub struct EnvelopeGenerator {
    config: EnvelopeConfig,
    sample_rate: f32,

    phase: EnvelopePhase,
    current_level: f32,
    stage_progress: f32,
    stage_start_level: f32,
    stage_rate: f32,
    // Cached at stage entry; quick_release and backward (ping-pong)
    // traversal override what the config would dictate.
    stage_curve: CurveType,
    stage_target: f32,

    loop_count: u32,
    loop_direction: i32, // +1 forward, -1 backward
    velocity_scale: f32,
    key_multiplier: f32,
    gate: bool,
}

impl EnvelopeGenerator {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            config: EnvelopeConfig::default(),
            sample_rate: sample_rate.max(1.0),
            phase: EnvelopePhase::Idle,
            current_level: 0.0,
            stage_progress: 0.0,
            stage_start_level: 0.0,
            stage_rate: 0.0,
            stage_curve: CurveType::Linear,
            stage_target: 0.0,
            loop_count: 0,
            loop_direction: 1,
            velocity_scale: 1.0,
            key_multiplier: 1.0,
            gate: false,
        }
    }

    pub fn set_config(&mut self, config: EnvelopeConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    /// Start (or re-start, per the trigger mode) the envelope.
    /// `velocity` is normalized to [0, 1].
    pub fn trigger(&mut self, velocity: f32, note: u8) {
        let velocity = velocity.clamp(0.0, 1.0);
        let sensitivity = self.config.velocity_sensitivity.clamp(0.0, 1.0);
        self.velocity_scale =
            1.0 - sensitivity + sensitivity * velocity.powf(self.config.velocity_curve.max(1.0e-3));
        self.key_multiplier = 2.0_f32
            .powf(self.config.key_tracking * (note as f32 - self.config.center_note as f32) / 12.0);

        let active = self.is_active();
        match self.config.trigger_mode {
            TriggerMode::Retrigger => self.restart(),
            TriggerMode::Legato => {
                if !active {
                    self.restart();
                }
            }
            TriggerMode::Cycle => {
                if active {
                    self.cycle_advance();
                } else {
                    self.restart();
                }
            }
        }
        self.gate = true;
    }

    fn restart(&mut self) {
        self.current_level = 0.0;
        self.loop_count = 0;
        self.loop_direction = 1;
        // The delay stage is optional; a minimum-rate delay means "none".
        if self.config.delay.rate > MIN_STAGE_SECONDS {
            self.enter_stage(EnvelopeStage::Delay);
        } else {
            self.enter_stage(EnvelopeStage::Attack);
        }
    }

    fn cycle_advance(&mut self) {
        match self.active_stage() {
            Some(stage) => match stage.next() {
                Some(next) => self.enter_stage(next),
                // Sustain cycles onward into release; a cycling envelope
                // in release starts over.
                None if stage == EnvelopeStage::Sustain => self.enter_stage(EnvelopeStage::Release),
                None => self.restart(),
            },
            None => self.restart(),
        }
    }

    /// Begin the release ramp from the current level. No-op when idle,
    /// finished, or already releasing.
    pub fn release(&mut self) {
        self.gate = false;
        match self.phase {
            EnvelopePhase::Idle | EnvelopePhase::Finished | EnvelopePhase::Release => {}
            _ => self.enter_stage(EnvelopeStage::Release),
        }
    }

    /// Force a fixed short linear release, regardless of configuration.
    /// Used only for voice stealing and panic stops.
    pub fn quick_release(&mut self) {
        self.gate = false;
        if matches!(self.phase, EnvelopePhase::Idle | EnvelopePhase::Finished) {
            return;
        }
        self.phase = EnvelopePhase::Release;
        self.stage_start_level = self.current_level;
        self.stage_progress = 0.0;
        self.stage_rate = 1.0 / (self.sample_rate * QUICK_RELEASE_SECONDS);
        self.stage_curve = CurveType::Linear;
        self.stage_target = 0.0;
    }

    /// Advance one sample and return the new level.
    pub fn process_sample(&mut self) -> f32 {
        if matches!(self.phase, EnvelopePhase::Idle | EnvelopePhase::Finished) {
            return 0.0;
        }

        self.stage_progress += self.stage_rate;
        let shaped = self.stage_curve.apply(self.stage_progress);
        self.current_level =
            self.stage_start_level + (self.stage_target - self.stage_start_level) * shaped;
        if self.current_level.abs() < DENORMAL_THRESHOLD {
            self.current_level = 0.0;
        }

        if self.stage_progress >= 1.0 {
            self.complete_stage();
        }
        self.current_level
    }

    /// Current level scaled by the velocity of the triggering note.
    pub fn level(&self) -> f32 {
        self.current_level * self.velocity_scale
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.phase, EnvelopePhase::Idle | EnvelopePhase::Finished)
    }

    pub fn is_releasing(&self) -> bool {
        self.phase == EnvelopePhase::Release
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::Finished
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// Reset to idle without rendering the release tail.
    pub fn reset(&mut self) {
        self.phase = EnvelopePhase::Idle;
        self.current_level = 0.0;
        self.stage_progress = 0.0;
        self.stage_start_level = 0.0;
        self.loop_count = 0;
        self.loop_direction = 1;
        self.gate = false;
    }

    fn active_stage(&self) -> Option<EnvelopeStage> {
        match self.phase {
            EnvelopePhase::Delay => Some(EnvelopeStage::Delay),
            EnvelopePhase::Attack => Some(EnvelopeStage::Attack),
            EnvelopePhase::Decay => Some(EnvelopeStage::Decay),
            EnvelopePhase::Sustain => Some(EnvelopeStage::Sustain),
            EnvelopePhase::Release => Some(EnvelopeStage::Release),
            _ => None,
        }
    }

    fn enter_stage(&mut self, stage: EnvelopeStage) {
        let cfg = *self.config.stage(stage);
        self.phase = stage.phase();
        self.stage_start_level = self.current_level;
        self.stage_progress = 0.0;
        self.stage_rate = self.stage_rate_for(cfg.rate);
        self.stage_curve = cfg.curve;
        self.stage_target = cfg.target_level;
    }

    /// Enter `stage` walking backward (ping-pong): ramp toward the level
    /// the stage was entered at on the forward pass, i.e. the target of
    /// the stage before it (zero ahead of Delay).
    fn enter_stage_backward(&mut self, stage: EnvelopeStage) {
        let cfg = *self.config.stage(stage);
        self.phase = stage.phase();
        self.stage_start_level = self.current_level;
        self.stage_progress = 0.0;
        self.stage_rate = self.stage_rate_for(cfg.rate);
        self.stage_curve = cfg.curve;
        self.stage_target = match stage.previous() {
            Some(previous) => self.config.stage(previous).target_level,
            None => 0.0,
        };
    }

    fn stage_rate_for(&self, seconds: f32) -> f32 {
        let effective = (seconds * self.key_multiplier).max(MIN_STAGE_SECONDS);
        1.0 / (self.sample_rate * effective)
    }

    fn complete_stage(&mut self) {
        let stage = match self.active_stage() {
            Some(stage) => stage,
            None => return,
        };

        if stage == EnvelopeStage::Release {
            self.phase = EnvelopePhase::Finished;
            self.current_level = 0.0;
            return;
        }

        if self.gate {
            match self.config.loop_mode {
                LoopMode::SustainLoop if stage == EnvelopeStage::Sustain => {
                    self.loop_count += 1;
                    self.enter_stage(EnvelopeStage::Decay);
                    return;
                }
                LoopMode::FullLoop if stage == self.config.loop_end => {
                    self.loop_count += 1;
                    self.enter_stage(self.config.loop_start);
                    return;
                }
                LoopMode::PingPong => {
                    if self.loop_direction > 0 && stage == self.config.loop_end {
                        self.loop_direction = -1;
                        self.enter_stage_backward(stage);
                        return;
                    }
                    if self.loop_direction < 0 {
                        if stage == self.config.loop_start {
                            self.loop_direction = 1;
                            self.loop_count += 1;
                            self.enter_stage(stage);
                        } else if let Some(previous) = stage.previous() {
                            self.enter_stage_backward(previous);
                        } else {
                            self.loop_direction = 1;
                            self.enter_stage(stage);
                        }
                        return;
                    }
                }
                _ => {}
            }
        }

        match stage.next() {
            Some(next) => self.enter_stage(next),
            // Sustain holds; pin progress so the level stays put.
            None => {
                self.stage_progress = 1.0;
                self.stage_rate = 0.0;
                self.current_level = self.stage_target;
            }
        }
    }
}
