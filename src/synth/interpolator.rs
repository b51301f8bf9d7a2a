use std::collections::HashMap;

use crate::synth::prelude::PI;
use crate::synth::wavetable::WavetableData;

/// Frame-blending kernel selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InterpolationKind {
    Linear,
    /// 4-point intra-frame read (data-source responsibility), frames
    /// blended linearly.
    Hermite,
    CatmullRom,
    /// Tension-parameterized Catmull-Rom generalization; the tension
    /// lives on the interpolator, not the kind, so kinds stay hashable
    /// as cache keys.
    Cardinal,
    Bezier,
    BSpline,
    Smoothstep,
}

/// Oversample/filter/decimate settings for the anti-aliased path.
#[derive(Clone, Copy, Debug)]
pub struct AntiAliasConfig {
    /// AA engages when the fundamental exceeds this fraction of Nyquist.
    pub threshold: f32,
    /// Integer oversampling factor, clamped to 2..=4.
    pub oversample_factor: usize,
    /// FIR tap count (windowed sinc), clamped to 4..=128.
    pub filter_order: usize,
    /// Low-pass cutoff as a fraction of the base-rate Nyquist.
    pub cutoff: f32,
}

impl Default for AntiAliasConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            oversample_factor: 2,
            filter_order: 32,
            cutoff: 0.9,
        }
    }
}

impl AntiAliasConfig {
    fn clamped(mut self) -> Self {
        self.threshold = self.threshold.clamp(0.0, 1.0);
        self.oversample_factor = self.oversample_factor.clamp(2, 4);
        self.filter_order = self.filter_order.clamp(4, 128);
        self.cutoff = self.cutoff.clamp(0.01, 1.0);
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct CacheKey {
    frame_q: i64,
    sample_q: i64,
    kind: InterpolationKind,
}

const CACHE_QUANTIZATION: f32 = 4096.0;

/// Interpolates between wavetable frames at a fractional frame
/// position, optionally oversampling and low-pass filtering when the
/// fundamental runs high enough to alias.
#[derive(Clone, Debug)]
pub struct WavetableInterpolator {
    kind: InterpolationKind,
    tension: f32,
    sample_rate: f32,
    aa_enabled: bool,
    aa: AntiAliasConfig,
    fir: Vec<f32>,
    fir_state: Vec<f32>,
    fir_pos: usize,
    cache: HashMap<CacheKey, f32>,
    cache_capacity: usize,
}

impl WavetableInterpolator {
    pub fn new(kind: InterpolationKind, sample_rate: f32) -> Self {
        let aa = AntiAliasConfig::default();
        let fir = windowed_sinc_lowpass(aa.filter_order, aa.cutoff, aa.oversample_factor);
        let taps = fir.len();
        Self {
            kind,
            tension: 0.5,
            sample_rate: sample_rate.max(1.0),
            aa_enabled: false,
            aa,
            fir,
            fir_state: vec![0.0; taps],
            fir_pos: 0,
            cache: HashMap::new(),
            cache_capacity: 0,
        }
    }

    pub fn set_kind(&mut self, kind: InterpolationKind) {
        self.kind = kind;
    }

    pub fn kind(&self) -> InterpolationKind {
        self.kind
    }

    /// Cardinal-spline tension in [0, 1]; 0 reproduces Catmull-Rom.
    /// Tension is not part of the cache key, so changing it flushes.
    pub fn set_tension(&mut self, tension: f32) {
        self.tension = tension.clamp(0.0, 1.0);
        self.cache.clear();
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate.max(1.0);
    }

    pub fn set_anti_aliasing(&mut self, enabled: bool) {
        self.aa_enabled = enabled;
    }

    pub fn configure_anti_aliasing(&mut self, config: AntiAliasConfig) {
        self.aa = config.clamped();
        self.fir = windowed_sinc_lowpass(self.aa.filter_order, self.aa.cutoff, self.aa.oversample_factor);
        self.fir_state = vec![0.0; self.fir.len()];
        self.fir_pos = 0;
    }

    /// Enable the bounded lookup cache; zero (the default) disables it.
    /// Cache inserts allocate, so leave it off for interpolators driven
    /// from the real-time render path.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache_capacity = capacity;
        self.cache.clear();
        if capacity > 0 {
            self.cache.reserve(capacity);
        }
    }

    /// Interpolate one output sample. `fundamental` is the playback
    /// frequency in Hz, used only to gate the anti-aliased path.
    pub fn interpolate_sample(
        &mut self,
        table: &WavetableData,
        frame_position: f32,
        sample_position: f32,
        fundamental: f32,
    ) -> f32 {
        let nyquist = self.sample_rate * 0.5;
        if self.aa_enabled && fundamental > self.aa.threshold * nyquist {
            let factor = self.aa.oversample_factor;
            let mut acc = 0.0;
            for k in 0..factor {
                let offset = k as f32 / factor as f32;
                let value = self.base_value(table, frame_position, sample_position + offset);
                acc += self.fir_push(value);
            }
            acc / factor as f32
        } else {
            self.cached_base_value(table, frame_position, sample_position)
        }
    }

    fn cached_base_value(
        &mut self,
        table: &WavetableData,
        frame_position: f32,
        sample_position: f32,
    ) -> f32 {
        if self.cache_capacity == 0 {
            return self.base_value(table, frame_position, sample_position);
        }
        let key = CacheKey {
            frame_q: (frame_position * CACHE_QUANTIZATION).round() as i64,
            sample_q: (sample_position * CACHE_QUANTIZATION).round() as i64,
            kind: self.kind,
        };
        if let Some(&hit) = self.cache.get(&key) {
            return hit;
        }
        let value = self.base_value(table, frame_position, sample_position);
        if self.cache.len() >= self.cache_capacity {
            // Unordered eviction; the cache is an opportunistic
            // short-circuit, not an LRU.
            if let Some(&victim) = self.cache.keys().next() {
                self.cache.remove(&victim);
            }
        }
        self.cache.insert(key, value);
        value
    }

    /// The non-anti-aliased interpolation every path is built from.
    fn base_value(&self, table: &WavetableData, frame_position: f32, sample_position: f32) -> f32 {
        let last = (table.frame_count() - 1) as f32;
        let frame_position = frame_position.clamp(0.0, last);
        let i1 = frame_position.floor() as isize;
        let t = frame_position - frame_position.floor();

        let clamp_index = |i: isize| i.clamp(0, last as isize) as usize;
        let fetch = |i: isize| table.sample_linear(clamp_index(i), sample_position);

        match self.kind {
            InterpolationKind::Linear => {
                let p1 = fetch(i1);
                let p2 = fetch(i1 + 1);
                p1 + (p2 - p1) * t
            }
            InterpolationKind::Hermite => {
                let p1 = table.sample_hermite(clamp_index(i1), sample_position);
                let p2 = table.sample_hermite(clamp_index(i1 + 1), sample_position);
                p1 + (p2 - p1) * t
            }
            InterpolationKind::CatmullRom => {
                let (p0, p1, p2, p3) = (fetch(i1 - 1), fetch(i1), fetch(i1 + 1), fetch(i1 + 2));
                catmull_rom(p0, p1, p2, p3, t)
            }
            InterpolationKind::Cardinal => {
                let (p0, p1, p2, p3) = (fetch(i1 - 1), fetch(i1), fetch(i1 + 1), fetch(i1 + 2));
                cardinal(p0, p1, p2, p3, t, self.tension)
            }
            InterpolationKind::Bezier => {
                let (p0, p1, p2, p3) = (fetch(i1 - 1), fetch(i1), fetch(i1 + 1), fetch(i1 + 2));
                bezier(p0, p1, p2, p3, t)
            }
            InterpolationKind::BSpline => {
                let (p0, p1, p2, p3) = (fetch(i1 - 1), fetch(i1), fetch(i1 + 1), fetch(i1 + 2));
                b_spline(p0, p1, p2, p3, t)
            }
            InterpolationKind::Smoothstep => {
                let p1 = fetch(i1);
                let p2 = fetch(i1 + 1);
                let s = t * t * (3.0 - 2.0 * t);
                p1 + (p2 - p1) * s
            }
        }
    }

    fn fir_push(&mut self, input: f32) -> f32 {
        let taps = self.fir.len();
        self.fir_state[self.fir_pos] = input;
        let mut acc = 0.0;
        let mut index = self.fir_pos;
        for &coefficient in &self.fir {
            acc += coefficient * self.fir_state[index];
            index = if index == 0 { taps - 1 } else { index - 1 };
        }
        self.fir_pos = (self.fir_pos + 1) % taps;
        acc
    }
}

/// Catmull-Rom blend of four frame samples at fractional weight t.
pub fn catmull_rom(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    0.5 * (2.0 * p1
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t * t
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t * t * t)
}

/// Cardinal spline: Hermite basis with tangents scaled by
/// s = (1 - tension) / 2. Tension 0 reproduces Catmull-Rom.
pub fn cardinal(p0: f32, p1: f32, p2: f32, p3: f32, t: f32, tension: f32) -> f32 {
    let s = (1.0 - tension) * 0.5;
    let m1 = s * (p2 - p0);
    let m2 = s * (p3 - p1);
    let t2 = t * t;
    let t3 = t2 * t;
    let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
    let h10 = t3 - 2.0 * t2 + t;
    let h01 = 3.0 * t2 - 2.0 * t3;
    let h11 = t3 - t2;
    h00 * p1 + h10 * m1 + h01 * p2 + h11 * m2
}

/// Cubic Bezier with the four frame samples as control points.
pub fn bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Uniform cubic B-spline basis.
pub fn b_spline(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    ((1.0 - t).powi(3) * p0
        + (3.0 * t3 - 6.0 * t2 + 4.0) * p1
        + (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) * p2
        + t3 * p3)
        / 6.0
}

/// Hamming-windowed sinc low-pass, unit DC gain. `cutoff` is a fraction
/// of the base-rate Nyquist; the filter runs at the oversampled rate.
fn windowed_sinc_lowpass(taps: usize, cutoff: f32, oversample_factor: usize) -> Vec<f32> {
    let taps = taps.max(4);
    // Normalized cutoff relative to the oversampled rate, in (0, 0.5).
    let fc = (cutoff * 0.5 / oversample_factor as f32).clamp(1.0e-4, 0.499);
    let center = (taps - 1) as f32 / 2.0;

    let mut coefficients: Vec<f32> = (0..taps)
        .map(|n| {
            let x = n as f32 - center;
            let sinc = if x.abs() < 1.0e-6 {
                2.0 * fc
            } else {
                (2.0 * PI * fc * x).sin() / (PI * x)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * n as f32 / (taps - 1) as f32).cos();
            sinc * window
        })
        .collect();

    let sum: f32 = coefficients.iter().sum();
    if sum.abs() > 1.0e-12 {
        for coefficient in coefficients.iter_mut() {
            *coefficient /= sum;
        }
    }
    coefficients
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44_100.0;

    fn ramp_table() -> WavetableData {
        // Four constant frames at 0, 1, 2, 3 so frame interpolation is
        // easy to verify independent of the sample position.
        WavetableData::from_frames(vec![
            vec![0.0; 8],
            vec![1.0; 8],
            vec![2.0; 8],
            vec![3.0; 8],
        ])
        .unwrap()
    }

    #[test]
    fn all_kernels_pass_through_knots() {
        let table = ramp_table();
        for kind in [
            InterpolationKind::Linear,
            InterpolationKind::Hermite,
            InterpolationKind::CatmullRom,
            InterpolationKind::Cardinal,
            InterpolationKind::Smoothstep,
        ] {
            let mut interp = WavetableInterpolator::new(kind, SAMPLE_RATE);
            let value = interp.interpolate_sample(&table, 1.0, 0.0, 100.0);
            assert!((value - 1.0).abs() < 1e-5, "{:?} at knot: {}", kind, value);
        }
    }

    #[test]
    fn catmull_rom_matches_closed_form() {
        let (p0, p1, p2, p3) = (0.2, -0.5, 0.9, 0.1);
        for &t in &[0.0, 0.25, 0.5, 0.75, 1.0] {
            let expected = 0.5
                * (2.0 * p1
                    + (-p0 + p2) * t
                    + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t * t
                    + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t * t * t);
            assert!((catmull_rom(p0, p1, p2, p3, t) - expected).abs() < 1e-6);
        }
        // Endpoints hit the inner control points.
        assert!((catmull_rom(p0, p1, p2, p3, 0.0) - p1).abs() < 1e-6);
        assert!((catmull_rom(p0, p1, p2, p3, 1.0) - p2).abs() < 1e-6);
    }

    #[test]
    fn cardinal_with_zero_tension_is_catmull_rom() {
        let (p0, p1, p2, p3) = (0.3, 0.7, -0.2, 0.4);
        for &t in &[0.1, 0.5, 0.9] {
            let difference = (cardinal(p0, p1, p2, p3, t, 0.0) - catmull_rom(p0, p1, p2, p3, t)).abs();
            assert!(difference < 1e-6);
        }
    }

    #[test]
    fn bezier_and_bspline_endpoints() {
        let (p0, p1, p2, p3) = (0.0, 1.0, 1.0, 0.0);
        assert!((bezier(p0, p1, p2, p3, 0.0) - p0).abs() < 1e-6);
        assert!((bezier(p0, p1, p2, p3, 1.0) - p3).abs() < 1e-6);
        // B-spline endpoints weight the neighborhood (p0+4p1+p2)/6.
        let expected = (p0 + 4.0 * p1 + p2) / 6.0;
        assert!((b_spline(p0, p1, p2, p3, 0.0) - expected).abs() < 1e-6);
    }

    #[test]
    fn fir_coefficients_have_unit_dc_gain() {
        for &(taps, cutoff, factor) in &[(32, 0.9, 2), (17, 0.5, 4), (64, 0.8, 3)] {
            let fir = windowed_sinc_lowpass(taps, cutoff, factor);
            let sum: f32 = fir.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "taps={} sum={}", taps, sum);
        }
    }

    #[test]
    fn aa_path_is_bit_identical_below_threshold() {
        let table = WavetableData::sine_saw_morph(4, 64);
        let mut plain = WavetableInterpolator::new(InterpolationKind::CatmullRom, SAMPLE_RATE);
        let mut filtered = WavetableInterpolator::new(InterpolationKind::CatmullRom, SAMPLE_RATE);
        filtered.set_anti_aliasing(true);

        // 100 Hz is far below 0.3 * Nyquist at 44.1 kHz.
        for step in 0..256 {
            let sample_position = step as f32 * 0.37;
            let a = plain.interpolate_sample(&table, 1.3, sample_position, 100.0);
            let b = filtered.interpolate_sample(&table, 1.3, sample_position, 100.0);
            assert_eq!(a.to_bits(), b.to_bits(), "diverged at step {}", step);
        }
    }

    #[test]
    fn aa_path_engages_above_threshold_and_stays_bounded() {
        let table = WavetableData::sine_saw_morph(4, 64);
        let mut interp = WavetableInterpolator::new(InterpolationKind::CatmullRom, SAMPLE_RATE);
        interp.set_anti_aliasing(true);

        let fundamental = 0.4 * SAMPLE_RATE * 0.5; // above the 0.3 threshold
        let mut peak: f32 = 0.0;
        for step in 0..512 {
            let sample_position = step as f32 * (fundamental * 64.0 / SAMPLE_RATE);
            let value = interp.interpolate_sample(&table, 3.0, sample_position, fundamental);
            peak = peak.max(value.abs());
        }
        assert!(peak > 0.0, "filter must pass signal");
        assert!(peak < 2.0, "filter must not blow up, peak {}", peak);
    }

    #[test]
    fn cache_returns_identical_values_and_stays_bounded() {
        let table = WavetableData::sine_saw_morph(4, 64);
        let mut interp = WavetableInterpolator::new(InterpolationKind::BSpline, SAMPLE_RATE);
        interp.set_cache_capacity(16);

        let uncached = {
            let mut reference = WavetableInterpolator::new(InterpolationKind::BSpline, SAMPLE_RATE);
            reference.interpolate_sample(&table, 2.25, 5.5, 100.0)
        };
        let first = interp.interpolate_sample(&table, 2.25, 5.5, 100.0);
        let second = interp.interpolate_sample(&table, 2.25, 5.5, 100.0);
        assert_eq!(first.to_bits(), uncached.to_bits());
        assert_eq!(first.to_bits(), second.to_bits());

        // Flood past capacity; the map must not grow beyond it.
        for i in 0..200 {
            interp.interpolate_sample(&table, (i % 4) as f32 * 0.77, i as f32 * 0.13, 100.0);
        }
        assert!(interp.cache.len() <= 16);
    }
}
