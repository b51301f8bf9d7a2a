use crate::synth::prelude::TAU;

/// A multi-frame wavetable: an ordered sequence of fixed-length
/// waveform snapshots. Read-only during synthesis; built and owned by
/// the patch layer.
#[derive(Clone, Debug)]
pub struct WavetableData {
    frames: Vec<Vec<f32>>,
    frame_size: usize,
}

impl WavetableData {
    /// Build from raw frames. Every frame must share one length and at
    /// least one frame must be present.
    pub fn from_frames(frames: Vec<Vec<f32>>) -> Result<Self, String> {
        let frame_size = match frames.first() {
            Some(frame) if !frame.is_empty() => frame.len(),
            Some(_) => return Err("Wavetable frames must not be empty".to_string()),
            None => return Err("Wavetable needs at least one frame".to_string()),
        };
        if let Some(bad) = frames.iter().position(|f| f.len() != frame_size) {
            return Err(format!(
                "Frame {} has length {}, expected {}",
                bad,
                frames[bad].len(),
                frame_size
            ));
        }
        Ok(Self { frames, frame_size })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame(&self, index: usize) -> &[f32] {
        &self.frames[index.min(self.frames.len() - 1)]
    }

    /// Linear intra-frame read at a fractional sample position, wrapping
    /// at the frame edge.
    pub fn sample_linear(&self, frame_index: usize, position: f32) -> f32 {
        let frame = self.frame(frame_index);
        let len = frame.len();
        let wrapped = position.rem_euclid(len as f32);
        let index = wrapped as usize % len;
        let frac = wrapped - wrapped.floor();
        let a = frame[index];
        let b = frame[(index + 1) % len];
        a + (b - a) * frac
    }

    /// 4-point, third-order intra-frame read (Catmull-Rom form),
    /// wrapping at the frame edge.
    pub fn sample_hermite(&self, frame_index: usize, position: f32) -> f32 {
        let frame = self.frame(frame_index);
        let len = frame.len() as isize;
        let wrapped = position.rem_euclid(len as f32);
        let i1 = wrapped as isize;
        let t = wrapped - wrapped.floor();

        let at = |i: isize| frame[i.rem_euclid(len) as usize];
        let (y0, y1, y2, y3) = (at(i1 - 1), at(i1), at(i1 + 1), at(i1 + 2));

        let c0 = y1;
        let c1 = 0.5 * (y2 - y0);
        let c2 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
        let c3 = 0.5 * (y3 - y0) + 1.5 * (y1 - y2);
        c0 + t * (c1 + t * (c2 + t * c3))
    }

    /// Stock table morphing a sine into a band-limited-ish sawtooth
    /// across `frame_count` frames. Used by the demo and tests.
    pub fn sine_saw_morph(frame_count: usize, frame_size: usize) -> Self {
        let frame_count = frame_count.max(1);
        let frame_size = frame_size.max(2);
        let frames = (0..frame_count)
            .map(|frame| {
                let morph = if frame_count > 1 {
                    frame as f32 / (frame_count - 1) as f32
                } else {
                    0.0
                };
                (0..frame_size)
                    .map(|i| {
                        let phase = i as f32 / frame_size as f32;
                        let sine = (phase * TAU).sin();
                        // Additive saw, first 8 partials.
                        let saw: f32 = (1..=8)
                            .map(|n| (phase * TAU * n as f32).sin() / n as f32)
                            .sum::<f32>()
                            * (2.0 / TAU * 2.0);
                        sine * (1.0 - morph) + saw * morph
                    })
                    .collect()
            })
            .collect();
        Self {
            frames,
            frame_size,
        }
    }
}
