use crate::synth::prelude::{OnceLock, TAU};

/// Number of entries in the precomputed sine table.
pub const SINE_TABLE_SIZE: usize = 4096;

static SINE_TABLE: OnceLock<Vec<f32>> = OnceLock::new();

fn table() -> &'static [f32] {
    SINE_TABLE.get_or_init(|| {
        (0..SINE_TABLE_SIZE)
            .map(|i| (i as f32 / SINE_TABLE_SIZE as f32 * TAU).sin())
            .collect()
    })
}

/// Table lookup of sin(phase) with linear interpolation between adjacent
/// entries. Accepts any finite phase; wraps internally.
pub fn sin(phase: f32) -> f32 {
    let table = table();
    let wrapped = phase.rem_euclid(TAU);
    let position = wrapped / TAU * SINE_TABLE_SIZE as f32;
    let index = position as usize; // in 0..SINE_TABLE_SIZE
    let frac = position - index as f32;

    let a = table[index % SINE_TABLE_SIZE];
    let b = table[(index + 1) % SINE_TABLE_SIZE];
    a + (b - a) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn interpolated_lookup_tracks_sin_under_1e3() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let phase: f32 = rng.random_range(-8.0 * TAU..8.0 * TAU);
            let error = (sin(phase) - phase.sin()).abs();
            assert!(error < 1e-3, "error {} at phase {}", error, phase);
        }
    }

    #[test]
    fn exact_at_quadrant_boundaries() {
        assert_eq!(sin(0.0), 0.0);
        assert!((sin(TAU / 4.0) - 1.0).abs() < 1e-4);
        assert!(sin(TAU / 2.0).abs() < 1e-4);
        assert!((sin(3.0 * TAU / 4.0) + 1.0).abs() < 1e-4);
    }

    #[test]
    fn wraps_negative_and_large_phases() {
        assert!((sin(-TAU / 4.0) + 1.0).abs() < 1e-4);
        assert!((sin(5.0 * TAU + 1.0) - 1.0_f32.sin()).abs() < 1e-3);
    }
}
