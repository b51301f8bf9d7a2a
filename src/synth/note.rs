/// Where a note event originated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteSource {
    Keyboard,
    Midi,
    Host,
}

/// A validated note-on or note-off event entering the engine.
#[derive(Clone, Copy, Debug)]
pub struct NoteEvent {
    pub note: u8,     // MIDI note number (0-127)
    pub velocity: u8, // MIDI velocity (0-127)
    pub is_on: bool,
    pub source: NoteSource,
}

impl NoteEvent {
    pub fn new(note: u8, velocity: u8, is_on: bool, source: NoteSource) -> Result<Self, String> {
        if note > 127 {
            return Err(format!("Note number {} out of MIDI range", note));
        }
        if velocity > 127 {
            return Err(format!("Velocity {} out of MIDI range", velocity));
        }
        Ok(Self {
            note,
            velocity,
            is_on,
            source,
        })
    }

    /// Equal-tempered frequency of this note, A4 = 440 Hz.
    pub fn frequency(&self) -> f32 {
        note_to_frequency(self.note)
    }
}

pub fn note_to_frequency(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(NoteEvent::new(128, 64, true, NoteSource::Host).is_err());
        assert!(NoteEvent::new(60, 128, true, NoteSource::Host).is_err());
        assert!(NoteEvent::new(127, 127, false, NoteSource::Host).is_ok());
    }

    #[test]
    fn concert_pitch_reference_points() {
        assert!((note_to_frequency(69) - 440.0).abs() < 1e-4);
        assert!((note_to_frequency(57) - 220.0).abs() < 1e-4);
        assert!((note_to_frequency(60) - 261.6256).abs() < 1e-3);
    }
}
