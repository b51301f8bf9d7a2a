use crate::audio::{AudioBackend, CpalBackend};
use crate::input::{KeyboardHandler, MidiHandler};
use crate::synth::output::{Bypass, OutputStage};
use crate::synth::params::ControlMessage;
use crate::synth::SynthEngine;
use std::sync::mpsc::{channel, Receiver};
use std::sync::{Arc, Mutex};

/// Native host wrapper around the engine. Control events (notes,
/// parameter changes) arrive on an mpsc queue from the input glue and
/// are drained once at the top of each render block, so a change
/// becomes audible at the next block boundary, never mid-block.
pub struct NativeSynth {
    engine: SynthEngine,
    control_receiver: Receiver<ControlMessage>,
    output_stage: Box<dyn OutputStage>,
}

impl NativeSynth {
    pub fn new(control_receiver: Receiver<ControlMessage>) -> Self {
        Self {
            engine: SynthEngine::default(),
            control_receiver,
            output_stage: Box::new(Bypass),
        }
    }

    /// Attach the host's output-effects stage, applied after the
    /// engine render each block.
    pub fn set_output_stage(&mut self, stage: Box<dyn OutputStage>) {
        self.output_stage = stage;
    }

    pub fn process(&mut self, output: &mut [f32]) {
        self.drain_control_events();
        self.engine.process_buffer(output);
        self.output_stage.process(output);
    }

    fn drain_control_events(&mut self) {
        while let Ok(message) = self.control_receiver.try_recv() {
            match message {
                ControlMessage::Note(event) => {
                    if event.is_on {
                        self.engine.note_on(event.note, event.velocity);
                    } else {
                        self.engine.note_off(event.note);
                    }
                }
                ControlMessage::Param(id, value) => self.engine.set_param(id, value),
                ControlMessage::AllNotesOff => self.engine.all_notes_off(),
                ControlMessage::StopAllVoices => self.engine.stop_all_voices(),
            }
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.engine.set_sample_rate(sample_rate);
    }

    pub fn engine(&self) -> &SynthEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SynthEngine {
        &mut self.engine
    }
}

/// Wire up the audio backend and input handlers, then poll input until
/// the process is killed.
pub fn start() {
    let (control_tx, control_rx) = channel();

    let synth = Arc::new(Mutex::new(NativeSynth::new(control_rx)));

    let mut audio_backend = CpalBackend::new(synth.clone());
    audio_backend.start();

    let mut keyboard_handler = KeyboardHandler::new(control_tx.clone());
    let mut midi_handler = MidiHandler::new(control_tx);

    loop {
        keyboard_handler.update();
        midi_handler.update();
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::note::{NoteEvent, NoteSource};
    use crate::synth::params::ParamId;
    use std::sync::mpsc::channel;

    #[test]
    fn queued_events_apply_at_the_next_block() {
        let (tx, rx) = channel();
        let mut synth = NativeSynth::new(rx);

        tx.send(ControlMessage::Note(
            NoteEvent::new(60, 100, true, NoteSource::Host).unwrap(),
        ))
        .unwrap();
        tx.send(ControlMessage::Param(ParamId::MasterVolume, 0.5))
            .unwrap();

        // Nothing audible before a block is rendered.
        assert_eq!(synth.engine().active_voice_count(), 0);

        let mut block = [0.0_f32; 64];
        synth.process(&mut block);
        assert_eq!(synth.engine().active_voice_count(), 1);
        assert!((synth.engine().master_volume() - 0.5).abs() < 1e-6);

        tx.send(ControlMessage::StopAllVoices).unwrap();
        synth.process(&mut block);
        assert_eq!(synth.engine().active_voice_count(), 0);
    }
}
