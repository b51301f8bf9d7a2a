use crate::synth::note::{NoteEvent, NoteSource};
use crate::synth::params::{ControlMessage, ParamId};
use device_query::{DeviceQuery, DeviceState, Keycode};
use std::collections::HashMap;
use std::sync::mpsc::Sender;

const ALGORITHM_COUNT: usize = 8;

pub struct KeyboardHandler {
    device_state: DeviceState,
    key_states: HashMap<Keycode, bool>,
    key_to_note: HashMap<Keycode, u8>,
    control_keys: HashMap<Keycode, bool>,
    sender: Sender<ControlMessage>,
    algorithm_id: usize,
}

impl KeyboardHandler {
    pub fn new(sender: Sender<ControlMessage>) -> Self {
        let device_state = DeviceState::new();
        let mut key_states: HashMap<Keycode, bool> = HashMap::new();
        let mut control_keys: HashMap<Keycode, bool> = HashMap::new();

        // QWERTY-to-note mapping, naturals on the home row.
        let key_to_note: HashMap<Keycode, u8> = [
            (Keycode::A, 57),         // A3
            (Keycode::S, 59),         // B3
            (Keycode::D, 60),         // C4
            (Keycode::F, 62),         // D4
            (Keycode::G, 64),         // E4
            (Keycode::H, 65),         // F4
            (Keycode::J, 67),         // G4
            (Keycode::K, 69),         // A4
            (Keycode::L, 71),         // B4
            (Keycode::Semicolon, 72), // C5
            // Top row sharps/flats.
            (Keycode::W, 58),
            (Keycode::R, 61),
            (Keycode::T, 63),
            (Keycode::U, 66),
            (Keycode::I, 68),
            (Keycode::O, 70),
            (Keycode::LeftBracket, 73),
        ]
        .iter()
        .cloned()
        .collect();

        for key in key_to_note.keys() {
            key_states.insert(*key, false);
        }

        // Comma/dot step the algorithm, Escape is panic.
        control_keys.insert(Keycode::Comma, false);
        control_keys.insert(Keycode::Dot, false);
        control_keys.insert(Keycode::Escape, false);

        Self {
            device_state,
            key_states,
            key_to_note,
            control_keys,
            sender,
            algorithm_id: 1,
        }
    }

    pub fn update(&mut self) {
        let keys: Vec<Keycode> = self.device_state.get_keys();

        for (key, note) in &self.key_to_note {
            let is_pressed = keys.contains(key);
            let was_pressed = self.key_states.get(key).cloned().unwrap_or(false);
            if is_pressed == was_pressed {
                continue;
            }
            self.key_states.insert(*key, is_pressed);

            let velocity = if is_pressed { 100 } else { 0 };
            match NoteEvent::new(*note, velocity, is_pressed, NoteSource::Keyboard) {
                Ok(event) => {
                    if let Err(e) = self.sender.send(ControlMessage::Note(event)) {
                        eprintln!("Error sending note event: {}", e);
                    }
                }
                Err(e) => eprintln!("Invalid note event: {}", e),
            }
        }

        for key in [Keycode::Comma, Keycode::Dot, Keycode::Escape] {
            let is_pressed = keys.contains(&key);
            let was_pressed = self.control_keys.get(&key).cloned().unwrap_or(false);
            if is_pressed == was_pressed {
                continue;
            }
            self.control_keys.insert(key, is_pressed);
            if !is_pressed {
                continue;
            }
            let message = match key {
                Keycode::Comma => {
                    self.algorithm_id = if self.algorithm_id <= 1 {
                        ALGORITHM_COUNT
                    } else {
                        self.algorithm_id - 1
                    };
                    println!("Algorithm {}", self.algorithm_id);
                    ControlMessage::Param(ParamId::Algorithm, self.algorithm_id as f32)
                }
                Keycode::Dot => {
                    self.algorithm_id = self.algorithm_id % ALGORITHM_COUNT + 1;
                    println!("Algorithm {}", self.algorithm_id);
                    ControlMessage::Param(ParamId::Algorithm, self.algorithm_id as f32)
                }
                _ => ControlMessage::StopAllVoices,
            };
            if let Err(e) = self.sender.send(message) {
                eprintln!("Error sending control message: {}", e);
            }
        }
    }
}
