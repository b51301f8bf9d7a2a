use crate::synth::note::{NoteEvent, NoteSource};
use crate::synth::params::{ControlMessage, ParamId};
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use std::error::Error;
use std::io::{stdin, stdout, Write};
use std::sync::mpsc::{self, Receiver, Sender};

pub struct MidiHandler {
    /// Holds the connection to keep it alive
    #[allow(dead_code)]
    connection: Option<MidiInputConnection<()>>,
    receiver: Option<Receiver<(u8, u8, u8)>>, // (status, data1, data2)
    sender: Sender<ControlMessage>,
}

impl MidiHandler {
    pub fn new(sender: Sender<ControlMessage>) -> Self {
        match Self::try_new(sender.clone()) {
            Ok(handler) => handler,
            Err(e) => {
                println!(
                    "Failed to initialize MIDI: {}. MIDI functionality will be disabled.",
                    e
                );
                Self {
                    connection: None,
                    receiver: None,
                    sender,
                }
            }
        }
    }

    fn try_new(sender: Sender<ControlMessage>) -> Result<Self, Box<dyn Error>> {
        let midi_in = MidiInput::new("polyfm input")?;
        let port = Self::select_input_port(&midi_in)?;
        let port_name = midi_in.port_name(&port)?;

        let (raw_tx, raw_rx) = mpsc::channel();

        let connection = midi_in.connect(
            &port,
            "midir-read-input",
            move |_, message, _| {
                if message.len() >= 3 {
                    let _ = raw_tx.send((message[0], message[1], message[2]));
                }
            },
            (),
        )?;

        println!("Opened MIDI port: {}", port_name);

        Ok(Self {
            connection: Some(connection),
            receiver: Some(raw_rx),
            sender,
        })
    }

    fn select_input_port(midi_in: &MidiInput) -> Result<MidiInputPort, Box<dyn Error>> {
        let in_ports = midi_in.ports();
        if in_ports.is_empty() {
            return Err("No MIDI input ports found".into());
        }

        println!("Available MIDI input ports:");
        for (i, port) in in_ports.iter().enumerate() {
            println!("{}: {}", i, midi_in.port_name(port)?);
        }

        print!("Select MIDI input port: ");
        stdout().flush()?;
        let mut input = String::new();
        stdin().read_line(&mut input)?;
        let selection = input.trim().parse::<usize>().unwrap_or(0);

        in_ports
            .get(selection)
            .cloned()
            .ok_or_else(|| "Invalid MIDI port selection".into())
    }

    /// Drain raw MIDI bytes and translate them onto the control queue.
    pub fn update(&mut self) {
        let Some(receiver) = &self.receiver else {
            return;
        };
        while let Ok((status, data1, data2)) = receiver.try_recv() {
            if let Some(message) = Self::translate(status, data1, data2) {
                if let Err(e) = self.sender.send(message) {
                    eprintln!("Error sending MIDI control message: {}", e);
                }
            }
        }
    }

    fn translate(status: u8, data1: u8, data2: u8) -> Option<ControlMessage> {
        match status & 0xF0 {
            0x90 if data2 > 0 => NoteEvent::new(data1, data2, true, NoteSource::Midi)
                .ok()
                .map(ControlMessage::Note),
            // Note-on with velocity zero is a release.
            0x80 | 0x90 => NoteEvent::new(data1, data2, false, NoteSource::Midi)
                .ok()
                .map(ControlMessage::Note),
            0xE0 => {
                // 14-bit pitch bend, centered at 8192, scaled to [-1, 1].
                let raw = ((data2 as i32) << 7 | data1 as i32) - 8192;
                Some(ControlMessage::Param(
                    ParamId::PitchBend,
                    raw as f32 / 8192.0,
                ))
            }
            0xB0 => match data1 {
                1 => Some(ControlMessage::Param(
                    ParamId::ModWheel,
                    data2 as f32 / 127.0,
                )),
                7 => Some(ControlMessage::Param(
                    ParamId::MasterVolume,
                    data2 as f32 / 127.0,
                )),
                120 => Some(ControlMessage::StopAllVoices),
                123 => Some(ControlMessage::AllNotesOff),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_note_and_controller_messages() {
        match MidiHandler::translate(0x90, 60, 100) {
            Some(ControlMessage::Note(event)) => {
                assert!(event.is_on);
                assert_eq!(event.note, 60);
            }
            other => panic!("unexpected {:?}", other),
        }
        // Running-status note-off.
        match MidiHandler::translate(0x90, 60, 0) {
            Some(ControlMessage::Note(event)) => assert!(!event.is_on),
            other => panic!("unexpected {:?}", other),
        }
        match MidiHandler::translate(0xB0, 123, 0) {
            Some(ControlMessage::AllNotesOff) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn pitch_bend_center_maps_to_zero() {
        match MidiHandler::translate(0xE0, 0x00, 0x40) {
            Some(ControlMessage::Param(ParamId::PitchBend, value)) => {
                assert!(value.abs() < 1e-6);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
