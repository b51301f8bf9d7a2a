use crate::audio::AudioBackend;
use crate::runtime::NativeSynth;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::sync::{Arc, Mutex};

pub struct CpalBackend {
    stream: Option<Stream>,
    synth: Arc<Mutex<NativeSynth>>,
}

impl CpalBackend {
    pub fn new(synth: Arc<Mutex<NativeSynth>>) -> Self {
        Self {
            stream: None,
            synth,
        }
    }

    fn select_output_device(
        &self,
        host: &cpal::Host,
    ) -> Result<cpal::Device, Box<dyn std::error::Error>> {
        if cfg!(target_os = "linux") {
            // Prefer the pipewire/default alias when present; ALSA
            // exposes a long list of per-card devices we don't want.
            for device in host.devices()? {
                let name = device.name().unwrap_or_default().to_lowercase();
                if name.starts_with("default:") || name.contains("pipewire") {
                    return Ok(device);
                }
            }
        }
        host.default_output_device()
            .ok_or_else(|| "No output device available".into())
    }

    fn build_stream(&mut self) -> Result<Stream, Box<dyn std::error::Error>> {
        let host = cpal::default_host();
        let device = self.select_output_device(&host)?;
        println!("Selected device: {}", device.name().unwrap_or_default());

        let supported_config = device.default_output_config()?;
        if supported_config.sample_format() != SampleFormat::F32 {
            return Err("Unsupported sample format".into());
        }
        let mut stream_config: cpal::StreamConfig = supported_config.into();
        stream_config.buffer_size = cpal::BufferSize::Fixed(256);

        let sample_rate = stream_config.sample_rate.0 as f32;
        let channels = stream_config.channels as usize;

        {
            let mut synth = self.synth.lock().unwrap();
            synth.set_sample_rate(sample_rate);
        }

        let synth = self.synth.clone();
        // Reused mono render buffer; grows once to the device block
        // size, then the callback is allocation-free.
        let mut mono = Vec::new();

        let stream = device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let frames = data.len() / channels;
                if mono.len() < frames {
                    mono.resize(frames, 0.0);
                }
                {
                    let mut synth = synth.lock().unwrap();
                    synth.process(&mut mono[..frames]);
                }
                for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                    for channel in frame.iter_mut() {
                        *channel = sample;
                    }
                }
            },
            |err| eprintln!("Stream error: {}", err),
            None,
        )?;

        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn start(&mut self) {
        match self.build_stream() {
            Ok(stream) => {
                if let Err(e) = stream.play() {
                    eprintln!("Failed to start stream: {}", e);
                    return;
                }
                self.stream = Some(stream);
            }
            Err(e) => eprintln!("Failed to build output stream: {}", e),
        }
    }

    fn stop(&mut self) {
        if let Some(stream) = &self.stream {
            if let Err(e) = stream.pause() {
                eprintln!("Failed to stop stream: {}", e);
            }
        }
    }
}
