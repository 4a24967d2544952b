use crate::{
    config::{SampleFormat, SynthConfig},
    synth::SynthRenderer,
};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, SizedSample, Stream, StreamConfig,
};
use thiserror::Error;
use tracing::{error, info};

/// A running output stream driving a [`SynthRenderer`] from the host's audio callback.
pub struct AudioOutput {
    _stream: Stream,
    device_name: String,
}

impl AudioOutput {
    /// Opens the default output device of the default host and starts rendering.
    pub fn open_default(config: &SynthConfig, renderer: SynthRenderer) -> Result<Self, OutputError> {
        let host = cpal::default_host();
        info!("Audio host: {:?}", host.id());
        let device = host.default_output_device().ok_or(OutputError::NoDevice)?;
        Self::open(device, config, renderer)
    }

    /// Builds and starts a stream on `device` using the configured rate, channels and format.
    pub fn open(device: Device, config: &SynthConfig, renderer: SynthRenderer) -> Result<Self, OutputError> {
        let device_name = device.name().unwrap_or_else(|_| "<unknown>".to_string());
        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let stream = match config.sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, renderer)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, renderer)?,
        };
        stream.play()?;

        info!(
            device = %device_name,
            sample_rate = config.sample_rate,
            channels = config.channels,
            format = ?config.sample_format,
            "audio stream started"
        );
        Ok(Self {
            _stream: stream,
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

fn build_stream<T>(device: &Device, config: &StreamConfig, mut renderer: SynthRenderer) -> Result<Stream, OutputError>
where
    T: SizedSample + FromSample<f32>,
{
    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| renderer.render(data),
        |err| error!("an error occurred on stream: {}", err),
        None,
    )?;
    Ok(stream)
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}
