use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};

use super::capture::{capture_channel, CaptureConsumer, CaptureProducer, CaptureWindow};
use super::source::{SampleFrame, SampleSource};
use crate::config::AudioConfig;
use crate::error::AudioError;

/// Default input device captured through cpal
///
/// The stream callback converts device samples to f32 and pushes them into
/// the capture ring; `read_frame` drains the ring into the sliding window.
/// `cpal::Stream` is not `Send`, so this source stays on the thread that
/// drives the meter.
pub struct CpalSource {
    config: AudioConfig,
    stream: Option<cpal::Stream>,
    consumer: Option<CaptureConsumer>,
    window: Option<CaptureWindow>,
    device_name: Option<String>,
}

impl CpalSource {
    pub fn new(config: AudioConfig) -> Self {
        Self {
            config,
            stream: None,
            consumer: None,
            window: None,
            device_name: None,
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    /// Frames dropped because ticks fell behind the device
    pub fn overruns(&self) -> u64 {
        self.consumer.as_ref().map_or(0, CaptureConsumer::overruns)
    }

    fn create_input_stream(
        &self,
        producer: CaptureProducer,
    ) -> Result<(cpal::Stream, String, bool), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default input device found".to_string(),
            })?;
        let name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let config = device
            .default_input_config()
            .map_err(|e| AudioError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels = stream_config.channels as usize;

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                build_stream::<f32>(&device, &stream_config, producer, channels)
            }
            cpal::SampleFormat::I16 => {
                build_stream::<i16>(&device, &stream_config, producer, channels)
            }
            // 8-bit devices deliver centered bytes; the sample conversion maps 128 to 0.0
            cpal::SampleFormat::U8 => {
                build_stream::<u8>(&device, &stream_config, producer, channels)
            }
            other => {
                return Err(AudioError::StreamOpenFailed {
                    reason: format!("Unsupported input sample format: {:?}", other),
                })
            }
        }
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => AudioError::PermissionDenied,
            other => AudioError::StreamOpenFailed {
                reason: format!("{:?}", other),
            },
        })?;

        Ok((stream, name, channels >= 2))
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: CaptureProducer,
    channels: usize,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            producer.push_interleaved(data, channels);
        },
        |err| log::error!("Input stream error: {}", err),
        None,
    )
}

impl SampleSource for CpalSource {
    fn acquire(&mut self) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let (producer, consumer) = capture_channel(self.config.ring_capacity);
        let (stream, name, stereo) = self.create_input_stream(producer)?;

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Input start failed: {}", e),
        })?;

        log::info!("[CpalSource] Capturing from '{}' (stereo: {})", name, stereo);

        self.stream = Some(stream);
        self.consumer = Some(consumer);
        self.window = Some(CaptureWindow::new(self.config.window_size, stereo));
        self.device_name = Some(name);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<SampleFrame, AudioError> {
        match (self.consumer.as_mut(), self.window.as_mut()) {
            (Some(consumer), Some(window)) => {
                consumer.drain_into(window);
                Ok(window.frame())
            }
            _ => Err(AudioError::NotRunning),
        }
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            log::info!("[CpalSource] Input stream released");
        }
        self.consumer = None;
        self.window = None;
    }

    fn is_acquired(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for CpalSource {
    fn drop(&mut self) {
        self.release();
    }
}
