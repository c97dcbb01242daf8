use std::path::PathBuf;

use hound::{SampleFormat, WavReader};

use super::source::{SampleFrame, SampleSource};
use crate::error::AudioError;

/// Plays a WAV file through the meter as if it were live input
///
/// Each read returns `window_size` samples per channel starting at the
/// playhead, then advances the playhead by one tick's worth of audio
/// (`sample_rate / tick_hz`). Windows running past the end are padded with
/// silence so the buffer length stays constant.
pub struct WavFileSource {
    path: PathBuf,
    window_size: usize,
    tick_hz: u32,
    looping: bool,
    left: Vec<f32>,
    right: Option<Vec<f32>>,
    position: usize,
    hop: usize,
    acquired: bool,
}

impl WavFileSource {
    pub fn new(path: impl Into<PathBuf>, window_size: usize, tick_hz: u32) -> Self {
        Self {
            path: path.into(),
            window_size: window_size.max(1),
            tick_hz: tick_hz.max(1),
            looping: false,
            left: Vec::new(),
            right: None,
            position: 0,
            hop: 1,
            acquired: false,
        }
    }

    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    /// Playhead position in samples per channel
    pub fn position(&self) -> usize {
        self.position
    }

    fn load(&mut self) -> Result<(), AudioError> {
        let mut reader = WavReader::open(&self.path).map_err(|e| AudioError::StreamOpenFailed {
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        let spec = reader.spec();

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(wav_error)?,
            SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()
                    .map_err(wav_error)?
            }
        };

        let channels = spec.channels.max(1) as usize;
        let mut left = Vec::with_capacity(samples.len() / channels);
        let mut right = Vec::with_capacity(samples.len() / channels);
        for frame in samples.chunks(channels) {
            left.push(frame[0]);
            right.push(frame.get(1).copied().unwrap_or(frame[0]));
        }

        self.hop = (spec.sample_rate / self.tick_hz).max(1) as usize;
        self.left = left;
        self.right = (channels >= 2).then_some(right);
        self.position = 0;

        log::info!(
            "[WavFileSource] Loaded {:?}: {} Hz, {} ch, {} frames",
            self.path,
            spec.sample_rate,
            channels,
            self.left.len()
        );
        Ok(())
    }

    fn window(&self, channel: &[f32]) -> Vec<f32> {
        let start = self.position.min(channel.len());
        let end = (self.position + self.window_size).min(channel.len());
        let mut window = channel[start..end].to_vec();
        window.resize(self.window_size, 0.0);
        window
    }
}

fn wav_error(err: hound::Error) -> AudioError {
    AudioError::HardwareError {
        details: format!("WAV decode failed: {}", err),
    }
}

impl SampleSource for WavFileSource {
    fn acquire(&mut self) -> Result<(), AudioError> {
        if self.acquired {
            return Err(AudioError::AlreadyRunning);
        }
        self.load()?;
        self.acquired = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<SampleFrame, AudioError> {
        if !self.acquired {
            return Err(AudioError::NotRunning);
        }
        if self.position >= self.left.len() {
            if self.looping && !self.left.is_empty() {
                self.position = 0;
            } else {
                return Err(AudioError::SourceExhausted);
            }
        }

        let frame = match &self.right {
            Some(right) => SampleFrame::from_pair(self.window(&self.left), self.window(right)),
            None => SampleFrame::mono(self.window(&self.left)),
        };
        self.position += self.hop;
        Ok(frame)
    }

    fn release(&mut self) {
        self.acquired = false;
        self.left = Vec::new();
        self.right = None;
        self.position = 0;
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}
