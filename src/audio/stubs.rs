//! Stub sample sources for desktop testing
//!
//! These sources run without audio hardware so the metering pipeline can be
//! exercised deterministically in tests and from the CLI.
//!
//! - [`SyntheticSource`] generates a continuous sine (plus optional seeded
//!   noise) at a configurable level and stereo balance.
//! - [`ScriptedSource`] replays a fixed list of frames and records its
//!   lifecycle so tests can assert that acquisition and release happened.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::source::{SampleFrame, SampleSource};
use crate::error::AudioError;

/// Signal parameters for [`SyntheticSource`]
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSignal {
    pub frequency_hz: f32,
    /// Peak amplitude of the sine, linear
    pub amplitude: f32,
    /// Peak amplitude of uniform noise added on top, linear
    pub noise_amplitude: f32,
    /// Right channel gain relative to left; `None` produces mono frames
    pub right_gain: Option<f32>,
}

impl Default for SyntheticSignal {
    fn default() -> Self {
        Self {
            frequency_hz: 1000.0,
            amplitude: 0.5,
            noise_amplitude: 0.0,
            right_gain: Some(1.0),
        }
    }
}

/// Continuous sine generator standing in for a microphone
pub struct SyntheticSource {
    signal: SyntheticSignal,
    sample_rate: u32,
    window_size: usize,
    phase: f32,
    rng: StdRng,
    acquired: bool,
    refuse_acquire: bool,
}

impl SyntheticSource {
    pub fn new(signal: SyntheticSignal, sample_rate: u32, window_size: usize) -> Self {
        Self {
            signal,
            sample_rate: sample_rate.max(1),
            window_size: window_size.max(1),
            phase: 0.0,
            rng: StdRng::seed_from_u64(0x0F0E),
            acquired: false,
            refuse_acquire: false,
        }
    }

    /// Simulate a denied microphone permission on `acquire`
    pub fn refusing(mut self) -> Self {
        self.refuse_acquire = true;
        self
    }

    /// Change the signal while running (e.g. raise the level mid-session)
    pub fn set_signal(&mut self, signal: SyntheticSignal) {
        self.signal = signal;
    }

    fn next_sample(&mut self) -> f32 {
        let step = 2.0 * std::f32::consts::PI * self.signal.frequency_hz / self.sample_rate as f32;
        let mut value = self.signal.amplitude * self.phase.sin();
        self.phase = (self.phase + step) % (2.0 * std::f32::consts::PI);
        if self.signal.noise_amplitude > 0.0 {
            value += self
                .rng
                .gen_range(-self.signal.noise_amplitude..=self.signal.noise_amplitude);
        }
        value.clamp(-1.0, 1.0)
    }
}

impl SampleSource for SyntheticSource {
    fn acquire(&mut self) -> Result<(), AudioError> {
        if self.refuse_acquire {
            return Err(AudioError::PermissionDenied);
        }
        if self.acquired {
            return Err(AudioError::AlreadyRunning);
        }
        self.acquired = true;
        self.phase = 0.0;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<SampleFrame, AudioError> {
        if !self.acquired {
            return Err(AudioError::NotRunning);
        }
        let left: Vec<f32> = (0..self.window_size).map(|_| self.next_sample()).collect();
        Ok(match self.signal.right_gain {
            Some(gain) => {
                let right = left.iter().map(|v| (v * gain).clamp(-1.0, 1.0)).collect();
                SampleFrame::from_pair(left, right)
            }
            None => SampleFrame::mono(left),
        })
    }

    fn release(&mut self) {
        self.acquired = false;
    }

    fn is_acquired(&self) -> bool {
        self.acquired
    }
}

/// Shared view of a [`ScriptedSource`]'s lifecycle
#[derive(Debug, Clone, Default)]
pub struct SourceProbe {
    acquired: Arc<AtomicBool>,
    acquire_calls: Arc<AtomicUsize>,
    release_calls: Arc<AtomicUsize>,
    reads: Arc<AtomicUsize>,
}

impl SourceProbe {
    pub fn is_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn acquire_calls(&self) -> usize {
        self.acquire_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// Replays a fixed sequence of frames
///
/// Once the script runs out, `read_frame` returns
/// `AudioError::SourceExhausted`, or repeats the last frame when built with
/// [`ScriptedSource::repeat_last`].
#[derive(Debug, Default)]
pub struct ScriptedSource {
    frames: VecDeque<SampleFrame>,
    last: Option<SampleFrame>,
    repeat_last: bool,
    refusal: Option<AudioError>,
    probe: SourceProbe,
}

impl ScriptedSource {
    pub fn new(frames: impl IntoIterator<Item = SampleFrame>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Constant-level mono frames, one per amplitude
    pub fn from_levels(levels: &[f32], window_size: usize) -> Self {
        Self::new(
            levels
                .iter()
                .map(|&level| SampleFrame::mono(vec![level; window_size])),
        )
    }

    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Fail every `acquire` with `err`
    pub fn refusing(mut self, err: AudioError) -> Self {
        self.refusal = Some(err);
        self
    }

    pub fn push(&mut self, frame: SampleFrame) {
        self.frames.push_back(frame);
    }

    pub fn probe(&self) -> SourceProbe {
        self.probe.clone()
    }
}

impl SampleSource for ScriptedSource {
    fn acquire(&mut self) -> Result<(), AudioError> {
        self.probe.acquire_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.refusal {
            return Err(err.clone());
        }
        self.probe.acquired.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<SampleFrame, AudioError> {
        if !self.is_acquired() {
            return Err(AudioError::NotRunning);
        }
        self.probe.reads.fetch_add(1, Ordering::SeqCst);
        match self.frames.pop_front() {
            Some(frame) => {
                self.last = Some(frame.clone());
                Ok(frame)
            }
            None if self.repeat_last => self.last.clone().ok_or(AudioError::SourceExhausted),
            None => Err(AudioError::SourceExhausted),
        }
    }

    fn release(&mut self) {
        if self.probe.acquired.swap(false, Ordering::SeqCst) {
            self.probe.release_calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_acquired(&self) -> bool {
        self.probe.is_acquired()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{amplitude_to_db, rms};

    #[test]
    fn test_synthetic_level_matches_amplitude() {
        let mut source = SyntheticSource::new(SyntheticSignal::default(), 48000, 4800);
        source.acquire().unwrap();
        let frame = source.read_frame().unwrap();
        let level = amplitude_to_db(rms(&frame.mono).unwrap());
        // 0.5 peak sine -> -6.02 dB peak, -9.03 dB RMS
        assert!((level - (-9.03)).abs() < 0.1, "got {}", level);
    }

    #[test]
    fn test_synthetic_refusal() {
        let mut source = SyntheticSource::new(SyntheticSignal::default(), 48000, 256).refusing();
        assert_eq!(source.acquire(), Err(AudioError::PermissionDenied));
        assert!(!source.is_acquired());
    }

    #[test]
    fn test_synthetic_mono_and_inverted() {
        let signal = SyntheticSignal {
            right_gain: None,
            ..SyntheticSignal::default()
        };
        let mut source = SyntheticSource::new(signal, 48000, 256);
        source.acquire().unwrap();
        assert!(!source.read_frame().unwrap().is_stereo());

        source.set_signal(SyntheticSignal {
            right_gain: Some(-1.0),
            ..SyntheticSignal::default()
        });
        let frame = source.read_frame().unwrap();
        let (left, right) = frame.stereo.unwrap();
        assert_eq!(left[10], -right[10]);
    }

    #[test]
    fn test_scripted_source_lifecycle() {
        let mut source = ScriptedSource::from_levels(&[0.1, 0.2], 8);
        let probe = source.probe();
        assert_eq!(source.read_frame(), Err(AudioError::NotRunning));

        source.acquire().unwrap();
        assert!(probe.is_acquired());
        assert_eq!(source.read_frame().unwrap().mono[0], 0.1);
        assert_eq!(source.read_frame().unwrap().mono[0], 0.2);
        assert_eq!(source.read_frame(), Err(AudioError::SourceExhausted));

        source.release();
        source.release();
        assert_eq!(probe.release_calls(), 1);
        assert_eq!(probe.reads(), 3);
    }

    #[test]
    fn test_scripted_repeat_last() {
        let mut source = ScriptedSource::from_levels(&[0.3], 4).repeat_last();
        source.acquire().unwrap();
        for _ in 0..3 {
            assert_eq!(source.read_frame().unwrap().mono, vec![0.3; 4]);
        }
    }
}
