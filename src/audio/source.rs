//! Sample source abstraction consumed by the session controller.

use crate::error::AudioError;

/// One tick's worth of normalized samples
///
/// `mono` is always present. `stereo` carries the left/right pair when the
/// source captures two channels; correlation and per-channel levels are
/// only computed when it is set.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SampleFrame {
    pub mono: Vec<f32>,
    pub stereo: Option<(Vec<f32>, Vec<f32>)>,
}

impl SampleFrame {
    pub fn mono(samples: Vec<f32>) -> Self {
        Self {
            mono: samples,
            stereo: None,
        }
    }

    pub fn stereo(mono: Vec<f32>, left: Vec<f32>, right: Vec<f32>) -> Self {
        Self {
            mono,
            stereo: Some((left, right)),
        }
    }

    /// Build a frame from a left/right pair, deriving mono as their average
    pub fn from_pair(left: Vec<f32>, right: Vec<f32>) -> Self {
        let mono = left
            .iter()
            .zip(&right)
            .map(|(l, r)| (l + r) * 0.5)
            .collect();
        Self::stereo(mono, left, right)
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo.is_some()
    }
}

/// Trait implemented by anything that can feed the meter
///
/// A source is acquired once when metering starts and released when it
/// stops. Between the two, `read_frame` returns the most recent samples
/// since the previous call; buffer length stays constant for the lifetime
/// of one acquisition.
pub trait SampleSource {
    /// Open the underlying device or file
    fn acquire(&mut self) -> Result<(), AudioError>;

    /// Most recent frame since the previous read
    fn read_frame(&mut self) -> Result<SampleFrame, AudioError>;

    /// Release the underlying device or file; must be idempotent
    fn release(&mut self);

    fn is_acquired(&self) -> bool;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn acquire(&mut self) -> Result<(), AudioError> {
        (**self).acquire()
    }

    fn read_frame(&mut self) -> Result<SampleFrame, AudioError> {
        (**self).read_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn is_acquired(&self) -> bool {
        (**self).is_acquired()
    }
}
