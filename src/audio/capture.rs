// Capture - lock-free hand-off from the device callback to the meter tick
//
// The device callback runs on a real-time thread and must not allocate or
// lock. It pushes stereo frames into an SPSC ring buffer (rtrb). On each
// tick the meter drains the ring into a fixed-length sliding window and
// reads the window as a `SampleFrame`.
//
// Buffer flow:
// 1. Audio thread pushes [left, right] frames into the producer
// 2. Tick drains the consumer into `CaptureWindow`
// 3. Window yields the latest `window_size` samples per channel

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::{FromSample, Sample};
use rtrb::{Consumer, Producer, RingBuffer};

use super::source::SampleFrame;

/// One interleaved stereo sample pair
pub type StereoSample = [f32; 2];

/// Producer half handed to the audio callback
pub struct CaptureProducer {
    producer: Producer<StereoSample>,
    overruns: Arc<AtomicU64>,
}

impl CaptureProducer {
    /// Push a frame; counts an overrun instead of blocking when full
    pub fn push(&mut self, sample: StereoSample) {
        if self.producer.push(sample).is_err() {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Push interleaved device data with `channels` samples per frame
    ///
    /// Samples are converted to f32. Mono input is duplicated to both
    /// sides; channels beyond the second are ignored.
    pub fn push_interleaved<T>(&mut self, data: &[T], channels: usize)
    where
        T: Sample,
        f32: FromSample<T>,
    {
        let channels = channels.max(1);
        for frame in data.chunks(channels) {
            let left = frame.first().map_or(0.0, |s| s.to_sample::<f32>());
            let right = frame.get(1).map_or(left, |s| s.to_sample::<f32>());
            self.push([left, right]);
        }
    }
}

/// Consumer half kept by the tick side
pub struct CaptureConsumer {
    consumer: Consumer<StereoSample>,
    overruns: Arc<AtomicU64>,
}

impl CaptureConsumer {
    /// Move everything currently queued into `window`
    pub fn drain_into(&mut self, window: &mut CaptureWindow) -> usize {
        let mut drained = 0;
        while let Ok([left, right]) = self.consumer.pop() {
            window.push(left, right);
            drained += 1;
        }
        drained
    }

    /// Frames dropped because the tick fell behind the callback
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

/// Create a connected producer/consumer pair holding `capacity` frames
pub fn capture_channel(capacity: usize) -> (CaptureProducer, CaptureConsumer) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    let overruns = Arc::new(AtomicU64::new(0));
    (
        CaptureProducer {
            producer,
            overruns: Arc::clone(&overruns),
        },
        CaptureConsumer { consumer, overruns },
    )
}

/// Sliding window of the latest samples per channel
///
/// Prefilled with silence so every frame has the same length from the
/// first tick on.
#[derive(Debug, Clone)]
pub struct CaptureWindow {
    left: VecDeque<f32>,
    right: VecDeque<f32>,
    window_size: usize,
    stereo: bool,
}

impl CaptureWindow {
    pub fn new(window_size: usize, stereo: bool) -> Self {
        let window_size = window_size.max(1);
        Self {
            left: VecDeque::from(vec![0.0; window_size]),
            right: VecDeque::from(vec![0.0; window_size]),
            window_size,
            stereo,
        }
    }

    pub fn push(&mut self, left: f32, right: f32) {
        self.left.push_back(left);
        self.right.push_back(right);
        if self.left.len() > self.window_size {
            self.left.pop_front();
            self.right.pop_front();
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn frame(&self) -> SampleFrame {
        let left: Vec<f32> = self.left.iter().copied().collect();
        if self.stereo {
            let right: Vec<f32> = self.right.iter().copied().collect();
            SampleFrame::from_pair(left, right)
        } else {
            SampleFrame::mono(left)
        }
    }
}
