// Audio module - sample sources feeding the meter

pub mod capture;
pub mod engine_cpal;
pub mod source;
pub mod stubs;
pub mod wav;

// Re-export commonly used types for convenience
pub use capture::{capture_channel, CaptureConsumer, CaptureProducer, CaptureWindow};
pub use engine_cpal::CpalSource;
pub use source::{SampleFrame, SampleSource};
pub use stubs::{ScriptedSource, SourceProbe, SyntheticSignal, SyntheticSource};
pub use wav::WavFileSource;
