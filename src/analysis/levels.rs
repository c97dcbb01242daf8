// Levels module - per-buffer level metrics
//
// Pure functions that turn a buffer of normalized samples into RMS, peak,
// decibel and stereo correlation figures. Nothing here keeps state between
// calls; the rolling statistics live in `rolling`.
//
// Numeric edge cases never surface as errors: log of zero maps to the
// silence sentinel (negative infinity) and a zero correlation denominator
// maps to 0. The only error is an empty buffer, which is a caller bug.

use crate::audio::SampleFrame;
use crate::error::AudioError;

/// Silence sentinel for decibel values
pub const SILENCE_DB: f32 = f32::NEG_INFINITY;

/// Readings below this are displayed as silence
pub const DISPLAY_FLOOR_DB: f32 = -100.0;

/// Metrics derived from one tick's sample frame
///
/// `true_peak_db` is kept for display compatibility and always equals
/// `peak_db`; no oversampling is performed.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// Linear RMS amplitude of the mono buffer
    pub rms: f32,
    /// Linear peak amplitude of the mono buffer
    pub peak: f32,
    pub rms_db: f32,
    pub peak_db: f32,
    pub true_peak_db: f32,
    pub rms_db_left: f32,
    pub rms_db_right: f32,
    pub peak_db_left: f32,
    pub peak_db_right: f32,
    /// Pearson correlation of left/right, 0 without a stereo pair
    pub correlation: f32,
}

impl MetricsSnapshot {
    /// Snapshot representing digital silence on every channel
    pub fn silent() -> Self {
        Self {
            rms: 0.0,
            peak: 0.0,
            rms_db: SILENCE_DB,
            peak_db: SILENCE_DB,
            true_peak_db: SILENCE_DB,
            rms_db_left: SILENCE_DB,
            rms_db_right: SILENCE_DB,
            peak_db_left: SILENCE_DB,
            peak_db_right: SILENCE_DB,
            correlation: 0.0,
        }
    }
}

/// Compute root-mean-square amplitude
///
/// Formula: RMS = sqrt((1/N) × Σ x[n]²)
///
/// # Errors
/// `AudioError::EmptyBuffer` if `buffer` has no samples
pub fn rms(buffer: &[f32]) -> Result<f32, AudioError> {
    if buffer.is_empty() {
        return Err(AudioError::EmptyBuffer);
    }
    let sum_squares: f64 = buffer.iter().map(|&x| (x as f64) * (x as f64)).sum();
    Ok((sum_squares / buffer.len() as f64).sqrt() as f32)
}

/// Compute maximum absolute sample value
///
/// # Errors
/// `AudioError::EmptyBuffer` if `buffer` has no samples
pub fn peak(buffer: &[f32]) -> Result<f32, AudioError> {
    if buffer.is_empty() {
        return Err(AudioError::EmptyBuffer);
    }
    Ok(buffer.iter().map(|&x| x.abs()).fold(0.0f32, f32::max))
}

/// Convert a linear amplitude to dBFS
///
/// Zero (or negative) amplitude maps to [`SILENCE_DB`].
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        return SILENCE_DB;
    }
    20.0 * amplitude.log10()
}

/// Pearson correlation between two channels
///
/// Computed over the overlapping prefix `n = min(len(left), len(right))`:
///
/// numerator   = nΣlr − ΣlΣr
/// denominator = sqrt((nΣl² − (Σl)²)(nΣr² − (Σr)²))
///
/// Returns 0 when the denominator vanishes (silent or DC-only input).
pub fn correlation(left: &[f32], right: &[f32]) -> f32 {
    let n = left.len().min(right.len());
    if n == 0 {
        return 0.0;
    }

    let (mut sum_l, mut sum_r, mut sum_lr, mut sum_l2, mut sum_r2) = (0.0, 0.0, 0.0, 0.0, 0.0);
    for (&l, &r) in left[..n].iter().zip(&right[..n]) {
        let (l, r) = (l as f64, r as f64);
        sum_l += l;
        sum_r += r;
        sum_lr += l * r;
        sum_l2 += l * l;
        sum_r2 += r * r;
    }

    let n = n as f64;
    let numerator = n * sum_lr - sum_l * sum_r;
    let variance_l = n * sum_l2 - sum_l * sum_l;
    let variance_r = n * sum_r2 - sum_r * sum_r;
    let denominator = (variance_l * variance_r).sqrt();

    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (numerator / denominator).clamp(-1.0, 1.0) as f32
}

/// Decode 8-bit centered samples (128 = zero crossing) to normalized floats
pub fn decode_u8_centered(bytes: &[u8]) -> Vec<f32> {
    bytes.iter().map(|&b| (b as f32 - 128.0) / 128.0).collect()
}

/// Render a dB value for display
///
/// Silence and anything below -100 dB render as "-∞"; everything else
/// with one decimal place.
pub fn format_db(db: f32) -> String {
    if db.is_nan() || db < DISPLAY_FLOOR_DB {
        return "-∞".to_string();
    }
    format!("{:.1}", db)
}

/// Compute every per-tick metric for a frame
///
/// # Errors
/// `AudioError::EmptyBuffer` if the mono buffer, or either stereo buffer,
/// is empty
pub fn analyze_frame(frame: &SampleFrame) -> Result<MetricsSnapshot, AudioError> {
    let rms_amp = rms(&frame.mono)?;
    let peak_amp = peak(&frame.mono)?;
    let peak_db = amplitude_to_db(peak_amp);

    let mut snapshot = MetricsSnapshot {
        rms: rms_amp,
        peak: peak_amp,
        rms_db: amplitude_to_db(rms_amp),
        peak_db,
        true_peak_db: peak_db,
        ..MetricsSnapshot::silent()
    };

    if let Some((left, right)) = &frame.stereo {
        snapshot.rms_db_left = amplitude_to_db(rms(left)?);
        snapshot.rms_db_right = amplitude_to_db(rms(right)?);
        snapshot.peak_db_left = amplitude_to_db(peak(left)?);
        snapshot.peak_db_right = amplitude_to_db(peak(right)?);
        snapshot.correlation = correlation(left, right);
    }

    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(len: usize, cycles: f32, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude * (2.0 * std::f32::consts::PI * cycles * i as f32 / len as f32).sin()
            })
            .collect()
    }

    #[test]
    fn test_silence_is_zero_and_sentinel() {
        let silence = vec![0.0f32; 512];
        assert_eq!(rms(&silence).unwrap(), 0.0);
        assert_eq!(peak(&silence).unwrap(), 0.0);
        assert_eq!(amplitude_to_db(0.0), f32::NEG_INFINITY);
    }

    #[test]
    fn test_full_scale_is_zero_db() {
        let full = vec![1.0f32; 256];
        assert_eq!(rms(&full).unwrap(), 1.0);
        assert_eq!(amplitude_to_db(1.0), 0.0);
    }

    #[test]
    fn test_empty_buffer_is_an_error() {
        assert_eq!(rms(&[]), Err(AudioError::EmptyBuffer));
        assert_eq!(peak(&[]), Err(AudioError::EmptyBuffer));
    }

    #[test]
    fn test_sine_rms_is_minus_three_db() {
        let wave = sine(4800, 10.0, 1.0);
        let rms_db = amplitude_to_db(rms(&wave).unwrap());
        assert!((rms_db - (-3.0103)).abs() < 0.01, "got {}", rms_db);
    }

    #[test]
    fn test_peak_uses_absolute_value() {
        let buffer = [0.1, -0.8, 0.5];
        assert_eq!(peak(&buffer).unwrap(), 0.8);
    }

    #[test]
    fn test_half_amplitude_db() {
        assert!((amplitude_to_db(0.5) - (-6.0206)).abs() < 0.001);
    }

    #[test]
    fn test_correlation_identical_and_inverted() {
        let x = sine(1024, 7.0, 0.6);
        let inverted: Vec<f32> = x.iter().map(|v| -v).collect();
        assert!((correlation(&x, &x) - 1.0).abs() < 1e-6);
        assert!((correlation(&x, &inverted) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_correlation_silent_or_dc_is_zero() {
        let silence = vec![0.0f32; 64];
        let dc = vec![0.3f32; 64];
        let x = sine(64, 2.0, 0.5);
        assert_eq!(correlation(&silence, &silence), 0.0);
        assert_eq!(correlation(&dc, &x), 0.0);
        assert_eq!(correlation(&[], &x), 0.0);
    }

    #[test]
    fn test_correlation_uses_overlapping_prefix() {
        let x = sine(256, 3.0, 0.5);
        let mut longer = x.clone();
        longer.extend(vec![0.9f32; 100]);
        assert!((correlation(&x, &longer) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_decode_u8_centered() {
        let decoded = decode_u8_centered(&[128, 0, 255, 192]);
        assert_eq!(decoded[0], 0.0);
        assert_eq!(decoded[1], -1.0);
        assert!((decoded[2] - 0.9921875).abs() < 1e-7);
        assert_eq!(decoded[3], 0.5);
    }

    #[test]
    fn test_format_db() {
        assert_eq!(format_db(f32::NEG_INFINITY), "-∞");
        assert_eq!(format_db(-100.5), "-∞");
        assert_eq!(format_db(-100.0), "-100.0");
        assert_eq!(format_db(-12.345), "-12.3");
        assert_eq!(format_db(0.0), "0.0");
    }

    #[test]
    fn test_analyze_mono_frame() {
        let frame = SampleFrame::mono(vec![0.5; 128]);
        let snapshot = analyze_frame(&frame).unwrap();
        assert!((snapshot.rms_db - (-6.0206)).abs() < 0.001);
        assert_eq!(snapshot.peak_db, snapshot.true_peak_db);
        assert_eq!(snapshot.rms_db_left, SILENCE_DB);
        assert_eq!(snapshot.correlation, 0.0);
    }

    #[test]
    fn test_analyze_stereo_frame() {
        let left = sine(512, 4.0, 1.0);
        let right: Vec<f32> = left.iter().map(|v| v * 0.5).collect();
        let mono: Vec<f32> = left.iter().zip(&right).map(|(l, r)| (l + r) / 2.0).collect();
        let frame = SampleFrame::stereo(mono, left, right);
        let snapshot = analyze_frame(&frame).unwrap();

        assert!((snapshot.peak_db_left - snapshot.peak_db_right - 6.0206).abs() < 0.01);
        assert!((snapshot.rms_db_left - snapshot.rms_db_right - 6.0206).abs() < 0.01);
        assert!((snapshot.correlation - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_analyze_empty_frame_fails() {
        let frame = SampleFrame::mono(Vec::new());
        assert_eq!(analyze_frame(&frame), Err(AudioError::EmptyBuffer));
    }
}
