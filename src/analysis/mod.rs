// Analysis module - level metrics and rolling statistics
//
// This module provides two layers:
// 1. levels: stateless per-buffer metrics (RMS, peak, dB, correlation)
// 2. rolling: per-session statistics updated once per tick
//
// The session controller calls `levels::analyze_frame` on every tick and
// feeds the resulting snapshot into `rolling::MeterStatistics`.

pub mod levels;
pub mod rolling;

pub use levels::{
    amplitude_to_db, analyze_frame, correlation, decode_u8_centered, format_db, peak, rms,
    MetricsSnapshot, SILENCE_DB,
};
pub use rolling::{CrestFactor, MeterStatistics, PeakHoldState, RollingHistory, SessionStats};
