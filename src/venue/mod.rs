// Venue module - FOH compensation model and saved venue profiles
//
// 1. model: placement-to-offset heuristic, SPL estimate, target zones, presets
// 2. profiles: named placements persisted through the key-value store

pub mod model;
pub mod profiles;

pub use model::{
    classify_venue_type, estimate_offset, estimate_spl_from_dbfs, is_within_target_zone,
    predict_audience_level, TargetZone, VenuePlacement, VenuePreset, VenueType,
};
pub use profiles::{ProfileStore, VenueProfile};
