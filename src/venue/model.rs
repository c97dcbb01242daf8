// Venue model - console-to-audience level compensation
//
// Converts the physical placement of the mixing position (distance and
// elevation from the audience reference point) into a level offset, and
// judges predicted audience loudness against a genre's target SPL band.
//
// The offset is a linear heuristic (0.2 dB per metre of straight-line
// distance), not an inverse-square-law computation. It matches the
// preset values engineers are taught and must stay bit-for-bit stable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// dB of offset per metre of straight-line distance
pub const OFFSET_DB_PER_METER: f32 = 0.2;

/// SPL assumed for a 0 dBFS console reading
pub const SPL_REFERENCE_DB: f32 = 100.0;

/// Estimate the console-to-audience offset from placement
///
/// Formula: offset = sqrt(distance² + elevation²) × 0.2
pub fn estimate_offset(distance_m: f32, elevation_m: f32) -> f32 {
    (distance_m * distance_m + elevation_m * elevation_m).sqrt() * OFFSET_DB_PER_METER
}

/// Predicted level at the audience position
pub fn predict_audience_level(console_db: f32, offset_db: f32) -> f32 {
    console_db + offset_db
}

/// Rough SPL estimate assuming 0 dBFS ≈ 100 dB SPL
///
/// Only used to compare against target zones; not an authoritative SPL.
pub fn estimate_spl_from_dbfs(dbfs: f32) -> f32 {
    SPL_REFERENCE_DB + dbfs
}

/// Whether the predicted audience SPL falls inside `[zone_min, zone_max]`
pub fn is_within_target_zone(
    console_db: f32,
    offset_db: f32,
    zone_min: f32,
    zone_max: f32,
) -> bool {
    let spl = estimate_spl_from_dbfs(predict_audience_level(console_db, offset_db));
    spl >= zone_min && spl <= zone_max
}

/// Venue size derived from console distance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenueType {
    Small,
    Medium,
    Large,
}

impl VenueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VenueType::Small => "small",
            VenueType::Medium => "medium",
            VenueType::Large => "large",
        }
    }
}

impl fmt::Display for VenueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a venue: under 15 m small, under 25 m medium, otherwise large
pub fn classify_venue_type(distance_m: f32) -> VenueType {
    if distance_m < 15.0 {
        VenueType::Small
    } else if distance_m < 25.0 {
        VenueType::Medium
    } else {
        VenueType::Large
    }
}

/// Live console placement relative to the audience reference point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VenuePlacement {
    pub distance_m: f32,
    pub elevation_m: f32,
}

impl VenuePlacement {
    pub fn new(distance_m: f32, elevation_m: f32) -> Self {
        Self {
            distance_m,
            elevation_m,
        }
    }

    pub fn estimated_offset(&self) -> f32 {
        estimate_offset(self.distance_m, self.elevation_m)
    }

    pub fn venue_type(&self) -> VenueType {
        classify_venue_type(self.distance_m)
    }
}

impl Default for VenuePlacement {
    fn default() -> Self {
        VenuePreset::Medium.placement()
    }
}

/// Named placements that skip measuring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VenuePreset {
    Small,
    Medium,
    Large,
}

impl VenuePreset {
    pub const ALL: [VenuePreset; 3] = [VenuePreset::Small, VenuePreset::Medium, VenuePreset::Large];

    pub fn placement(&self) -> VenuePlacement {
        match self {
            VenuePreset::Small => VenuePlacement::new(10.0, 1.0),
            VenuePreset::Medium => VenuePlacement::new(20.0, 1.5),
            VenuePreset::Large => VenuePlacement::new(35.0, 3.0),
        }
    }

    /// Rounded offset engineers use for this venue size
    pub fn offset_db(&self) -> f32 {
        match self {
            VenuePreset::Small => 2.0,
            VenuePreset::Medium => 4.0,
            VenuePreset::Large => 7.0,
        }
    }
}

impl FromStr for VenuePreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" => Ok(VenuePreset::Small),
            "medium" => Ok(VenuePreset::Medium),
            "large" => Ok(VenuePreset::Large),
            other => Err(format!("unknown venue preset '{}'", other)),
        }
    }
}

/// Genre-specific acceptable SPL band at the audience position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetZone {
    #[default]
    Worship,
    Rock,
    Pop,
    Classical,
}

impl TargetZone {
    pub const ALL: [TargetZone; 4] = [
        TargetZone::Worship,
        TargetZone::Rock,
        TargetZone::Pop,
        TargetZone::Classical,
    ];

    /// Inclusive SPL band `(min, max)` in dB SPL
    pub fn range(&self) -> (f32, f32) {
        match self {
            TargetZone::Worship => (85.0, 95.0),
            TargetZone::Rock => (100.0, 105.0),
            TargetZone::Pop => (95.0, 100.0),
            TargetZone::Classical => (75.0, 85.0),
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            TargetZone::Worship => "worship",
            TargetZone::Rock => "rock",
            TargetZone::Pop => "pop",
            TargetZone::Classical => "classical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TargetZone::Worship => "Worship",
            TargetZone::Rock => "Rock Concert",
            TargetZone::Pop => "Pop Concert",
            TargetZone::Classical => "Classical",
        }
    }

    pub fn contains(&self, console_db: f32, offset_db: f32) -> bool {
        let (min, max) = self.range();
        is_within_target_zone(console_db, offset_db, min, max)
    }
}

impl FromStr for TargetZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetZone::ALL
            .into_iter()
            .find(|zone| zone.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown target zone '{}'", s))
    }
}

impl fmt::Display for TargetZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min, max) = self.range();
        write!(f, "{} ({:.0}-{:.0} dB SPL)", self.label(), min, max)
    }
}
