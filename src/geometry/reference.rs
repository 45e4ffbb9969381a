//! Geometry reference produced by geo-calibration

use super::range::RingRange;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_MINS: i32 = 60;
pub const DEFAULT_RINGS: i32 = 12;
pub const DEFAULT_DEG_PER_MIN: i32 = 6;
/// Minute of the horizontal reference ray (3 o'clock).
pub const DEFAULT_REF_MINUTE: i32 = 15;

/// Named radial sub-bands of the iris chart, pupil outward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubBand {
    /// Inner pupillary border
    Ipb,
    /// Stomach zone
    Stom,
    /// Autonomic nerve wreath (collarette)
    Anw,
    /// Organ zone
    Org,
    /// Lymphatic zone
    Lym,
    /// Skin/scurf rim
    Scu,
}

impl SubBand {
    pub const ALL: [SubBand; 6] = [
        SubBand::Ipb,
        SubBand::Stom,
        SubBand::Anw,
        SubBand::Org,
        SubBand::Lym,
        SubBand::Scu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubBand::Ipb => "IPB",
            SubBand::Stom => "STOM",
            SubBand::Anw => "ANW",
            SubBand::Org => "ORG",
            SubBand::Lym => "LYM",
            SubBand::Scu => "SCU",
        }
    }
}

impl fmt::Display for SubBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed chart constants plus the sub-band layout of one calibrated image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoReference {
    pub mins: i32,
    pub rings: i32,
    pub deg_per_min: i32,
    pub ref_minute: i32,
    #[serde(default)]
    pub ring_groups: BTreeMap<SubBand, RingRange>,
}

impl GeoReference {
    /// The standard 60x12 chart with the conventional sub-band split.
    pub fn standard() -> Self {
        let ring_groups = BTreeMap::from([
            (SubBand::Ipb, RingRange(0, 0)),
            (SubBand::Stom, RingRange(1, 2)),
            (SubBand::Anw, RingRange(3, 3)),
            (SubBand::Org, RingRange(4, 8)),
            (SubBand::Lym, RingRange(9, 10)),
            (SubBand::Scu, RingRange(11, 11)),
        ]);

        Self {
            mins: DEFAULT_MINS,
            rings: DEFAULT_RINGS,
            deg_per_min: DEFAULT_DEG_PER_MIN,
            ref_minute: DEFAULT_REF_MINUTE,
            ring_groups,
        }
    }

    /// Sub-band whose ring range contains `ring`, if any.
    pub fn sub_band_for_ring(&self, ring: i32) -> Option<SubBand> {
        self.ring_groups
            .iter()
            .find(|(_, range)| range.contains(ring))
            .map(|(band, _)| *band)
    }
}

impl Default for GeoReference {
    fn default() -> Self {
        Self::standard()
    }
}
