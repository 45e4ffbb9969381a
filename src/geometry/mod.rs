//! Iris chart geometry: clock-face minute ranges, radial ring ranges, the
//! calibrated geo reference and the normalizer that makes ranges canonical.

mod finding;
mod normalizer;
mod range;
mod reference;

pub use finding::Finding;
pub use normalizer::{GeometryError, RangeNormalizer};
pub use range::{MinuteRange, RingRange};
pub use reference::{
    GeoReference, SubBand, DEFAULT_DEG_PER_MIN, DEFAULT_MINS, DEFAULT_REF_MINUTE, DEFAULT_RINGS,
};
