//! Angular and radial coordinate ranges on the iris chart

use serde::{Deserialize, Serialize};
use std::fmt;

/// Span on the 60-minute clock face, inclusive on both ends.
///
/// Minute 0 is 12 o'clock and minutes increase clockwise. A range coming from
/// the model may be backwards (`start > end`) when the arc crosses 12 o'clock,
/// or may have endpoints outside the clock entirely; [`RangeNormalizer`]
/// turns it into canonical form.
///
/// Serialized as a two-element array, `[start, end]`.
///
/// [`RangeNormalizer`]: super::RangeNormalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MinuteRange(pub i32, pub i32);

impl MinuteRange {
    pub fn new(start: i32, end: i32) -> Self {
        Self(start, end)
    }

    pub fn start(&self) -> i32 {
        self.0
    }

    pub fn end(&self) -> i32 {
        self.1
    }

    /// True when both endpoints lie on a clock of `mins` units and the range
    /// does not cross the origin.
    pub fn is_canonical(&self, mins: i32) -> bool {
        let on_clock = |m: i32| (0..mins).contains(&m);
        on_clock(self.0) && on_clock(self.1) && self.0 <= self.1
    }

    /// Number of minutes covered. Only meaningful for canonical ranges.
    pub fn span(&self) -> i32 {
        self.1 - self.0 + 1
    }

    pub fn contains(&self, minute: i32) -> bool {
        self.0 <= minute && minute <= self.1
    }
}

impl fmt::Display for MinuteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

/// Radial band from the pupil edge (ring 0) outward to the iris edge.
///
/// Rings never wrap. Serialized as `[inner, outer]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RingRange(pub i32, pub i32);

impl RingRange {
    pub fn new(inner: i32, outer: i32) -> Self {
        Self(inner, outer)
    }

    pub fn inner(&self) -> i32 {
        self.0
    }

    pub fn outer(&self) -> i32 {
        self.1
    }

    pub fn contains(&self, ring: i32) -> bool {
        self.0 <= ring && ring <= self.1
    }

    pub fn overlaps(&self, other: &RingRange) -> bool {
        self.0 <= other.1 && other.0 <= self.1
    }
}

impl fmt::Display for RingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_range_serializes_as_pair() {
        let range = MinuteRange::new(58, 2);
        assert_eq!(serde_json::to_string(&range).unwrap(), "[58,2]");

        let parsed: MinuteRange = serde_json::from_str("[5, 10]").unwrap();
        assert_eq!(parsed, MinuteRange(5, 10));
    }

    #[test]
    fn test_is_canonical() {
        assert!(MinuteRange(5, 10).is_canonical(60));
        assert!(MinuteRange(0, 59).is_canonical(60));
        assert!(!MinuteRange(58, 2).is_canonical(60));
        assert!(!MinuteRange(-2, 4).is_canonical(60));
        assert!(!MinuteRange(10, 60).is_canonical(60));
    }

    #[test]
    fn test_ring_overlap() {
        let inner = RingRange(0, 3);
        assert!(inner.overlaps(&RingRange(3, 5)));
        assert!(!inner.overlaps(&RingRange(4, 11)));
        assert!(inner.contains(2));
    }

    #[test]
    fn test_display() {
        assert_eq!(MinuteRange(59, 59).to_string(), "[59, 59]");
        assert_eq!(RingRange(0, 11).to_string(), "[0, 11]");
    }
}
