//! Canonicalization of minute and ring ranges
//!
//! Model output may describe an arc that crosses 12 o'clock as a backwards
//! range, or may drift outside the chart. Everything after consistency merge
//! works on plain ascending ranges, so findings are normalized once, right
//! after detection.

use super::finding::Finding;
use super::range::{MinuteRange, RingRange};
use super::reference::GeoReference;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("Clock face needs at least one minute, got {0}")]
    InvalidMinutes(i32),

    #[error("Iris chart needs at least one ring, got {0}")]
    InvalidRings(i32),
}

/// Normalizer bound to one calibrated chart.
///
/// Built once per run from STEP1's geo reference and never replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeNormalizer {
    mins: i32,
    rings: i32,
}

impl RangeNormalizer {
    pub fn new(geo: &GeoReference) -> Result<Self, GeometryError> {
        if geo.mins <= 0 {
            return Err(GeometryError::InvalidMinutes(geo.mins));
        }
        if geo.rings <= 0 {
            return Err(GeometryError::InvalidRings(geo.rings));
        }

        Ok(Self {
            mins: geo.mins,
            rings: geo.rings,
        })
    }

    pub fn mins(&self) -> i32 {
        self.mins
    }

    pub fn rings(&self) -> i32 {
        self.rings
    }

    fn wrap_minute(&self, minute: i32) -> i32 {
        minute.rem_euclid(self.mins)
    }

    /// Wraps both endpoints onto the clock. A range crossing the origin is
    /// split into `[start, mins-1]` and `[0, end]`, in that order.
    pub fn normalize_minute_range(&self, range: MinuteRange) -> Vec<MinuteRange> {
        let start = self.wrap_minute(range.start());
        let end = self.wrap_minute(range.end());

        if start <= end {
            vec![MinuteRange(start, end)]
        } else {
            vec![MinuteRange(start, self.mins - 1), MinuteRange(0, end)]
        }
    }

    /// Clamps into `[0, rings-1]` and orders ascending. Rings never wrap.
    pub fn normalize_ring_range(&self, range: RingRange) -> RingRange {
        let clamp = |ring: i32| ring.clamp(0, self.rings - 1);
        let inner = clamp(range.inner());
        let outer = clamp(range.outer());

        if inner > outer {
            RingRange(outer, inner)
        } else {
            RingRange(inner, outer)
        }
    }

    /// One finding per canonical minute sub-range, all sharing the same
    /// normalized ring range.
    pub fn normalize_finding(&self, finding: &Finding) -> Vec<Finding> {
        let ring_range = self.normalize_ring_range(finding.ring_range);

        self.normalize_minute_range(finding.minute_range)
            .into_iter()
            .map(|minute_range| Finding {
                minute_range,
                ring_range,
                ..finding.clone()
            })
            .collect()
    }

    pub fn normalize_findings(&self, findings: &[Finding]) -> Vec<Finding> {
        findings
            .iter()
            .flat_map(|finding| self.normalize_finding(finding))
            .collect()
    }

    /// True when the finding needs no further normalization.
    pub fn is_normalized(&self, finding: &Finding) -> bool {
        finding.minute_range.is_canonical(self.mins)
            && self.normalize_ring_range(finding.ring_range) == finding.ring_range
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> RangeNormalizer {
        RangeNormalizer::new(&GeoReference::standard()).unwrap()
    }

    #[test]
    fn test_minute_range_crossing_origin_splits() {
        assert_eq!(
            normalizer().normalize_minute_range(MinuteRange(58, 2)),
            vec![MinuteRange(58, 59), MinuteRange(0, 2)]
        );
    }

    #[test]
    fn test_negative_minute_wraps() {
        assert_eq!(
            normalizer().normalize_minute_range(MinuteRange(-2, 4)),
            vec![MinuteRange(58, 59), MinuteRange(0, 4)]
        );
    }

    #[test]
    fn test_plain_minute_range_is_identity() {
        assert_eq!(
            normalizer().normalize_minute_range(MinuteRange(5, 10)),
            vec![MinuteRange(5, 10)]
        );
    }

    #[test]
    fn test_minute_overflow_wraps_without_split() {
        assert_eq!(
            normalizer().normalize_minute_range(MinuteRange(61, 70)),
            vec![MinuteRange(1, 10)]
        );
        assert_eq!(
            normalizer().normalize_minute_range(MinuteRange(-62, -58)),
            vec![MinuteRange(58, 59), MinuteRange(0, 2)]
        );
    }

    #[test]
    fn test_single_minute_at_origin() {
        assert_eq!(
            normalizer().normalize_minute_range(MinuteRange(60, 60)),
            vec![MinuteRange(0, 0)]
        );
    }

    #[test]
    fn test_ring_range_reordered() {
        assert_eq!(
            normalizer().normalize_ring_range(RingRange(10, 2)),
            RingRange(2, 10)
        );
    }

    #[test]
    fn test_ring_range_clamped() {
        assert_eq!(
            normalizer().normalize_ring_range(RingRange(20, -1)),
            RingRange(0, 11)
        );
    }

    #[test]
    fn test_wrapping_finding_splits_in_order() {
        let finding = Finding::new("lacuna", MinuteRange(59, 1), RingRange(11, 0))
            .with_severity("mild")
            .with_note("open lacuna")
            .with_confidence(0.8);

        let normalized = normalizer().normalize_finding(&finding);

        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].minute_range, MinuteRange(59, 59));
        assert_eq!(normalized[1].minute_range, MinuteRange(0, 1));
        for part in &normalized {
            assert_eq!(part.ring_range, RingRange(0, 11));
            assert_eq!(part.kind, "lacuna");
            assert_eq!(part.severity.as_deref(), Some("mild"));
            assert_eq!(part.note, "open lacuna");
            assert_eq!(part.confidence, 0.8);
        }
    }

    #[test]
    fn test_normalizing_normalized_finding_is_identity() {
        let finding = Finding::new("crypt", MinuteRange(12, 14), RingRange(3, 5));
        let n = normalizer();

        assert!(n.is_normalized(&finding));
        assert_eq!(n.normalize_finding(&finding), vec![finding]);
    }

    #[test]
    fn test_normalize_findings_preserves_order() {
        let findings = vec![
            Finding::new("a", MinuteRange(58, 1), RingRange(2, 2)),
            Finding::new("b", MinuteRange(30, 31), RingRange(4, 4)),
        ];

        let kinds: Vec<_> = normalizer()
            .normalize_findings(&findings)
            .into_iter()
            .map(|f| f.kind)
            .collect();
        assert_eq!(kinds, vec!["a", "a", "b"]);
    }

    #[test]
    fn test_degenerate_geo_rejected() {
        let mut geo = GeoReference::standard();
        geo.mins = 0;
        assert_eq!(
            RangeNormalizer::new(&geo),
            Err(GeometryError::InvalidMinutes(0))
        );

        let mut geo = GeoReference::standard();
        geo.rings = -1;
        assert_eq!(
            RangeNormalizer::new(&geo),
            Err(GeometryError::InvalidRings(-1))
        );
    }
}
