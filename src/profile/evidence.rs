//! Evidence entries and their lifecycle rules.
//!
//! Stored evidence lists are kept newest-first and never grow past the cap.
//! Reads may project a shorter prefix without touching what is stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Default number of evidence entries kept per trait item.
pub const DEFAULT_EVIDENCE_CAP: usize = 5;

/// A timestamped justification attached to a trait item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Evidence {
    pub fn new(text: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            text: text.into(),
            timestamp,
        }
    }
}

/// Stamp oracle-provided texts with one backend instant.
pub fn stamp<I, S>(texts: I, now: DateTime<Utc>) -> Vec<Evidence>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    texts.into_iter().map(|t| Evidence::new(t, now)).collect()
}

/// Merge incoming evidence into an existing list.
///
/// The result is sorted newest-first and truncated to `cap`. The sort is
/// stable, so on equal timestamps existing entries stay ahead of new ones.
pub fn merge_evidence(existing: Vec<Evidence>, incoming: Vec<Evidence>, cap: usize) -> Vec<Evidence> {
    let mut merged = existing;
    merged.extend(incoming);
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(cap);
    merged
}

/// How much evidence a read returns per item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceLimit {
    /// The newest `n` stored entries; `0` hides evidence entirely.
    Latest(usize),
    /// Everything stored, which is never more than the cap.
    All,
}

impl EvidenceLimit {
    /// Parse the caller-facing integer form: `-1` for all, `0..` for a count.
    pub fn from_i64(value: i64) -> Result<Self, ValidationError> {
        match value {
            -1 => Ok(Self::All),
            n if n >= 0 => Ok(Self::Latest(n as usize)),
            n => Err(ValidationError::InvalidEvidenceLimit(n)),
        }
    }

    /// Truncate a stored (already newest-first) list in place.
    pub fn apply(self, evidence: &mut Vec<Evidence>) {
        if let Self::Latest(n) = self {
            evidence.truncate(n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
    }

    fn ev(text: &str, day: u32) -> Evidence {
        Evidence::new(text, at(day))
    }

    #[test]
    fn merge_sorts_newest_first_and_caps() {
        let existing = vec![ev("a", 5), ev("b", 3), ev("c", 1)];
        let incoming = vec![ev("d", 4), ev("e", 6), ev("f", 2)];
        let merged = merge_evidence(existing, incoming, 5);

        let texts: Vec<_> = merged.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["e", "a", "d", "b", "f"]);
    }

    #[test]
    fn merge_never_exceeds_cap() {
        let base = at(1);
        for cap in 1..=6 {
            let existing: Vec<_> = (0..7)
                .map(|i| Evidence::new(format!("old{i}"), base + Duration::hours(i)))
                .collect();
            let incoming = vec![Evidence::new("new", base + Duration::days(30))];
            let merged = merge_evidence(existing, incoming, cap);
            assert_eq!(merged.len(), cap);
            assert!(merged.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
            assert_eq!(merged[0].text, "new");
        }
    }

    #[test]
    fn equal_timestamps_keep_existing_first() {
        let merged = merge_evidence(vec![ev("old", 2)], vec![ev("new", 2)], 5);
        assert_eq!(merged[0].text, "old");
        assert_eq!(merged[1].text, "new");
    }

    #[test]
    fn stamp_uses_one_instant() {
        let now = at(9);
        let stamped = stamp(["x", "y"], now);
        assert!(stamped.iter().all(|e| e.timestamp == now));
        assert_eq!(stamped.len(), 2);
    }

    #[test]
    fn limit_projection() {
        let stored = vec![ev("a", 5), ev("b", 4), ev("c", 3)];

        let mut none = stored.clone();
        EvidenceLimit::from_i64(0).unwrap().apply(&mut none);
        assert!(none.is_empty());

        let mut two = stored.clone();
        EvidenceLimit::from_i64(2).unwrap().apply(&mut two);
        assert_eq!(two, stored[..2].to_vec());

        let mut many = stored.clone();
        EvidenceLimit::from_i64(10).unwrap().apply(&mut many);
        assert_eq!(many, stored);

        let mut all = stored.clone();
        EvidenceLimit::from_i64(-1).unwrap().apply(&mut all);
        assert_eq!(all, stored);
    }

    #[test]
    fn negative_limits_other_than_all_are_rejected() {
        assert_eq!(
            EvidenceLimit::from_i64(-2),
            Err(ValidationError::InvalidEvidenceLimit(-2))
        );
    }

    #[test]
    fn timestamps_serialize_as_iso8601() {
        let json = serde_json::to_value(ev("x", 7)).unwrap();
        assert_eq!(json["timestamp"], "2026-03-07T09:00:00Z");
    }
}
