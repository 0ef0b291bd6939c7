use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of one historical time series.
///
/// The measurement name is opaque to the store; the `"<Group>/<Variant>"`
/// split is only used for presentation (see [`SeriesKey::group_and_variant`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub suite: String,
    pub name: String,
}

impl SeriesKey {
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
        }
    }

    /// Split `"Locations (min)/Flow"` into `("Locations (min)", Some("Flow"))`.
    pub fn group_and_variant(&self) -> (&str, Option<&str>) {
        match self.name.rsplit_once('/') {
            Some((group, variant)) if !group.is_empty() => (group, Some(variant)),
            _ => (self.name.as_str(), None),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.suite, self.name)
    }
}

/// Inclusive `[since, until]` timestamp bound; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
        }
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: None,
        }
    }

    pub fn until(until: DateTime<Utc>) -> Self {
        Self {
            since: None,
            until: Some(until),
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.is_none_or(|s| ts >= s) && self.until.is_none_or(|u| ts <= u)
    }

    /// A range whose lower bound lies after its upper bound selects nothing.
    pub fn is_empty(&self) -> bool {
        matches!((self.since, self.until), (Some(s), Some(u)) if s > u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_group_and_variant() {
        let key = SeriesKey::new("Benchmark", "Locations (min)/Flow + Deps");
        assert_eq!(key.group_and_variant(), ("Locations (min)", Some("Flow + Deps")));

        let flat = SeriesKey::new("Benchmark", "startup");
        assert_eq!(flat.group_and_variant(), ("startup", None));
    }

    #[test]
    fn test_time_range_inclusive() {
        let t1 = Utc.timestamp_millis_opt(1_000).unwrap();
        let t2 = Utc.timestamp_millis_opt(2_000).unwrap();
        let range = TimeRange::between(t1, t2);
        assert!(range.contains(t1));
        assert!(range.contains(t2));
        assert!(!range.contains(Utc.timestamp_millis_opt(2_001).unwrap()));
        assert!(TimeRange::between(t2, t1).is_empty());
    }
}
