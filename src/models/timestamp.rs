//! Temporal primitives for the registry.
//!
//! Every state-changing fact is stamped with a [`Timestamp`]: the physical
//! time the fact became true, who recorded it, when it was recorded, and a
//! free-text comment. Timestamped edges carry a [`Validity`] interval built
//! from two of them.
//!
//! # Interval Semantics
//!
//! Validity is a half-open interval `[start, end)`:
//!
//! - `start` is inclusive and always present
//! - `end` is exclusive; `None` means "still in effect"
//!
//! An open end replaces the "no-end sentinel timestamp" pattern: there is no
//! magic value to compare against, only `Option`.

use crate::current_timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A stamped fact: physical time plus record-keeping metadata.
///
/// `time` is when the fact became true in the real world; `edit_time` is
/// when it was entered into the registry. The two differ whenever history
/// is recorded after the fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Physical time of the fact, Unix seconds.
    pub time: i64,
    /// Identifier of the author who recorded the fact.
    pub uid: String,
    /// Time the record was entered, Unix seconds.
    pub edit_time: i64,
    /// Free-text comment.
    pub comments: String,
}

impl Timestamp {
    /// Creates a timestamp for a fact at `time`, recorded now by `uid`.
    #[must_use]
    pub fn new(time: i64, uid: impl Into<String>) -> Self {
        Self {
            time,
            uid: uid.into(),
            edit_time: current_timestamp(),
            comments: String::new(),
        }
    }

    /// Creates a timestamp for a fact happening now, recorded by `uid`.
    #[must_use]
    pub fn now(uid: impl Into<String>) -> Self {
        Self::new(current_timestamp(), uid)
    }

    /// Sets the comment text.
    #[must_use]
    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = comments.into();
        self
    }

    /// Sets the record-entry time.
    ///
    /// Only useful when importing historical records or testing; new
    /// timestamps default to the current clock.
    #[must_use]
    pub const fn with_edit_time(mut self, edit_time: i64) -> Self {
        self.edit_time = edit_time;
        self
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.uid, self.time)
    }
}

/// Half-open validity interval `[start, end)` for a timestamped edge.
///
/// `end == None` means the fact is still in effect (open interval).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    /// Start of validity (inclusive).
    pub start: Timestamp,
    /// End of validity (exclusive), `None` while still in effect.
    pub end: Option<Timestamp>,
}

impl Validity {
    /// Creates an open interval starting at `start`.
    #[must_use]
    pub const fn open(start: Timestamp) -> Self {
        Self { start, end: None }
    }

    /// Creates a bounded interval `[start, end)`.
    #[must_use]
    pub const fn between(start: Timestamp, end: Timestamp) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Returns the start time in Unix seconds.
    #[must_use]
    pub const fn start_time(&self) -> i64 {
        self.start.time
    }

    /// Returns the end time in Unix seconds, if the interval is closed.
    #[must_use]
    pub fn end_time(&self) -> Option<i64> {
        self.end.as_ref().map(|t| t.time)
    }

    /// Checks if the interval is still open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// Checks if `timestamp` falls within `[start, end)`.
    #[must_use]
    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.start.time && self.end.as_ref().is_none_or(|e| timestamp < e.time)
    }

    /// Checks if this interval overlaps the half-open range
    /// `[from_time, to_time)`.
    #[must_use]
    pub fn overlaps_range(&self, from_time: i64, to_time: i64) -> bool {
        self.start.time < to_time && self.end.as_ref().is_none_or(|e| e.time > from_time)
    }

    /// Checks if this interval overlaps another.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        let self_before = self
            .end
            .as_ref()
            .is_some_and(|e| e.time <= other.start.time);
        let other_before = other.end.as_ref().is_some_and(|e| e.time <= self.start.time);
        !(self_before || other_before)
    }

    /// Closes the interval at `end`.
    ///
    /// The caller is responsible for checking the interval is not already
    /// closed; double-closing is a domain error, not an interval concern.
    #[must_use]
    pub fn close_at(mut self, end: Timestamp) -> Self {
        self.end = Some(end);
        self
    }
}

impl fmt::Display for Validity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.end {
            None => write!(f, "[{}, ∞)", self.start.time),
            Some(e) => write!(f, "[{}, {})", self.start.time, e.time),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(time: i64) -> Timestamp {
        Timestamp::new(time, "tester")
    }

    #[test]
    fn test_timestamp_builder() {
        let t = ts(100).with_comments("installed in rack 4");
        assert_eq!(t.time, 100);
        assert_eq!(t.uid, "tester");
        assert_eq!(t.comments, "installed in rack 4");
        assert!(t.edit_time > 0);
    }

    #[test]
    fn test_open_interval_contains() {
        let v = Validity::open(ts(100));
        assert!(!v.contains(99));
        assert!(v.contains(100));
        assert!(v.contains(i64::MAX));
        assert!(v.is_open());
    }

    #[test]
    fn test_bounded_interval_contains() {
        let v = Validity::between(ts(100), ts(200));
        assert!(!v.contains(99));
        assert!(v.contains(100));
        assert!(v.contains(199));
        assert!(!v.contains(200)); // end is exclusive
    }

    #[test]
    fn test_overlaps() {
        let a = Validity::between(ts(100), ts(200));
        let b = Validity::between(ts(150), ts(250));
        let c = Validity::between(ts(200), ts(300));
        let open = Validity::open(ts(250));

        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // adjacent intervals do not overlap
        assert!(!a.overlaps(&open));
        assert!(c.overlaps(&open));
    }

    #[test]
    fn test_overlaps_range() {
        let v = Validity::between(ts(100), ts(200));
        assert!(v.overlaps_range(150, 250));
        assert!(!v.overlaps_range(200, 300));
        assert!(!v.overlaps_range(0, 100));

        let open = Validity::open(ts(100));
        assert!(open.overlaps_range(500, 600));
    }

    #[test]
    fn test_close_at() {
        let v = Validity::open(ts(100)).close_at(ts(200));
        assert!(!v.is_open());
        assert_eq!(v.end_time(), Some(200));
    }

    #[test]
    fn test_display() {
        assert_eq!(Validity::open(ts(100)).to_string(), "[100, ∞)");
        assert_eq!(Validity::between(ts(100), ts(200)).to_string(), "[100, 200)");
    }
}
