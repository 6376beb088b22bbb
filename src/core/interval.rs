use std::fmt::{Debug, Formatter};

use chrono::TimeDelta;

use crate::core::instant::Instant;

/// Half-open range of instants.
#[derive(Copy, Clone, Eq, PartialEq)]
#[must_use]
pub struct Interval {
    /// Inclusive.
    pub start: Instant,

    /// Exclusive.
    pub end: Instant,
}

impl Debug for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}..{:?}", self.start, self.end)
    }
}

impl Interval {
    pub const fn new(start: Instant, end: Instant) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn duration(self) -> TimeDelta {
        self.end - self.start
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.end <= self.start
    }

    #[must_use]
    pub fn contains(self, other: Instant) -> bool {
        (self.start <= other) && (other < self.end)
    }

    /// Overlapping part of the two intervals, if any.
    #[must_use]
    pub fn intersection(self, other: Self) -> Option<Self> {
        let intersection = Self::new(self.start.max(other.start), self.end.min(other.end));
        (!intersection.is_empty()).then_some(intersection)
    }
}
