//! Canonical-timezone instants and hour buckets.

use std::fmt::{Debug, Display, Formatter};

use chrono::{
    DateTime,
    Datelike,
    DurationRound,
    FixedOffset,
    NaiveDate,
    NaiveTime,
    Offset,
    TimeDelta,
    TimeZone,
};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

/// Point in time expressed in the canonical timezone.
pub type Instant = DateTime<Tz>;

/// Convert any timezone-aware timestamp into the canonical zone.
pub fn normalize<Z: TimeZone>(timestamp: &DateTime<Z>, timezone: Tz) -> Instant {
    timestamp.with_timezone(&timezone)
}

/// First instant of the calendar day in the zone.
///
/// Ambiguous midnights resolve to the earlier mapping, skipped ones to the first valid local time
/// after midnight.
pub fn local_midnight(date: NaiveDate, timezone: Tz) -> Instant {
    let mut time = date.and_time(NaiveTime::MIN);
    loop {
        if let Some(instant) = timezone.from_local_datetime(&time).earliest() {
            return instant;
        }
        // Gaps never exceed a few hours, the loop terminates well within the day.
        time += TimeDelta::minutes(15);
    }
}

/// Whether every UTC offset the zone uses since 1970 differs from the others by whole hours.
///
/// [`HourBucket::next`] lands on the next local hour only in such zones.
#[must_use]
pub fn has_whole_hour_shifts(timezone: Tz) -> bool {
    let Some(epoch) = NaiveDate::from_ymd_opt(1970, 1, 1) else {
        return false;
    };
    let mut offsets = epoch
        .iter_days()
        .take_while(|date| date.year() < 2100)
        .map(|date| timezone.offset_from_utc_date(&date).fix().local_minus_utc());
    let Some(first) = offsets.next() else {
        return false;
    };
    offsets.all(|offset| (offset - first) % 3600 == 0)
}

/// Hour-aligned instant used as the price lookup key.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[must_use]
pub struct HourBucket(Instant);

impl HourBucket {
    /// Truncate the instant down to the start of its hour.
    pub fn floor(instant: Instant) -> Self {
        // Truncation by one hour is infallible for any realistic timestamp.
        Self(instant.duration_trunc(TimeDelta::hours(1)).unwrap_or(instant))
    }

    /// Bucket of a timestamp published with an explicit UTC offset.
    pub fn from_published(start: DateTime<FixedOffset>, timezone: Tz) -> Self {
        Self::floor(normalize(&start, timezone))
    }

    /// Following bucket, one hour of physical time later.
    pub fn next(self) -> Self {
        Self(self.0 + TimeDelta::hours(1))
    }

    #[must_use]
    pub const fn start(self) -> Instant {
        self.0
    }

    #[must_use]
    pub fn end(self) -> Instant {
        self.next().0
    }

    #[must_use]
    pub fn date(self) -> NaiveDate {
        self.0.date_naive()
    }
}

impl Debug for HourBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M%:z"))
    }
}

impl Display for HourBucket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M"))
    }
}

impl Serialize for HourBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.fixed_offset().serialize(serializer)
    }
}
