use std::{
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use chrono::{Datelike, Months, NaiveDate, ParseError};
use chrono_tz::Tz;
use serde::{Serialize, Serializer};

use crate::core::{
    instant::{Instant, local_midnight},
    interval::Interval,
};

/// Calendar month identifying one billing period.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[must_use]
pub struct PeriodKey {
    /// Always the first day of the month.
    first_day: NaiveDate,
}

impl PeriodKey {
    #[must_use]
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(|first_day| Self { first_day })
    }

    /// Period containing the instant, in the instant's own timezone.
    pub fn of(instant: Instant) -> Self {
        Self::of_date(instant.date_naive())
    }

    pub fn of_date(date: NaiveDate) -> Self {
        // The first day of an existing date's month always exists.
        Self { first_day: date.with_day(1).unwrap_or(date) }
    }

    #[must_use]
    pub fn year(self) -> i32 {
        self.first_day.year()
    }

    #[must_use]
    pub fn month(self) -> u32 {
        self.first_day.month()
    }

    pub fn next(self) -> Self {
        Self { first_day: self.first_day + Months::new(1) }
    }

    /// Every calendar day of the month.
    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        let month = self.month();
        self.first_day.iter_days().take_while(move |date| date.month() == month)
    }

    #[must_use]
    pub fn n_days(self) -> usize {
        self.days().count()
    }

    /// Instants from the first local midnight of the month until the first one of the next month.
    pub fn interval(self, timezone: Tz) -> Interval {
        Interval::new(
            local_midnight(self.first_day, timezone),
            local_midnight(self.next().first_day, timezone),
        )
    }

    #[must_use]
    pub fn contains(self, instant: Instant) -> bool {
        Self::of(instant) == self
    }
}

impl Display for PeriodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first_day.format("%Y-%m"))
    }
}

impl Debug for PeriodKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for PeriodKey {
    type Err = ParseError;

    /// Parse `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").map(Self::of_date)
    }
}

impl Serialize for PeriodKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeDelta, TimeZone};
    use chrono_tz::Europe::Stockholm;

    use super::*;

    #[test]
    fn test_days_in_month() -> crate::prelude::Result {
        assert_eq!("2025-03".parse::<PeriodKey>()?.n_days(), 31);
        assert_eq!("2025-04".parse::<PeriodKey>()?.n_days(), 30);
        assert_eq!("2025-02".parse::<PeriodKey>()?.n_days(), 28);
        assert_eq!("2024-02".parse::<PeriodKey>()?.n_days(), 29);
        Ok(())
    }

    #[test]
    fn test_next_wraps_the_year() {
        let period = PeriodKey::new(2024, 12).unwrap();
        assert_eq!(period.next(), PeriodKey::new(2025, 1).unwrap());
    }

    #[test]
    fn test_display_and_parse() -> crate::prelude::Result {
        let period: PeriodKey = "2025-03".parse()?;
        assert_eq!(period.year(), 2025);
        assert_eq!(period.month(), 3);
        assert_eq!(period.to_string(), "2025-03");
        assert!("2025-13".parse::<PeriodKey>().is_err());
        Ok(())
    }

    #[test]
    fn test_interval_spans_dst_month() {
        // March 2025 in Stockholm loses an hour on the 30th.
        let interval = PeriodKey::new(2025, 3).unwrap().interval(Stockholm);
        assert_eq!(interval.duration(), TimeDelta::hours(31 * 24 - 1));
        assert_eq!(interval.start, Stockholm.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_contains() {
        let period = PeriodKey::new(2025, 3).unwrap();
        assert!(period.contains(Stockholm.with_ymd_and_hms(2025, 3, 31, 23, 59, 59).unwrap()));
        assert!(!period.contains(Stockholm.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()));
    }
}
