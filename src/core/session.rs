use chrono::{DateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;

use crate::{
    core::instant::{Instant, normalize},
    quantity::{energy::KilowattHours, power::Kilowatts},
};

/// One charging event with energy delivered uniformly over `[start, end)`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[must_use]
pub struct ChargingSession {
    pub start: Instant,
    pub end: Instant,
    pub energy: KilowattHours,
}

impl ChargingSession {
    /// Build a session, converting both timestamps into the canonical timezone.
    pub fn new<Z: TimeZone>(
        start: &DateTime<Z>,
        end: &DateTime<Z>,
        energy: KilowattHours,
        timezone: Tz,
    ) -> Self {
        Self { start: normalize(start, timezone), end: normalize(end, timezone), energy }
    }

    /// Energy over duration, or `None` for a degenerate session.
    #[must_use]
    pub fn average_power(&self) -> Option<Kilowatts> {
        (!self.is_degenerate()).then(|| self.energy / self.duration())
    }

    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Sessions that do not move forward in time cost nothing.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.end <= self.start
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, Utc};
    use chrono_tz::Europe::Stockholm;

    use super::*;

    #[test]
    fn test_new_normalizes_timezone() {
        let start = Utc.with_ymd_and_hms(2025, 3, 24, 0, 30, 0).unwrap();
        let end = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2025, 3, 24, 3, 15, 0)
            .unwrap()
            .to_utc();
        let session = ChargingSession::new(&start, &end, KilowattHours::from(10.0), Stockholm);
        assert_eq!(session.start, Stockholm.with_ymd_and_hms(2025, 3, 24, 1, 30, 0).unwrap());
        assert_eq!(session.duration(), TimeDelta::minutes(105));
        assert!(!session.is_degenerate());
    }

    #[test]
    fn test_average_power() {
        let start = Stockholm.with_ymd_and_hms(2025, 3, 24, 1, 30, 0).unwrap();
        let end = Stockholm.with_ymd_and_hms(2025, 3, 24, 3, 0, 0).unwrap();
        let session = ChargingSession::new(&start, &end, KilowattHours::from(11.0), Stockholm);
        assert_eq!(session.average_power(), Some(Kilowatts::from(11.0 / 1.5)));
    }

    #[test]
    fn test_degenerate() {
        let at = Stockholm.with_ymd_and_hms(2025, 3, 24, 1, 30, 0).unwrap();
        let session = ChargingSession::new(&at, &at, KilowattHours::from(1.0), Stockholm);
        assert!(session.is_degenerate());
        assert_eq!(session.average_power(), None);
    }
}
