use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    core::allocator::AllocationResult,
    quantity::{cost::Cost, energy::KilowattHours},
};

/// Energy and cost of one calendar day in the canonical timezone.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub energy: KilowattHours,

    /// Rounded once, after summing the buckets.
    pub cost: Cost,

    /// Hours counted at zero cost for lack of a price.
    pub n_unpriced_hours: usize,
}

pub fn daily_summary<'a>(
    results: impl IntoIterator<Item = &'a AllocationResult>,
) -> Vec<DailySummary> {
    let mut days = BTreeMap::<NaiveDate, (KilowattHours, Cost, usize)>::new();
    for allocation in results.into_iter().flat_map(|result| &result.breakdown) {
        let (energy, cost, n_unpriced_hours) = days.entry(allocation.bucket.date()).or_default();
        *energy += allocation.energy;
        *cost += allocation.cost;
        if !allocation.is_priced() {
            *n_unpriced_hours += 1;
        }
    }
    days.into_iter()
        .map(|(date, (energy, cost, n_unpriced_hours))| DailySummary {
            date,
            energy,
            cost: cost.round_to_precision(),
            n_unpriced_hours,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::{Datelike, TimeDelta, TimeZone};
    use chrono_tz::Europe::Stockholm;

    use super::*;
    use crate::{
        core::{
            allocator::{SessionAllocator, UnpricedPolicy},
            curve::PriceCurve,
            instant::HourBucket,
            period::PeriodKey,
            session::ChargingSession,
        },
        prelude::*,
        quantity::rate::KilowattHourRate,
    };

    #[test]
    fn test_daily_summary_across_midnight() -> Result {
        let period = PeriodKey::new(2025, 3).unwrap();
        let rates = PriceCurve::from_rates(period, Stockholm, std::iter::empty())
            .expected_buckets()
            .filter(|bucket| bucket.date().day() != 5)
            .map(|bucket| (bucket, KilowattHourRate::from(0.3)))
            .collect::<Vec<_>>();
        let curve = PriceCurve::from_rates(period, Stockholm, rates);
        let allocator = SessionAllocator::new(&curve, UnpricedPolicy::ZeroFill);

        let start = Stockholm.with_ymd_and_hms(2025, 3, 5, 22, 0, 0).unwrap();
        let overnight = ChargingSession::new(
            &start,
            &(start + TimeDelta::hours(4)),
            KilowattHours::from(8.0),
            Stockholm,
        );
        let start = Stockholm.with_ymd_and_hms(2025, 3, 6, 12, 0, 0).unwrap();
        let noon = ChargingSession::new(
            &start,
            &(start + TimeDelta::minutes(30)),
            KilowattHours::from(1.0),
            Stockholm,
        );
        let results = [allocator.allocate(&overnight)?, allocator.allocate(&noon)?];

        let summary = daily_summary(&results);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].date, NaiveDate::from_ymd_opt(2025, 3, 5).unwrap());
        assert_abs_diff_eq!(summary[0].energy.get(), 4.0);
        assert_eq!(summary[0].cost, Cost::ZERO);
        assert_eq!(summary[0].n_unpriced_hours, 2);

        assert_abs_diff_eq!(summary[1].energy.get(), 5.0);
        assert_abs_diff_eq!(summary[1].cost.get(), 1.5);
        assert_eq!(summary[1].n_unpriced_hours, 0);
        assert_eq!(HourBucket::floor(start).date(), summary[1].date);
        Ok(())
    }

    #[test]
    fn test_empty() {
        assert!(daily_summary(std::iter::empty()).is_empty());
    }
}
