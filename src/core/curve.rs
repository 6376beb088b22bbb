use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::{
    core::{instant::HourBucket, interval::Interval, period::PeriodKey},
    quantity::rate::KilowattHourRate,
};

/// Hourly prices of one billing period, read-only once assembled.
#[must_use]
pub struct PriceCurve {
    period: PeriodKey,
    timezone: Tz,
    rates: BTreeMap<HourBucket, KilowattHourRate>,
}

impl PriceCurve {
    /// Assemble the curve. A repeated bucket keeps the last rate.
    pub fn from_rates(
        period: PeriodKey,
        timezone: Tz,
        rates: impl IntoIterator<Item = (HourBucket, KilowattHourRate)>,
    ) -> Self {
        Self { period, timezone, rates: rates.into_iter().collect() }
    }

    pub const fn period(&self) -> PeriodKey {
        self.period
    }

    pub fn interval(&self) -> Interval {
        self.period.interval(self.timezone)
    }

    /// Rate of the bucket, `None` if the price is unknown.
    #[must_use]
    pub fn get(&self, bucket: HourBucket) -> Option<KilowattHourRate> {
        self.rates.get(&bucket).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HourBucket, KilowattHourRate)> + '_ {
        self.rates.iter().map(|(bucket, rate)| (*bucket, *rate))
    }

    /// Every hour of the period, 23 or 25 of them on daylight saving days.
    pub fn expected_buckets(&self) -> impl Iterator<Item = HourBucket> {
        let interval = self.interval();
        std::iter::successors(Some(HourBucket::floor(interval.start)), |bucket| Some(bucket.next()))
            .take_while(move |bucket| bucket.start() < interval.end)
    }

    #[must_use]
    pub fn expected_hours(&self) -> usize {
        self.expected_buckets().count()
    }

    /// Hours of the period without a price.
    #[must_use]
    pub fn missing_buckets(&self) -> Vec<HourBucket> {
        self.expected_buckets().filter(|bucket| !self.rates.contains_key(bucket)).collect()
    }

    /// Calendar days with at least one priced hour.
    #[must_use]
    pub fn covered_days(&self) -> BTreeSet<NaiveDate> {
        self.rates.keys().map(|bucket| bucket.date()).collect()
    }
}
