use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use bon::Builder;
use chrono::NaiveDate;
use chrono_tz::Tz;
use futures_util::{StreamExt, stream};

use crate::{
    api::price_source::{PriceSource, PriceZone, PublishedPrice, SourceError},
    core::{
        curve::PriceCurve,
        error::{DayFetchError, NoPriceDataError},
        instant::HourBucket,
        observer::{Observer, Silent},
        period::PeriodKey,
    },
    prelude::*,
};

/// Fetches the prices of a billing period day by day and assembles them into a [`PriceCurve`].
#[derive(Builder)]
#[must_use]
pub struct PriceCurveBuilder<'a> {
    source: &'a dyn PriceSource,
    zone: PriceZone,
    timezone: Tz,

    #[builder(default = &Silent as &dyn Observer)]
    observer: &'a dyn Observer,

    /// Per attempt.
    #[builder(default = Duration::from_secs(10))]
    timeout: Duration,

    #[builder(default = 3)]
    max_attempts: u32,

    /// Multiplied by the attempt number.
    #[builder(default = Duration::from_secs(1))]
    retry_delay: Duration,

    /// Maximum number of days fetched at once.
    #[builder(default = 4)]
    concurrency: usize,

    /// Once set, no further fetch is started.
    cancellation: Option<&'a AtomicBool>,
}

#[must_use]
pub struct CurveBuild {
    pub curve: PriceCurve,
    pub coverage: CoverageReport,
}

#[derive(Debug, Default)]
#[must_use]
pub struct CoverageReport {
    pub fetched: Vec<NaiveDate>,
    pub skipped: Vec<DayFetchError>,

    /// Days not attempted because the build got cancelled.
    pub cancelled: Vec<NaiveDate>,
}

impl CoverageReport {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.cancelled.is_empty()
    }
}

enum DayOutcome {
    Fetched(Vec<PublishedPrice>),
    Skipped(DayFetchError),
    Cancelled,
}

impl PriceCurveBuilder<'_> {
    /// Fetch every day of the period.
    ///
    /// A failed day is skipped and reported in the coverage, the build only fails when not a single
    /// price has been retrieved.
    #[instrument(skip_all, fields(period = %period, zone = %self.zone))]
    pub async fn build(&self, period: PeriodKey) -> Result<CurveBuild, NoPriceDataError> {
        info!(n_days = period.n_days(), "fetching the prices…");
        let mut outcomes: Vec<_> = stream::iter(period.days())
            .map(|date| async move { (date, self.fetch_day(date).await) })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;
        outcomes.sort_by_key(|(date, _)| *date);

        let interval = period.interval(self.timezone);
        let mut rates = Vec::new();
        let mut coverage = CoverageReport::default();
        for (date, outcome) in outcomes {
            match outcome {
                DayOutcome::Fetched(prices) => {
                    self.observer.on_day_fetched(date, prices.len());
                    coverage.fetched.push(date);
                    rates.extend(
                        prices
                            .into_iter()
                            .map(|price| {
                                (HourBucket::from_published(price.start, self.timezone), price.rate)
                            })
                            .filter(|(bucket, _)| interval.contains(bucket.start())),
                    );
                }
                DayOutcome::Skipped(error) => {
                    warn!(%date, attempts = error.attempts, source = %error.source, "skipped the day");
                    self.observer.on_day_skipped(&error);
                    coverage.skipped.push(error);
                }
                DayOutcome::Cancelled => {
                    coverage.cancelled.push(date);
                }
            }
        }

        if rates.is_empty() {
            return Err(NoPriceDataError {
                period,
                zone: self.zone,
                skipped: coverage.skipped,
                cancelled: coverage.cancelled,
            });
        }
        let curve = PriceCurve::from_rates(period, self.timezone, rates);
        info!(
            n_hours = curve.len(),
            n_expected_hours = curve.expected_hours(),
            n_skipped_days = coverage.skipped.len(),
            n_cancelled_days = coverage.cancelled.len(),
            "fetched",
        );
        Ok(CurveBuild { curve, coverage })
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    #[instrument(skip_all, fields(date = %date))]
    async fn fetch_day(&self, date: NaiveDate) -> DayOutcome {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            if self.is_cancelled() {
                return DayOutcome::Cancelled;
            }
            attempt += 1;
            let fetch = self.source.fetch_daily_prices(date, self.zone);
            let result = match tokio::time::timeout(self.timeout, fetch).await {
                Ok(Ok(prices)) if prices.is_empty() => Err(SourceError::Empty),
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout(self.timeout)),
            };
            match result {
                Ok(prices) => {
                    return DayOutcome::Fetched(prices);
                }
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    debug!(attempt, %error, "retrying…");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(source) => {
                    return DayOutcome::Skipped(DayFetchError { date, attempts: attempt, source });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeMap, BTreeSet},
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use chrono::TimeDelta;
    use chrono_tz::Europe::Stockholm;
    use http::StatusCode;

    use super::*;
    use crate::{core::instant::local_midnight, quantity::rate::KilowattHourRate};

    #[derive(Default)]
    struct MockSource {
        missing: BTreeSet<NaiveDate>,
        hanging: BTreeSet<NaiveDate>,

        /// Number of `503`s returned before the prices.
        n_unavailable: u32,

        /// Raise the flag on the given call, counting over all days.
        cancel_on_call: Option<(u32, Arc<AtomicBool>)>,

        calls: Mutex<BTreeMap<NaiveDate, u32>>,
    }

    impl MockSource {
        fn n_calls(&self, on: NaiveDate) -> u32 {
            self.calls.lock().unwrap().get(&on).copied().unwrap_or_default()
        }
    }

    #[async_trait]
    impl PriceSource for MockSource {
        async fn fetch_daily_prices(
            &self,
            on: NaiveDate,
            _zone: PriceZone,
        ) -> Result<Vec<PublishedPrice>, SourceError> {
            let n_calls = {
                let mut calls = self.calls.lock().unwrap();
                let n_calls = calls.entry(on).or_default();
                *n_calls += 1;
                let n_calls = *n_calls;
                if let Some((on_call, flag)) = &self.cancel_on_call
                    && calls.values().sum::<u32>() == *on_call
                {
                    flag.store(true, Ordering::Relaxed);
                }
                n_calls
            };
            if self.missing.contains(&on) {
                return Err(SourceError::NotFound);
            }
            if self.hanging.contains(&on) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            if n_calls <= self.n_unavailable {
                return Err(SourceError::Status(StatusCode::SERVICE_UNAVAILABLE));
            }
            Ok(hourly_prices(on))
        }
    }

    fn hourly_prices(on: NaiveDate) -> Vec<PublishedPrice> {
        let end = local_midnight(on.succ_opt().unwrap(), Stockholm);
        std::iter::successors(Some(local_midnight(on, Stockholm)), |start| {
            Some(*start + TimeDelta::hours(1))
        })
        .take_while(|start| *start < end)
        .map(|start| PublishedPrice {
            start: start.fixed_offset(),
            rate: KilowattHourRate::from(0.5),
        })
        .collect()
    }

    fn april() -> PeriodKey {
        PeriodKey::new(2025, 4).unwrap()
    }

    fn day(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, day).unwrap()
    }

    #[tokio::test]
    async fn test_failed_days_are_skipped() -> Result {
        let source = MockSource { missing: [day(10), day(20)].into(), ..Default::default() };
        let build = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .build()
            .build(april())
            .await?;

        assert_eq!(build.curve.covered_days().len(), 28);
        assert_eq!(build.curve.len(), 28 * 24);
        assert_eq!(build.curve.missing_buckets().len(), 2 * 24);
        assert_eq!(build.coverage.fetched.len(), 28);
        assert!(!build.coverage.is_complete());

        let skipped = build.coverage.skipped.iter().map(|error| error.date).collect::<Vec<_>>();
        assert_eq!(skipped, [day(10), day(20)]);
        assert!(build.coverage.skipped.iter().all(|error| error.attempts == 1));
        assert!(matches!(build.coverage.skipped[0].source, SourceError::NotFound));
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_month() -> Result {
        let source = MockSource::default();
        let period = PeriodKey::new(2025, 3).unwrap();
        let build = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .concurrency(8)
            .build()
            .build(period)
            .await?;
        assert!(build.coverage.is_complete());
        assert_eq!(build.curve.len(), build.curve.expected_hours());
        assert!(build.curve.missing_buckets().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_no_data_at_all() {
        let source = MockSource { missing: april().days().collect(), ..Default::default() };
        let error = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se1)
            .timezone(Stockholm)
            .build()
            .build(april())
            .await
            .err()
            .unwrap();
        assert_eq!(error.period, april());
        assert_eq!(error.zone, PriceZone::Se1);
        assert_eq!(error.skipped.len(), 30);
        assert!(error.cancelled.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_is_retried() -> Result {
        let source = MockSource { n_unavailable: 2, ..Default::default() };
        let build = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .build()
            .build(april())
            .await?;
        assert!(build.coverage.is_complete());
        assert_eq!(source.n_calls(day(1)), 3);
        assert_eq!(source.n_calls(day(30)), 3);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let source = MockSource { n_unavailable: 5, ..Default::default() };
        let error = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .max_attempts(2)
            .build()
            .build(april())
            .await
            .err()
            .unwrap();
        assert!(error.skipped.iter().all(|error| error.attempts == 2));
        assert!(matches!(
            error.skipped[0].source,
            SourceError::Status(status) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
        assert_eq!(source.n_calls(day(1)), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_day_times_out() -> Result {
        let source = MockSource { hanging: [day(5)].into(), ..Default::default() };
        let build = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .timeout(Duration::from_secs(5))
            .max_attempts(2)
            .build()
            .build(april())
            .await?;
        assert_eq!(build.coverage.fetched.len(), 29);
        let [skipped] = build.coverage.skipped.as_slice() else { unreachable!() };
        assert_eq!(skipped.date, day(5));
        assert_eq!(skipped.attempts, 2);
        assert!(matches!(
            skipped.source,
            SourceError::Timeout(timeout) if timeout == Duration::from_secs(5)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = MockSource::default();
        let cancellation = AtomicBool::new(true);
        let error = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .cancellation(&cancellation)
            .build()
            .build(april())
            .await
            .err()
            .unwrap();
        assert_eq!(error.cancelled.len(), 30);
        assert!(error.skipped.is_empty());
        assert_eq!(source.n_calls(day(1)), 0);
    }

    #[tokio::test]
    async fn test_cancelled_mid_build_keeps_fetched_days() -> Result {
        let cancellation = Arc::new(AtomicBool::new(false));
        let source = MockSource {
            cancel_on_call: Some((5, Arc::clone(&cancellation))),
            ..Default::default()
        };
        let build = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .concurrency(1)
            .cancellation(&cancellation)
            .build()
            .build(april())
            .await?;

        assert_eq!(build.coverage.fetched, (1..=5).map(day).collect::<Vec<_>>());
        assert_eq!(build.coverage.cancelled, (6..=30).map(day).collect::<Vec<_>>());
        assert!(build.coverage.skipped.is_empty());
        assert_eq!(build.curve.len(), 5 * 24);
        let first_hour = |on| HourBucket::floor(local_midnight(on, Stockholm));
        assert_eq!(build.curve.get(first_hour(day(5))), Some(KilowattHourRate::from(0.5)));
        assert_eq!(build.curve.get(first_hour(day(6))), None);
        assert_eq!(source.n_calls(day(6)), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_observer_sees_every_day() -> Result {
        #[derive(Default)]
        struct Recorder {
            fetched: Mutex<Vec<NaiveDate>>,
            skipped: Mutex<Vec<NaiveDate>>,
        }

        impl Observer for Recorder {
            fn on_day_fetched(&self, date: NaiveDate, n_records: usize) {
                assert_eq!(n_records, 24);
                self.fetched.lock().unwrap().push(date);
            }

            fn on_day_skipped(&self, error: &DayFetchError) {
                self.skipped.lock().unwrap().push(error.date);
            }
        }

        let source = MockSource { missing: [day(3)].into(), ..Default::default() };
        let recorder = Recorder::default();
        let build = PriceCurveBuilder::builder()
            .source(&source)
            .zone(PriceZone::Se3)
            .timezone(Stockholm)
            .observer(&recorder)
            .build()
            .build(april())
            .await?;
        assert_eq!(build.curve.len(), 29 * 24);
        let fetched = recorder.fetched.into_inner().unwrap();
        assert_eq!(fetched.len(), 29);
        assert!(fetched.is_sorted(), "outcomes are applied in day order");
        assert_eq!(recorder.skipped.into_inner().unwrap(), [day(3)]);
        Ok(())
    }
}
