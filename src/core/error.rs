//! Failures of the cost allocation engine.

use chrono::NaiveDate;
use itertools::Itertools;

use crate::{
    api::price_source::{PriceZone, SourceError},
    core::{
        instant::{HourBucket, Instant},
        period::PeriodKey,
    },
    quantity::energy::KilowattHours,
};

/// Sessions touch more than one billing period, or none at all.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error(
    "expected sessions from exactly one month, found {}: [{}]",
    .periods.len(),
    .periods.iter().join(", ")
)]
pub struct MultiPeriodError {
    /// Distinct periods in ascending order.
    pub periods: Vec<PeriodKey>,
}

/// Prices for a single day could not be retrieved.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch the prices for {date} after {attempts} attempt(s)")]
pub struct DayFetchError {
    pub date: NaiveDate,
    pub attempts: u32,
    pub source: SourceError,
}

/// Not a single price record was retrieved for the whole period.
#[derive(Debug, thiserror::Error)]
#[error(
    "no price data for {period} in {zone}: {} day(s) failed, {} day(s) cancelled",
    .skipped.len(),
    .cancelled.len()
)]
pub struct NoPriceDataError {
    pub period: PeriodKey,
    pub zone: PriceZone,
    pub skipped: Vec<DayFetchError>,
    pub cancelled: Vec<NaiveDate>,
}

/// A single session could not be priced.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum AllocationFailure {
    #[error("invalid session energy: {energy:?}")]
    InvalidEnergy { energy: KilowattHours },

    #[error("session {start}..{end} lies outside the {period} price curve")]
    OutsidePeriod { start: Instant, end: Instant, period: PeriodKey },

    #[error(
        "{} hour(s) have no price, starting with {}",
        .buckets.len(),
        .buckets.first().map_or_else(String::new, ToString::to_string)
    )]
    Unpriced { buckets: Vec<HourBucket> },

    #[error("allocated {actual:?} out of {expected:?}")]
    EnergyMismatch { expected: KilowattHours, actual: KilowattHours },
}
