//! Time-weighted allocation of session energy over the hourly price buckets.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        curve::PriceCurve,
        error::AllocationFailure,
        instant::HourBucket,
        interval::Interval,
        observer::{Observer, Silent},
        session::ChargingSession,
    },
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, rate::KilowattHourRate},
};

/// Maximum relative difference between the allocated and the delivered energy.
const ENERGY_TOLERANCE: f64 = 1e-9;

/// What to do with a session that overlaps an hour without a known price.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum UnpricedPolicy {
    /// Fail the session.
    #[default]
    Reject,

    /// Price the hour at zero and flag it in the breakdown.
    ZeroFill,
}

/// Part of a session that falls into one hour bucket.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BucketAllocation {
    pub bucket: HourBucket,

    /// Part of the bucket covered by the session.
    pub interval: Interval,

    pub energy: KilowattHours,

    /// `None` when the curve has no price for the bucket.
    pub rate: Option<KilowattHourRate>,

    /// Unrounded.
    pub cost: Cost,
}

impl BucketAllocation {
    #[must_use]
    pub fn duration(&self) -> TimeDelta {
        self.interval.duration()
    }

    #[must_use]
    pub const fn is_priced(&self) -> bool {
        self.rate.is_some()
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PricingStatus {
    /// Every bucket has a price.
    Complete,

    /// Some buckets were priced at zero.
    Partial { n_unpriced: usize },
}

#[derive(Clone, Debug)]
#[must_use]
pub struct AllocationResult {
    pub session: ChargingSession,

    /// Buckets in chronological order.
    pub breakdown: Vec<BucketAllocation>,

    /// Sum of the allocated energy, equal to the session energy.
    pub total_energy: KilowattHours,

    /// Sum of the bucket costs, rounded to [`Cost::PRECISION`].
    pub total_cost: Cost,
}

impl AllocationResult {
    fn empty(session: ChargingSession) -> Self {
        Self {
            session,
            breakdown: Vec::new(),
            total_energy: KilowattHours::ZERO,
            total_cost: Cost::ZERO,
        }
    }

    pub fn unpriced_buckets(&self) -> impl Iterator<Item = HourBucket> + '_ {
        self.breakdown
            .iter()
            .filter(|allocation| !allocation.is_priced())
            .map(|allocation| allocation.bucket)
    }

    #[must_use]
    pub fn status(&self) -> PricingStatus {
        match self.unpriced_buckets().count() {
            0 => PricingStatus::Complete,
            n_unpriced => PricingStatus::Partial { n_unpriced },
        }
    }

    /// Total cost before rounding.
    pub fn unrounded_cost(&self) -> Cost {
        self.breakdown.iter().map(|allocation| allocation.cost).sum()
    }
}

/// Allocates sessions against a single shared price curve.
#[must_use]
pub struct SessionAllocator<'a> {
    curve: &'a PriceCurve,
    policy: UnpricedPolicy,
    observer: &'a dyn Observer,
}

impl<'a> SessionAllocator<'a> {
    pub fn new(curve: &'a PriceCurve, policy: UnpricedPolicy) -> Self {
        Self { curve, policy, observer: &Silent }
    }

    pub fn with_observer(mut self, observer: &'a dyn Observer) -> Self {
        self.observer = observer;
        self
    }

    /// Split the session into hour buckets and pro-rate its energy by elapsed time.
    pub fn allocate(
        &self,
        session: &ChargingSession,
    ) -> Result<AllocationResult, AllocationFailure> {
        if session.is_degenerate() {
            return Ok(AllocationResult::empty(*session));
        }
        if !session.energy.is_finite() || session.energy < KilowattHours::ZERO {
            return Err(AllocationFailure::InvalidEnergy { energy: session.energy });
        }
        let period = self.curve.interval();
        if session.start < period.start || session.end > period.end {
            return Err(AllocationFailure::OutsidePeriod {
                start: session.start,
                end: session.end,
                period: self.curve.period(),
            });
        }

        let total_seconds = session.duration().as_seconds_f64();
        let mut breakdown = Vec::new();
        let mut total_energy = KilowattHours::ZERO;
        let mut total_cost = Cost::ZERO;

        let mut bucket = HourBucket::floor(session.start);
        while bucket.start() < session.end {
            let interval = Interval::new(
                bucket.start().max(session.start),
                bucket.end().min(session.end),
            );
            let energy = session.energy * (interval.duration().as_seconds_f64() / total_seconds);
            let rate = self.curve.get(bucket);
            let cost = energy * rate.unwrap_or(KilowattHourRate::ZERO);
            total_energy += energy;
            total_cost += cost;

            let allocation = BucketAllocation { bucket, interval, energy, rate, cost };
            self.observer.on_bucket(session, &allocation);
            breakdown.push(allocation);
            bucket = bucket.next();
        }

        if !energy_matches(session.energy, total_energy) {
            return Err(AllocationFailure::EnergyMismatch {
                expected: session.energy,
                actual: total_energy,
            });
        }

        let result = AllocationResult {
            session: *session,
            breakdown,
            total_energy,
            total_cost: total_cost.round_to_precision(),
        };
        if let PricingStatus::Partial { n_unpriced } = result.status() {
            match self.policy {
                UnpricedPolicy::Reject => {
                    return Err(AllocationFailure::Unpriced {
                        buckets: result.unpriced_buckets().collect(),
                    });
                }
                UnpricedPolicy::ZeroFill => {
                    warn!(
                        session.start = %session.start,
                        n_unpriced,
                        "session has unpriced hours, they are counted at zero cost",
                    );
                }
            }
        }
        Ok(result)
    }
}

fn energy_matches(expected: KilowattHours, actual: KilowattHours) -> bool {
    let difference = (expected - actual).abs().get();
    difference <= ENERGY_TOLERANCE * expected.abs().get().max(f64::MIN_POSITIVE)
}
