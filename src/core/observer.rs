//! Opt-in hooks for per-bucket and per-day events.

use chrono::NaiveDate;

use crate::{
    core::{allocator::BucketAllocation, error::DayFetchError, session::ChargingSession},
    prelude::*,
};

pub trait Observer: Sync {
    fn on_bucket(&self, _session: &ChargingSession, _allocation: &BucketAllocation) {}

    fn on_day_fetched(&self, _date: NaiveDate, _n_records: usize) {}

    fn on_day_skipped(&self, _error: &DayFetchError) {}
}

/// Discards every event.
pub struct Silent;

impl Observer for Silent {}

/// Emits every event as a structured debug log record.
pub struct Traced;

impl Observer for Traced {
    fn on_bucket(&self, session: &ChargingSession, allocation: &BucketAllocation) {
        debug!(
            session.start = %session.start,
            bucket = %allocation.bucket,
            duration = ?allocation.duration(),
            energy = ?allocation.energy,
            rate = ?allocation.rate,
            cost = ?allocation.cost,
            "allocated",
        );
    }

    fn on_day_fetched(&self, date: NaiveDate, n_records: usize) {
        debug!(%date, n_records, "fetched");
    }

    fn on_day_skipped(&self, error: &DayFetchError) {
        debug!(date = %error.date, attempts = error.attempts, source = %error.source, "skipped");
    }
}
