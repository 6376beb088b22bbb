use std::collections::BTreeSet;

use itertools::Itertools;

use crate::core::{
    error::MultiPeriodError,
    instant::Instant,
    period::PeriodKey,
    session::ChargingSession,
};

/// Confirm that every session starts and ends within the same calendar month.
pub fn validate_single_period(
    sessions: &[ChargingSession],
) -> Result<PeriodKey, MultiPeriodError> {
    single_period(sessions.iter().flat_map(|session| [session.start, session.end]))
}

/// The only period touched by the instants.
pub fn single_period(
    instants: impl IntoIterator<Item = Instant>,
) -> Result<PeriodKey, MultiPeriodError> {
    let periods = instants.into_iter().map(PeriodKey::of).collect::<BTreeSet<_>>();
    periods
        .iter()
        .copied()
        .exactly_one()
        .map_err(|_| MultiPeriodError { periods: periods.iter().copied().collect() })
}
