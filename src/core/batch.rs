use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        allocator::{AllocationResult, PricingStatus, SessionAllocator},
        error::AllocationFailure,
        session::ChargingSession,
    },
    quantity::{cost::Cost, energy::KilowattHours},
};

/// How failed sessions enter the aggregate.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, clap::ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Leave failed sessions out of the totals.
    #[default]
    Exclude,

    /// Count failed sessions at zero cost, including their energy.
    SubstituteZero,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, derive_more::Display, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Every hour of the session has a price.
    #[display("priced")]
    Priced,

    /// Computed, but some hours were counted at zero cost.
    #[display("priced with gaps")]
    PricedWithGaps,

    /// Not computed at all.
    #[display("not computed")]
    NotComputed,
}

#[must_use]
pub struct BatchEntry {
    /// Position of the session in the input.
    pub index: usize,

    pub session: ChargingSession,

    pub outcome: Result<AllocationResult, AllocationFailure>,
}

impl BatchEntry {
    pub fn status(&self) -> SessionStatus {
        match &self.outcome {
            Ok(result) => match result.status() {
                PricingStatus::Complete => SessionStatus::Priced,
                PricingStatus::Partial { .. } => SessionStatus::PricedWithGaps,
            },
            Err(_) => SessionStatus::NotComputed,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
#[must_use]
pub struct Aggregate {
    pub total_cost: Cost,
    pub total_energy: KilowattHours,
    pub n_priced: usize,
    pub n_priced_with_gaps: usize,
    pub n_failed: usize,

    /// Failed sessions included at zero cost.
    pub n_substituted: usize,
}

impl Aggregate {
    #[must_use]
    pub const fn is_best_effort(&self) -> bool {
        self.n_substituted != 0
    }
}

#[must_use]
pub struct BatchOutcome {
    /// In the input order.
    pub entries: Vec<BatchEntry>,
}

impl BatchOutcome {
    pub fn results(&self) -> impl Iterator<Item = &AllocationResult> {
        self.entries.iter().filter_map(|entry| entry.outcome.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &AllocationFailure)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.outcome.as_ref().err().map(|error| (entry.index, error)))
    }

    pub fn aggregate(&self, policy: FailurePolicy) -> Aggregate {
        let mut aggregate = Aggregate::default();
        for entry in &self.entries {
            match (&entry.outcome, entry.status()) {
                (Ok(result), status) => {
                    aggregate.total_cost += result.total_cost;
                    aggregate.total_energy += result.total_energy;
                    if status == SessionStatus::Priced {
                        aggregate.n_priced += 1;
                    } else {
                        aggregate.n_priced_with_gaps += 1;
                    }
                }
                (Err(_), _) => {
                    aggregate.n_failed += 1;
                    if policy == FailurePolicy::SubstituteZero {
                        aggregate.n_substituted += 1;
                        aggregate.total_energy += entry.session.energy;
                    }
                }
            }
        }
        aggregate.total_cost = aggregate.total_cost.round_to_precision();
        aggregate
    }
}

/// Allocates every session of a batch independently against the shared curve.
#[must_use]
pub struct BatchCostCalculator<'a> {
    allocator: SessionAllocator<'a>,
}

impl<'a> BatchCostCalculator<'a> {
    pub const fn new(allocator: SessionAllocator<'a>) -> Self {
        Self { allocator }
    }

    pub fn allocate_all(&self, sessions: &[ChargingSession]) -> BatchOutcome {
        let entries = sessions
            .par_iter()
            .enumerate()
            .map(|(index, session)| BatchEntry {
                index,
                session: *session,
                outcome: self.allocator.allocate(session),
            })
            .collect();
        BatchOutcome { entries }
    }
}
