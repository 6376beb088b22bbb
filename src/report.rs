//! Machine-readable result sink.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::Serialize;

use crate::{
    api::price_source::PriceZone,
    core::{
        allocator::{AllocationResult, BucketAllocation},
        batch::{Aggregate, BatchEntry, BatchOutcome, SessionStatus},
        builder::CoverageReport,
        curve::PriceCurve,
        instant::HourBucket,
        period::PeriodKey,
        summary::DailySummary,
    },
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilowatts, rate::KilowattHourRate},
};

#[derive(Serialize)]
pub struct SessionsReport {
    pub period: PeriodKey,
    pub zone: PriceZone,
    pub coverage: Coverage,
    pub aggregate: Aggregate,

    /// Set when failed sessions were counted at zero cost.
    pub best_effort: bool,

    pub sessions: Vec<SessionReport>,
}

impl SessionsReport {
    pub fn new(
        zone: PriceZone,
        curve: &PriceCurve,
        coverage: &CoverageReport,
        outcome: &BatchOutcome,
        aggregate: Aggregate,
    ) -> Self {
        Self {
            period: curve.period(),
            zone,
            coverage: Coverage::new(curve, coverage),
            aggregate,
            best_effort: aggregate.is_best_effort(),
            sessions: outcome.entries.iter().map(SessionReport::from).collect(),
        }
    }
}

#[derive(Serialize)]
pub struct ConsumptionReport {
    pub period: PeriodKey,
    pub zone: PriceZone,
    pub coverage: Coverage,
    pub aggregate: Aggregate,
    pub days: Vec<DailySummary>,
}

#[derive(Serialize)]
pub struct Coverage {
    pub n_expected_hours: usize,
    pub n_priced_hours: usize,
    pub fetched: Vec<NaiveDate>,
    pub skipped: Vec<SkippedDay>,
    pub cancelled: Vec<NaiveDate>,
}

impl Coverage {
    pub fn new(curve: &PriceCurve, coverage: &CoverageReport) -> Self {
        Self {
            n_expected_hours: curve.expected_hours(),
            n_priced_hours: curve.len(),
            fetched: coverage.fetched.clone(),
            skipped: coverage
                .skipped
                .iter()
                .map(|error| SkippedDay {
                    date: error.date,
                    attempts: error.attempts,
                    error: error.source.to_string(),
                })
                .collect(),
            cancelled: coverage.cancelled.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub attempts: u32,
    pub error: String,
}

#[derive(Serialize)]
pub struct SessionReport {
    pub index: usize,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub energy: KilowattHours,

    /// `null` for a degenerate session.
    pub average_power: Option<Kilowatts>,

    pub status: SessionStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<Cost>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breakdown: Vec<BucketReport>,
}

impl From<&BatchEntry> for SessionReport {
    fn from(entry: &BatchEntry) -> Self {
        let (total_cost, error, breakdown) = match &entry.outcome {
            Ok(AllocationResult { total_cost, breakdown, .. }) => {
                (Some(*total_cost), None, breakdown.iter().map(BucketReport::from).collect())
            }
            Err(error) => (None, Some(error.to_string()), Vec::new()),
        };
        Self {
            index: entry.index,
            start: entry.session.start.fixed_offset(),
            end: entry.session.end.fixed_offset(),
            energy: entry.session.energy,
            average_power: entry.session.average_power(),
            status: entry.status(),
            total_cost,
            error,
            breakdown,
        }
    }
}

#[derive(Serialize)]
pub struct BucketReport {
    pub bucket: HourBucket,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub energy: KilowattHours,

    /// `null` for an hour without a price.
    pub rate: Option<KilowattHourRate>,

    /// Unrounded.
    pub cost: Cost,
}

impl From<&BucketAllocation> for BucketReport {
    fn from(allocation: &BucketAllocation) -> Self {
        Self {
            bucket: allocation.bucket,
            start: allocation.interval.start.fixed_offset(),
            end: allocation.interval.end.fixed_offset(),
            energy: allocation.energy,
            rate: allocation.rate,
            cost: allocation.cost,
        }
    }
}

#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_json(path: &Path, report: &impl Serialize) -> Result {
    let file =
        File::create(path).with_context(|| format!("failed to create `{}`", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).context("failed to serialize the report")?;
    writer.flush()?;
    info!("written the report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono_tz::Europe::Stockholm;

    use super::*;
    use crate::core::{
        allocator::{SessionAllocator, UnpricedPolicy},
        batch::{BatchCostCalculator, FailurePolicy},
        session::ChargingSession,
    };

    #[test]
    fn test_write_sessions_report() -> Result {
        let period = PeriodKey::new(2025, 3).unwrap();
        let bucket = HourBucket::floor(Stockholm.with_ymd_and_hms(2025, 3, 24, 1, 0, 0).unwrap());
        let curve =
            PriceCurve::from_rates(period, Stockholm, [(bucket, KilowattHourRate::from(0.5))]);
        let sessions = [
            ChargingSession::new(
                &Stockholm.with_ymd_and_hms(2025, 3, 24, 1, 0, 0).unwrap(),
                &Stockholm.with_ymd_and_hms(2025, 3, 24, 1, 30, 0).unwrap(),
                KilowattHours::from(2.0),
                Stockholm,
            ),
            ChargingSession::new(
                &Stockholm.with_ymd_and_hms(2025, 3, 24, 5, 0, 0).unwrap(),
                &Stockholm.with_ymd_and_hms(2025, 3, 24, 6, 0, 0).unwrap(),
                KilowattHours::from(1.0),
                Stockholm,
            ),
        ];
        let outcome =
            BatchCostCalculator::new(SessionAllocator::new(&curve, UnpricedPolicy::Reject))
                .allocate_all(&sessions);
        let aggregate = outcome.aggregate(FailurePolicy::SubstituteZero);
        let report = SessionsReport::new(
            PriceZone::Se3,
            &curve,
            &CoverageReport::default(),
            &outcome,
            aggregate,
        );

        let directory = tempfile::tempdir()?;
        let path = directory.path().join("report.json");
        write_json(&path, &report)?;
        let json: serde_json::Value = serde_json::from_reader(File::open(&path)?)?;

        assert_eq!(json["period"], "2025-03");
        assert_eq!(json["zone"], "SE3");
        assert_eq!(json["best_effort"], true);
        assert_eq!(json["aggregate"]["total_cost"], 1.0);
        assert_eq!(json["coverage"]["n_priced_hours"], 1);
        assert_eq!(json["sessions"][0]["status"], "priced");
        assert_eq!(json["sessions"][0]["average_power"], 4.0);
        assert_eq!(json["sessions"][0]["breakdown"][0]["start"], "2025-03-24T01:00:00+01:00");
        assert_eq!(json["sessions"][1]["status"], "not-computed");
        assert!(json["sessions"][1]["error"].as_str().unwrap().contains("have no price"));
        Ok(())
    }
}
