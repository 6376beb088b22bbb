use std::{fs::File, path::PathBuf, sync::atomic::AtomicBool};

use clap::Parser;

use crate::{
    cli::PriceArgs,
    core::{
        allocator::{SessionAllocator, UnpricedPolicy},
        batch::{BatchCostCalculator, FailurePolicy},
        builder::CurveBuild,
        summary::daily_summary,
        validator::single_period,
    },
    ingest::read_hourly_consumption,
    prelude::*,
    report::{ConsumptionReport, Coverage, write_json},
    tables::{build_aggregate_table, build_daily_table},
};

#[derive(Parser)]
pub struct ConsumptionArgs {
    /// Hourly meter export: two header lines, then `YYYY-MM-DD HH:MM;kWh` rows.
    path: PathBuf,

    /// What to do with a reading in an hour without a price.
    #[clap(long, env = "UNPRICED_POLICY", default_value = "reject")]
    unpriced: UnpricedPolicy,

    /// Also write the daily totals as JSON.
    #[clap(long, env = "JSON_REPORT")]
    json: Option<PathBuf>,
}

impl ConsumptionArgs {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn run(&self, prices: &PriceArgs, cancellation: &AtomicBool) -> Result {
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open `{}`", self.path.display()))?;
        let readings = read_hourly_consumption(file, prices.timezone)?;

        // The last reading of the month ends at the next month's midnight.
        let period = single_period(readings.iter().map(|reading| reading.start))?;
        info!(%period, n_readings = readings.len(), "computing…");

        let CurveBuild { curve, coverage } = prices.build_curve(period, cancellation).await?;
        let allocator =
            SessionAllocator::new(&curve, self.unpriced).with_observer(prices.observer());
        let outcome = BatchCostCalculator::new(allocator).allocate_all(&readings);
        let n_failures = outcome.failures().count();
        if n_failures != 0 {
            warn!(n_failures, "some readings are not computed");
        }

        let days = daily_summary(outcome.results());
        println!("{}", build_daily_table(&days));
        let aggregate = outcome.aggregate(FailurePolicy::Exclude);
        println!("{}", build_aggregate_table(&aggregate));
        info!(total_cost = %aggregate.total_cost, total_energy = %aggregate.total_energy, "computed");

        if let Some(path) = &self.json {
            let report = ConsumptionReport {
                period,
                zone: prices.zone,
                coverage: Coverage::new(&curve, &coverage),
                aggregate,
                days,
            };
            write_json(path, &report)?;
        }
        Ok(())
    }
}
