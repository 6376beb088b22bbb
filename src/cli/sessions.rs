use std::{fs::File, path::PathBuf, sync::atomic::AtomicBool};

use clap::Parser;

use crate::{
    cli::PriceArgs,
    core::{
        allocator::{SessionAllocator, UnpricedPolicy},
        batch::{BatchCostCalculator, FailurePolicy},
        builder::CurveBuild,
        period::PeriodKey,
        validator::validate_single_period,
    },
    ingest::read_sessions,
    prelude::*,
    report::{SessionsReport, write_json},
    tables::{build_aggregate_table, build_breakdown_table, build_sessions_table},
};

#[derive(Parser)]
pub struct SessionsArgs {
    /// CSV file with the `Start`, `End`, and `Consumption` columns.
    path: PathBuf,

    #[clap(long, env = "CSV_DELIMITER", default_value = ";")]
    delimiter: char,

    /// What to do with a session overlapping an hour without a price.
    #[clap(long, env = "UNPRICED_POLICY", default_value = "reject")]
    unpriced: UnpricedPolicy,

    /// How failed sessions enter the total.
    #[clap(long, env = "FAILURE_POLICY", default_value = "exclude")]
    failures: FailurePolicy,

    /// Billing month as `YYYY-MM`, skipping the single-month check of the sessions.
    #[clap(long)]
    period: Option<PeriodKey>,

    /// Print the hourly breakdown of each session.
    #[clap(long)]
    breakdown: bool,

    /// Also write the full report as JSON.
    #[clap(long, env = "JSON_REPORT")]
    json: Option<PathBuf>,
}

impl SessionsArgs {
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub async fn run(&self, prices: &PriceArgs, cancellation: &AtomicBool) -> Result {
        let delimiter =
            u8::try_from(self.delimiter).context("the delimiter must be a single-byte character")?;
        let file = File::open(&self.path)
            .with_context(|| format!("failed to open `{}`", self.path.display()))?;
        let sessions = read_sessions(file, delimiter, prices.timezone)?;

        let period = if let Some(period) = self.period {
            warn!(%period, "the billing period is overridden");
            period
        } else {
            validate_single_period(&sessions)?
        };
        info!(%period, n_sessions = sessions.len(), "computing…");

        let CurveBuild { curve, coverage } = prices.build_curve(period, cancellation).await?;
        let allocator =
            SessionAllocator::new(&curve, self.unpriced).with_observer(prices.observer());
        let outcome = BatchCostCalculator::new(allocator).allocate_all(&sessions);
        for (index, failure) in outcome.failures() {
            warn!(index, %failure, "session is not computed");
        }

        if self.breakdown {
            for result in outcome.results() {
                println!("{}", build_breakdown_table(result));
            }
        }
        println!("{}", build_sessions_table(&outcome));

        let aggregate = outcome.aggregate(self.failures);
        if aggregate.is_best_effort() {
            warn!(n_substituted = aggregate.n_substituted, "the total is a best-effort estimate");
        }
        println!("{}", build_aggregate_table(&aggregate));
        info!(total_cost = %aggregate.total_cost, total_energy = %aggregate.total_energy, "computed");

        if let Some(path) = &self.json {
            let report = SessionsReport::new(prices.zone, &curve, &coverage, &outcome, aggregate);
            write_json(path, &report)?;
        }
        Ok(())
    }
}
