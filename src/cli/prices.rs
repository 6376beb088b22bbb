use chrono::NaiveDate;
use clap::Parser;

use crate::{
    cli::PriceArgs,
    core::{curve::PriceCurve, instant::HourBucket, period::PeriodKey},
    prelude::*,
    tables::build_prices_table,
};

#[derive(Parser)]
pub struct PricesArgs {
    /// Day as `YYYY-MM-DD`.
    date: NaiveDate,
}

impl PricesArgs {
    #[instrument(skip_all, fields(date = %self.date, zone = %prices.zone))]
    pub async fn run(&self, prices: &PriceArgs) -> Result {
        let source = prices.source()?;
        let fetch = source.fetch_daily_prices(self.date, prices.zone);
        let published = tokio::time::timeout(prices.fetch_timeout(), fetch)
            .await
            .context("timed out")?
            .with_context(|| format!("failed to fetch the prices for {}", self.date))?;
        ensure!(!published.is_empty(), "no prices are published for {}", self.date);

        let curve = PriceCurve::from_rates(
            PeriodKey::of_date(self.date),
            prices.timezone,
            published
                .into_iter()
                .map(|price| (HourBucket::from_published(price.start, prices.timezone), price.rate)),
        );
        info!(n_hours = curve.len(), "fetched");
        println!("{}", build_prices_table(&curve));
        Ok(())
    }
}
