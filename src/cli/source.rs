use std::{path::PathBuf, sync::atomic::AtomicBool, time::Duration};

use chrono_tz::Tz;
use clap::Parser;

use crate::{
    api::{Archive, Elpriset, PriceSource, PriceZone},
    core::{
        builder::{CurveBuild, PriceCurveBuilder},
        instant::has_whole_hour_shifts,
        observer::{Observer, Silent, Traced},
        period::PeriodKey,
    },
    prelude::*,
};

#[derive(Parser)]
pub struct PriceArgs {
    /// Bidding zone.
    #[clap(long, env = "PRICE_ZONE", default_value = "SE3", global = true)]
    pub zone: PriceZone,

    /// Timezone for the calendar: billing months, days, and local timestamps.
    #[clap(
        long,
        env = "TIMEZONE",
        default_value = "Europe/Stockholm",
        value_parser = parse_timezone,
        global = true
    )]
    pub timezone: Tz,

    /// Read the prices from a directory of downloaded day files instead of the online API.
    #[clap(long, env = "PRICE_ARCHIVE", global = true)]
    pub price_archive: Option<PathBuf>,

    /// Timeout of each attempt to fetch a day.
    #[clap(long, env = "FETCH_TIMEOUT", default_value = "10s", global = true)]
    pub fetch_timeout: humantime::Duration,

    #[clap(long, env = "FETCH_ATTEMPTS", default_value = "3", global = true)]
    pub fetch_attempts: u32,

    /// Delay before the first retry, growing linearly with each next one.
    #[clap(long, env = "RETRY_DELAY", default_value = "1s", global = true)]
    pub retry_delay: humantime::Duration,

    /// Maximum number of days fetched at once.
    #[clap(long, env = "FETCH_CONCURRENCY", default_value = "4", global = true)]
    pub fetch_concurrency: usize,

    /// Log every allocated hour and fetched day.
    #[clap(long, env = "TRACE_BUCKETS", global = true)]
    pub trace_buckets: bool,
}

fn parse_timezone(name: &str) -> Result<Tz> {
    let timezone = name.parse::<Tz>().map_err(|error| anyhow!("{error}"))?;
    ensure!(
        has_whole_hour_shifts(timezone),
        "`{name}` shifts its clocks by a fraction of an hour, which breaks the hourly prices",
    );
    Ok(timezone)
}

impl PriceArgs {
    pub fn source(&self) -> Result<Box<dyn PriceSource>> {
        match &self.price_archive {
            Some(root) => {
                info!(root = %root.display(), "using the offline archive");
                Ok(Box::new(Archive::new(root)))
            }
            None => Ok(Box::new(Elpriset::try_new()?)),
        }
    }

    pub fn observer(&self) -> &'static dyn Observer {
        if self.trace_buckets { &Traced } else { &Silent }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout.into()
    }

    /// Fetch the price curve of the period and report its coverage.
    pub async fn build_curve(
        &self,
        period: PeriodKey,
        cancellation: &AtomicBool,
    ) -> Result<CurveBuild> {
        let source = self.source()?;
        let build = PriceCurveBuilder::builder()
            .source(source.as_ref())
            .zone(self.zone)
            .timezone(self.timezone)
            .observer(self.observer())
            .timeout(self.fetch_timeout())
            .max_attempts(self.fetch_attempts)
            .retry_delay(self.retry_delay.into())
            .concurrency(self.fetch_concurrency)
            .cancellation(cancellation)
            .build()
            .build(period)
            .await?;
        if build.coverage.is_complete() {
            info!(n_days = build.coverage.fetched.len(), "prices are complete");
        } else {
            warn!(
                n_fetched_days = build.coverage.fetched.len(),
                n_skipped_days = build.coverage.skipped.len(),
                n_cancelled_days = build.coverage.cancelled.len(),
                n_missing_hours = build.curve.missing_buckets().len(),
                "prices are incomplete",
            );
        }
        Ok(build)
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::Europe::Stockholm;
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Args {
        #[clap(flatten)]
        prices: PriceArgs,
    }

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["spotcharge"]).prices;
        assert_eq!(args.zone, PriceZone::Se3);
        assert_eq!(args.timezone, Stockholm);
        assert_eq!(args.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(args.fetch_attempts, 3);
        assert_eq!(args.fetch_concurrency, 4);
        assert!(args.price_archive.is_none());
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "spotcharge",
            "--zone",
            "SE4",
            "--timezone",
            "UTC",
            "--fetch-timeout",
            "1m 30s",
        ])
        .prices;
        assert_eq!(args.zone, PriceZone::Se4);
        assert_eq!(args.timezone, Tz::UTC);
        assert_eq!(args.fetch_timeout(), Duration::from_secs(90));
    }

    #[test]
    fn test_rejects_half_hour_dst_zone() {
        let result = Args::try_parse_from(["spotcharge", "--timezone", "Australia/Lord_Howe"]);
        assert!(result.is_err());
    }
}
