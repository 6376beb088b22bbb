//! [Elpriset just nu](https://www.elprisetjustnu.se/elpris-api) day-ahead prices.

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, FixedOffset, NaiveDate, TimeDelta};
use http::StatusCode;
use itertools::Itertools;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    api::{
        client,
        price_source::{PriceSource, PriceZone, PublishedPrice, SourceError},
    },
    prelude::*,
    quantity::rate::KilowattHourRate,
};

const BASE_URL: &str = "https://www.elprisetjustnu.se/api/v1/prices";

pub struct Api(Client);

impl Api {
    pub fn try_new() -> Result<Self> {
        Ok(Self(client::try_new()?))
    }
}

/// Relative path of the day's file, shared with the offline archive.
pub fn day_path(on: NaiveDate, zone: PriceZone) -> String {
    format!("{}/{}_{zone}.json", on.format("%Y"), on.format("%m-%d"))
}

#[async_trait]
impl PriceSource for Api {
    #[instrument(skip_all, fields(on = %on, zone = %zone))]
    async fn fetch_daily_prices(
        &self,
        on: NaiveDate,
        zone: PriceZone,
    ) -> Result<Vec<PublishedPrice>, SourceError> {
        let url = format!("{BASE_URL}/{}", day_path(on, zone));
        debug!(url, "fetching…");
        let response = self.0.get(&url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => return Err(SourceError::NotFound),
            status if !status.is_success() => return Err(SourceError::Status(status)),
            _ => {}
        }
        let prices = parse_day(&response.bytes().await?)?;
        debug!(n_prices = prices.len(), "fetched");
        Ok(prices)
    }
}

/// Parse a day's payload into hourly records.
///
/// Since October 2025 the prices are published per quarter hour. These are averaged into one record
/// per hour, weighted by the duration of each record.
pub fn parse_day(body: &[u8]) -> Result<Vec<PublishedPrice>, SourceError> {
    let mut records: Vec<Record> = serde_json::from_slice(body)?;
    records.sort_by_key(|record| record.time_start);
    Ok(records
        .into_iter()
        .chunk_by(Record::hour)
        .into_iter()
        .map(|(start, records)| {
            let (n_records, seconds, weighted) =
                records.fold((0_u32, 0.0, 0.0), |(n_records, seconds, weighted), record| {
                    let duration = record.duration().as_seconds_f64();
                    (n_records + 1, seconds + duration, weighted + duration * record.rate)
                });
            let rate = if seconds > 0.0 { weighted / seconds } else { weighted / f64::from(n_records) };
            PublishedPrice { start, rate: KilowattHourRate::from(rate) }
        })
        .collect())
}

#[derive(Deserialize)]
struct Record {
    #[serde(rename = "SEK_per_kWh")]
    rate: f64,

    time_start: DateTime<FixedOffset>,
    time_end: DateTime<FixedOffset>,
}

impl Record {
    fn hour(&self) -> DateTime<FixedOffset> {
        self.time_start.duration_trunc(TimeDelta::hours(1)).unwrap_or(self.time_start)
    }

    fn duration(&self) -> TimeDelta {
        self.time_end - self.time_start
    }
}
