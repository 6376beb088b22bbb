//! Offline price source backed by previously downloaded day files.

use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    api::{
        elpriset,
        price_source::{PriceSource, PriceZone, PublishedPrice, SourceError},
    },
    prelude::*,
};

/// Reads `{root}/{YYYY}/{MM-DD}_{ZONE}.json`, the same layout as the online API.
pub struct Api {
    root: PathBuf,
}

impl Api {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl PriceSource for Api {
    #[instrument(skip_all, fields(on = %on, zone = %zone))]
    async fn fetch_daily_prices(
        &self,
        on: NaiveDate,
        zone: PriceZone,
    ) -> Result<Vec<PublishedPrice>, SourceError> {
        let path = self.root.join(elpriset::day_path(on, zone));
        trace!(path = %path.display(), "reading…");
        match tokio::fs::read(&path).await {
            Ok(body) => elpriset::parse_day(&body),
            Err(error) if error.kind() == ErrorKind::NotFound => Err(SourceError::NotFound),
            Err(error) => Err(error.into()),
        }
    }
}
