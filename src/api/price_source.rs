use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::quantity::rate::KilowattHourRate;

/// Swedish bidding zone.
#[derive(
    Copy,
    Clone,
    Debug,
    Default,
    Eq,
    PartialEq,
    Hash,
    clap::ValueEnum,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
pub enum PriceZone {
    #[display("SE1")]
    #[serde(rename = "SE1")]
    #[value(name = "SE1", alias = "se1")]
    Se1,

    #[display("SE2")]
    #[serde(rename = "SE2")]
    #[value(name = "SE2", alias = "se2")]
    Se2,

    #[default]
    #[display("SE3")]
    #[serde(rename = "SE3")]
    #[value(name = "SE3", alias = "se3")]
    Se3,

    #[display("SE4")]
    #[serde(rename = "SE4")]
    #[value(name = "SE4", alias = "se4")]
    Se4,
}

/// Hourly price record as published, with its own UTC offset.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PublishedPrice {
    pub start: DateTime<FixedOffset>,
    pub rate: KilowattHourRate,
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("no prices are published for the day")]
    NotFound,

    #[error("the source returned no records")]
    Empty,

    #[error("unexpected status: {0}")]
    Status(StatusCode),

    #[error("request failed")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response")]
    Malformed(#[from] serde_json::Error),

    #[error("failed to read the archive")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl SourceError {
    /// Whether another attempt may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout(_) => true,
            Self::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Self::NotFound | Self::Empty | Self::Malformed(_) | Self::Io(_) => false,
        }
    }
}

#[async_trait]
pub trait PriceSource: Sync {
    /// Get the hourly prices published for the day in the zone.
    async fn fetch_daily_prices(
        &self,
        on: NaiveDate,
        zone: PriceZone,
    ) -> Result<Vec<PublishedPrice>, SourceError>;
}
