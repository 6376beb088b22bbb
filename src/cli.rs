mod consumption;
mod prices;
mod sessions;
mod source;

use std::sync::atomic::AtomicBool;

use clap::{Parser, Subcommand};

pub use self::source::PriceArgs;
use crate::{
    cli::{consumption::ConsumptionArgs, prices::PricesArgs, sessions::SessionsArgs},
    prelude::*,
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
#[must_use]
pub struct Args {
    #[clap(flatten)]
    pub prices: PriceArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Main command: compute the cost of every charging session in a CSV file.
    Sessions(Box<SessionsArgs>),

    /// Compute the daily cost of an hourly consumption export.
    Consumption(Box<ConsumptionArgs>),

    /// Print the hourly prices of a single day.
    Prices(PricesArgs),
}

impl Command {
    pub async fn run(self, prices: &PriceArgs, cancellation: &AtomicBool) -> Result {
        match self {
            Self::Sessions(args) => args.run(prices, cancellation).await,
            Self::Consumption(args) => args.run(prices, cancellation).await,
            Self::Prices(args) => args.run(prices).await,
        }
    }
}
