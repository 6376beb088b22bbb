#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

mod api;
mod cli;
mod core;
mod ingest;
mod prelude;
mod quantity;
mod report;
mod tables;

use std::sync::{Arc, atomic::AtomicBool};

use clap::{Parser, crate_version};
use signal_hook::consts::{SIGINT, SIGTERM};
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use crate::{cli::Args, prelude::*};

#[tokio::main]
async fn main() -> Result {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy(),
        )
        .without_time()
        .compact()
        .init();
    info!(version = crate_version!(), "starting…");

    // The first signal stops fetching further days, the second one terminates right away.
    let cancellation = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(&cancellation))?;
        signal_hook::flag::register(signal, Arc::clone(&cancellation))?;
    }

    let args = Args::parse();
    args.command.run(&args.prices, &cancellation).await?;

    info!("done!");
    Ok(())
}
