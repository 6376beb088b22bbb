use std::time::Duration;

use reqwest::Client;

use crate::prelude::*;

/// Build the shared HTTP client.
pub fn try_new() -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(10))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
