//! Session and meter reading files.

use std::io;

use chrono::{DateTime, MappedLocalTime, NaiveDateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::{
    core::{
        instant::{Instant, normalize},
        session::ChargingSession,
    },
    prelude::*,
    quantity::energy::KilowattHours,
};

/// Accepted local timestamp formats, tried in order.
const LOCAL_FORMATS: [&str; 4] =
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"];

/// Lines preceding the readings in a meter export.
const N_METER_HEADER_LINES: usize = 2;

#[derive(Deserialize)]
struct SessionRecord {
    #[serde(rename = "Start")]
    start: String,

    #[serde(rename = "End")]
    end: String,

    /// Kilowatt-hours.
    #[serde(rename = "Consumption")]
    consumption: String,
}

/// Read charging sessions with the `Start`, `End`, and `Consumption` columns.
#[instrument(skip_all)]
pub fn read_sessions(
    reader: impl io::Read,
    delimiter: u8,
    timezone: Tz,
) -> Result<Vec<ChargingSession>> {
    let sessions = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize::<SessionRecord>()
        .enumerate()
        .map(|(index, record)| {
            // The header takes the first line.
            let line = index + 2;
            let record = record.with_context(|| format!("failed to read line {line}"))?;
            let start = parse_timestamp(&record.start, timezone)
                .with_context(|| format!("invalid start time on line {line}"))?;
            let end = parse_timestamp(&record.end, timezone)
                .with_context(|| format!("invalid end time on line {line}"))?;
            let energy = parse_decimal(&record.consumption)
                .with_context(|| format!("invalid consumption on line {line}"))?;
            Ok(ChargingSession::new(&start, &end, energy, timezone))
        })
        .collect::<Result<Vec<_>>>()?;
    info!(n_sessions = sessions.len(), "read the sessions");
    Ok(sessions)
}

/// Read an hourly meter export: two header lines followed by `YYYY-MM-DD HH:MM;kWh` rows.
///
/// Every reading becomes a one-hour session. A repeated local hour on the fall-back day maps onto the
/// second occurrence of that hour.
#[instrument(skip_all)]
pub fn read_hourly_consumption(
    reader: impl io::Read,
    timezone: Tz,
) -> Result<Vec<ChargingSession>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut sessions: Vec<ChargingSession> = Vec::new();
    for (index, record) in reader.records().enumerate().skip(N_METER_HEADER_LINES) {
        let line = index + 1;
        let record = record.with_context(|| format!("failed to read line {line}"))?;
        let (Some(timestamp), Some(energy)) = (record.get(0), record.get(1)) else {
            bail!("expected a timestamp and a reading on line {line}");
        };
        let previous = sessions.last().map(|session| session.start);
        let start = parse_reading_start(timestamp, timezone, previous)
            .with_context(|| format!("invalid timestamp on line {line}"))?;
        let energy =
            parse_decimal(energy).with_context(|| format!("invalid reading on line {line}"))?;
        let end = start + TimeDelta::hours(1);
        sessions.push(ChargingSession::new(&start, &end, energy, timezone));
    }
    info!(n_readings = sessions.len(), "read the meter readings");
    Ok(sessions)
}

/// Parse an RFC 3339 timestamp, or a local one in the canonical timezone.
///
/// An ambiguous local time resolves to the earlier instant.
pub fn parse_timestamp(text: &str, timezone: Tz) -> Result<Instant> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(text) {
        return Ok(normalize(&timestamp, timezone));
    }
    match timezone.from_local_datetime(&parse_local(text)?) {
        MappedLocalTime::Single(instant) | MappedLocalTime::Ambiguous(instant, _) => Ok(instant),
        MappedLocalTime::None => bail!("`{text}` does not exist in {timezone}"),
    }
}

fn parse_reading_start(text: &str, timezone: Tz, previous: Option<Instant>) -> Result<Instant> {
    if let Ok(local) = parse_local(text)
        && let MappedLocalTime::Ambiguous(earliest, latest) = timezone.from_local_datetime(&local)
        && previous.is_some_and(|previous| previous >= earliest)
    {
        return Ok(latest);
    }
    parse_timestamp(text, timezone)
}

fn parse_local(text: &str) -> Result<NaiveDateTime> {
    LOCAL_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .with_context(|| format!("unrecognized timestamp: `{text}`"))
}

/// Parse kilowatt-hours, accepting a decimal comma.
fn parse_decimal(text: &str) -> Result<KilowattHours> {
    let value: f64 = text.replace(',', ".").parse().with_context(|| format!("`{text}`"))?;
    Ok(KilowattHours::from(value))
}
