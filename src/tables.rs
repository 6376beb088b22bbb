use chrono::TimeDelta;
use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use humantime::format_duration;

use crate::{
    core::{
        allocator::AllocationResult,
        batch::{Aggregate, BatchOutcome, SessionStatus},
        curve::PriceCurve,
        summary::DailySummary,
    },
    quantity::rate::KilowattHourRate,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL_CONDENSED)
        .apply_modifier(modifiers::UTF8_ROUND_CORNERS)
        .enforce_styling();
    table
}

fn format_time_delta(delta: TimeDelta) -> String {
    format_duration(delta.to_std().unwrap_or_default()).to_string()
}

const fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Priced => Color::Green,
        SessionStatus::PricedWithGaps => Color::DarkYellow,
        SessionStatus::NotComputed => Color::Red,
    }
}

pub fn build_sessions_table(outcome: &BatchOutcome) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "#", "Date", "Start", "End", "Duration", "Energy", "Power", "Cost", "Status",
    ]);
    for entry in &outcome.entries {
        let session = &entry.session;
        let status = entry.status();
        let (cost, note) = match &entry.outcome {
            Ok(result) => (Cell::new(result.total_cost), Cell::new(status)),
            Err(error) => (Cell::new("n/a"), Cell::new(error)),
        };
        table.add_row(vec![
            Cell::new(entry.index + 1).add_attribute(Attribute::Dim),
            Cell::new(session.start.format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(session.start.format("%H:%M")),
            Cell::new(session.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(format_time_delta(session.duration())).set_alignment(CellAlignment::Right),
            Cell::new(session.energy).set_alignment(CellAlignment::Right),
            session
                .average_power()
                .map_or_else(|| Cell::new("n/a"), Cell::new)
                .add_attribute(Attribute::Dim)
                .set_alignment(CellAlignment::Right),
            cost.set_alignment(CellAlignment::Right),
            note.fg(status_color(status)),
        ]);
    }
    table
}

pub fn build_breakdown_table(result: &AllocationResult) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Hour", "From", "To", "Energy", "Rate", "Cost"]);
    for allocation in &result.breakdown {
        table.add_row(vec![
            Cell::new(allocation.bucket).add_attribute(Attribute::Dim),
            Cell::new(allocation.interval.start.format("%H:%M")),
            Cell::new(allocation.interval.end.format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(allocation.energy).set_alignment(CellAlignment::Right),
            allocation
                .rate
                .map_or_else(|| Cell::new("n/a").fg(Color::DarkYellow), Cell::new)
                .set_alignment(CellAlignment::Right),
            Cell::new(allocation.cost).set_alignment(CellAlignment::Right),
        ]);
    }
    table
}

pub fn build_aggregate_table(aggregate: &Aggregate) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Total cost", "Energy", "Priced", "With gaps", "Failed"]);
    table.add_row(vec![
        Cell::new(aggregate.total_cost).add_attribute(Attribute::Bold).fg(
            if aggregate.is_best_effort() { Color::DarkYellow } else { Color::Reset },
        ),
        Cell::new(aggregate.total_energy),
        Cell::new(aggregate.n_priced).fg(Color::Green),
        Cell::new(aggregate.n_priced_with_gaps).fg(if aggregate.n_priced_with_gaps == 0 {
            Color::Reset
        } else {
            Color::DarkYellow
        }),
        Cell::new(aggregate.n_failed).fg(if aggregate.n_failed == 0 {
            Color::Reset
        } else {
            Color::Red
        }),
    ]);
    table
}

pub fn build_daily_table(days: &[DailySummary]) -> Table {
    let mut table = new_table();
    table.set_header(vec!["Date", "Energy", "Cost", "Unpriced"]);
    for day in days {
        table.add_row(vec![
            Cell::new(day.date.format("%a %b %d")),
            Cell::new(day.energy).set_alignment(CellAlignment::Right),
            Cell::new(day.cost).set_alignment(CellAlignment::Right),
            Cell::new(day.n_unpriced_hours).set_alignment(CellAlignment::Right).fg(
                if day.n_unpriced_hours == 0 { Color::Reset } else { Color::DarkYellow },
            ),
        ]);
    }
    table
}

/// Hourly rates, highlighted against the mean rate.
pub fn build_prices_table(curve: &PriceCurve) -> Table {
    #[expect(clippy::cast_precision_loss)]
    let mean_rate = if curve.is_empty() {
        KilowattHourRate::ZERO
    } else {
        curve.iter().map(|(_, rate)| rate).sum::<KilowattHourRate>() / curve.len() as f64
    };

    let mut table = new_table();
    table.set_header(vec!["Date", "Start", "End", "Rate"]);
    for (bucket, rate) in curve.iter() {
        table.add_row(vec![
            Cell::new(bucket.start().format("%b %d")).add_attribute(Attribute::Dim),
            Cell::new(bucket.start().format("%H:%M %:z")),
            Cell::new(bucket.end().format("%H:%M")).add_attribute(Attribute::Dim),
            Cell::new(rate)
                .set_alignment(CellAlignment::Right)
                .fg(if rate >= mean_rate { Color::Red } else { Color::Green }),
        ]);
    }
    table
}
