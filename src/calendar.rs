use chrono::{Datelike, NaiveDate};
use tracing::debug;

use super::records::{ScheduleHeader, ScheduleType};
use super::schedule::{CancellationRow, ScheduleTables, StopRow};

/// A target date together with the day after it. Journeys starting between
/// 00:00 and 01:59 are keyed by the feed to the civil date they depart on,
/// but count towards the previous day's service, so resolving `date` looks
/// them up with the calendar of `next`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceDay {
    pub date: NaiveDate,
    pub next: Option<NaiveDate>,
}

impl ServiceDay {
    pub fn new(date: NaiveDate) -> Self {
        ServiceDay {
            date,
            next: date.succ_opt(),
        }
    }
}

/// Validity window and day mask test. A window with `valid_from` after
/// `valid_to` never matches.
pub fn runs_on(header: &ScheduleHeader, date: NaiveDate) -> bool {
    header.valid_from <= date && date <= header.valid_to && header.days.runs_on(date.weekday())
}

fn runs_on_next(header: &ScheduleHeader, day: &ServiceDay) -> bool {
    day.next.is_some_and(|next| runs_on(header, next))
}

pub fn stop_is_active(row: &StopRow, day: &ServiceDay) -> bool {
    if row.stop.small_hours {
        runs_on_next(row.header(), day)
    } else {
        runs_on(row.header(), day.date)
    }
}

/// Cancellations have no times, so they may target either the nominal
/// service day or its small-hours continuation.
pub fn cancellation_is_active(row: &CancellationRow, day: &ServiceDay) -> bool {
    runs_on(&row.header, day.date) || runs_on_next(&row.header, day)
}

pub fn active_stops<'a>(
    tables: &'a ScheduleTables,
    date: NaiveDate,
    schedule_types: &[ScheduleType],
) -> Vec<&'a StopRow> {
    let day = ServiceDay::new(date);
    tables
        .stops
        .iter()
        .filter(|row| schedule_types.contains(&row.header().schedule_type))
        .filter(|row| stop_is_active(row, &day))
        .collect()
}

pub fn active_cancellations(tables: &ScheduleTables, date: NaiveDate) -> Vec<&CancellationRow> {
    let day = ServiceDay::new(date);
    tables
        .cancellations
        .iter()
        .filter(|row| cancellation_is_active(row, &day))
        .collect()
}

/// Every row of the tables that applies to one date, before exceptions.
#[derive(Debug)]
pub struct ActiveDay<'a> {
    pub date: NaiveDate,
    pub stops: Vec<&'a StopRow>,
    pub cancellations: Vec<&'a CancellationRow>,
}

impl<'a> ActiveDay<'a> {
    pub fn on(tables: &'a ScheduleTables, date: NaiveDate) -> Self {
        let stops = active_stops(
            tables,
            date,
            &[
                ScheduleType::Permanent,
                ScheduleType::New,
                ScheduleType::Overlay,
            ],
        );
        let cancellations = active_cancellations(tables, date);
        debug!(
            "{date}: {} active stop rows, {} active cancellations",
            stops.len(),
            cancellations.len()
        );
        ActiveDay {
            date,
            stops,
            cancellations,
        }
    }
}

/// Dates from `start` to `end`, both inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|date| *date <= end).collect()
}

/// `no_days` consecutive dates beginning at `start`.
pub fn date_range_from_count(start: NaiveDate, no_days: u32) -> Vec<NaiveDate> {
    start.iter_days().take(no_days as usize).collect()
}
