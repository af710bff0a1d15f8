use chrono::NaiveDate;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::calendar::ActiveDay;
use super::exceptions::{ConflictPolicy, ResolvedDay, resolve};
use super::records::{Hhmm, OperatorCode, ScheduleType, ServiceId, StopType, Tiploc};
use super::schedule::{ScheduleTables, StopRow};
use super::stations::StationTable;
use super::utils::progress_bar_for_count;

/// Disruption figures for one station on one date.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StationSummary {
    pub station_code: Tiploc,
    pub date: NaiveDate,
    pub journeys_scheduled: u32,
    pub journeys_timetabled: u32,
    /// Missing when nothing was timetabled at the station.
    pub pct_timetabled_services_running: Option<f64>,
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One station call of the final schedule for a date.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScheduledStop {
    pub date: NaiveDate,
    pub service_id: ServiceId,
    pub operator: Option<OperatorCode>,
    pub schedule_type: ScheduleType,
    pub station_code: Tiploc,
    pub time: Hhmm,
    pub stop_sequence: u32,
    pub station_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Scheduled as a percentage of timetabled, to 2 decimal places.
pub fn running_percentage(scheduled: u32, timetabled: u32) -> Option<f64> {
    if timetabled == 0 {
        return None;
    }
    let pct = f64::from(scheduled) / f64::from(timetabled) * 100.0;
    // Half-way cases round to even, e.g. 29 of 32 is 90.62
    Some((pct * 100.0).round_ties_even() / 100.0)
}

fn station_stop_counts<'a>(rows: &[&'a StopRow]) -> HashMap<&'a Tiploc, u32> {
    let mut counts: HashMap<&Tiploc, u32> = HashMap::new();
    for row in rows {
        if row.stop.stop_type == StopType::Station {
            *counts.entry(&row.stop.tiploc).or_insert(0) += 1;
        }
    }
    counts
}

/// One row per station stopped at in either the timetable or the final
/// schedule. Stations missing from the reference table are dropped.
pub fn summarise_day(resolved: &ResolvedDay, stations: &StationTable) -> Vec<StationSummary> {
    let timetabled = station_stop_counts(&resolved.timetabled);
    let scheduled = station_stop_counts(&resolved.scheduled);
    let station_codes: HashSet<&Tiploc> = timetabled.keys().chain(scheduled.keys()).copied().collect();

    let mut summaries: Vec<StationSummary> = station_codes
        .into_iter()
        .filter_map(|station_code| {
            let station = stations.get(station_code)?;
            let journeys_scheduled = scheduled.get(station_code).copied().unwrap_or(0);
            let journeys_timetabled = timetabled.get(station_code).copied().unwrap_or(0);
            Some(StationSummary {
                station_code: station_code.clone(),
                date: resolved.date,
                journeys_scheduled,
                journeys_timetabled,
                pct_timetabled_services_running: running_percentage(
                    journeys_scheduled,
                    journeys_timetabled,
                ),
                station_name: station.name.clone(),
                latitude: station.latitude,
                longitude: station.longitude,
            })
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.journeys_timetabled
            .cmp(&a.journeys_timetabled)
            .then_with(|| a.station_code.cmp(&b.station_code))
    });
    summaries
}

pub fn summarise_date(
    tables: &ScheduleTables,
    date: NaiveDate,
    stations: &StationTable,
    policy: ConflictPolicy,
) -> Vec<StationSummary> {
    let active = ActiveDay::on(tables, date);
    summarise_day(&resolve(&active, policy), stations)
}

/// Summaries for every date, concatenated in the order the dates are given.
/// Dates are resolved independently and in parallel.
pub fn summarise_range(
    tables: &ScheduleTables,
    dates: &[NaiveDate],
    stations: &StationTable,
    policy: ConflictPolicy,
) -> Vec<StationSummary> {
    info!("Resolving {} dates...", dates.len());
    let progress = progress_bar_for_count(dates.len());
    let per_date: Vec<Vec<StationSummary>> = dates
        .par_iter()
        .progress_with(progress)
        .map(|date| summarise_date(tables, *date, stations, policy))
        .collect();
    per_date.into_iter().flatten().collect()
}

/// The final schedule for a date at known stations, in resolved order.
pub fn scheduled_stops(resolved: &ResolvedDay, stations: &StationTable) -> Vec<ScheduledStop> {
    resolved
        .scheduled
        .iter()
        .filter(|row| row.stop.stop_type == StopType::Station)
        .filter_map(|row| {
            let station = stations.get(&row.stop.tiploc)?;
            Some(ScheduledStop {
                date: resolved.date,
                service_id: row.header().service_id.clone(),
                operator: row.service.operator.clone(),
                schedule_type: row.header().schedule_type,
                station_code: row.stop.tiploc.clone(),
                time: row.stop.time.clone(),
                stop_sequence: row.stop.stop_sequence,
                station_name: station.name.clone(),
                latitude: station.latitude,
                longitude: station.longitude,
            })
        })
        .collect()
}
