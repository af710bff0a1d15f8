use chrono::NaiveDate;
use indicatif::ParallelProgressIterator;
use rayon::prelude::*;
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info};

use super::error::ParseError;
use super::records::{
    OperatorCode, Record, RecordIdentifier, RecordParser, ScheduleHeader, ScheduleType, ServiceId,
    StopEvent, timetable_start,
};
use super::utils::progress_bar_for_count;

/// Calendar and operator of one schedule, shared by all of its stop rows.
#[derive(Debug, PartialEq, Eq)]
pub struct ServiceContext {
    pub header: ScheduleHeader,
    pub operator: Option<OperatorCode>,
}

/// One location visit of one schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopRow {
    pub service: Arc<ServiceContext>,
    pub stop: StopEvent,
}

impl StopRow {
    pub fn header(&self) -> &ScheduleHeader {
        &self.service.header
    }
}

/// A schedule withdrawn for the dates its calendar covers. Has no stops.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancellationRow {
    pub header: ScheduleHeader,
}

/// Service ids are reused across P/N/O/C variants, so a schedule is only
/// identified by its id together with its type and validity window.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleKey {
    pub service_id: ServiceId,
    pub schedule_type: ScheduleType,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
}

impl From<&ScheduleHeader> for ScheduleKey {
    fn from(header: &ScheduleHeader) -> Self {
        ScheduleKey {
            service_id: header.service_id.clone(),
            schedule_type: header.schedule_type,
            valid_from: header.valid_from,
            valid_to: header.valid_to,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScheduleTables {
    pub stops: Vec<StopRow>,
    pub cancellations: Vec<CancellationRow>,
}

impl ScheduleTables {
    fn extend(&mut self, other: ScheduleTables) {
        self.stops.extend(other.stops);
        self.cancellations.extend(other.cancellations);
    }

    /// Distinct schedules with at least one stop or a cancellation.
    pub fn schedule_keys(&self) -> HashSet<ScheduleKey> {
        self.stops
            .iter()
            .map(|row| ScheduleKey::from(row.header()))
            .chain(self.cancellations.iter().map(|row| ScheduleKey::from(&row.header)))
            .collect()
    }
}

struct OpenSchedule {
    header: ScheduleHeader,
    operator: Option<OperatorCode>,
    context: Option<Arc<ServiceContext>>,
}

/// Folds records into tables, carrying the current schedule header from one
/// record to the next.
#[derive(Default)]
pub struct ScheduleAccumulator {
    current: Option<OpenSchedule>,
    tables: ScheduleTables,
}

impl ScheduleAccumulator {
    pub fn push(&mut self, line: usize, record: Record) -> Result<(), ParseError> {
        match record {
            Record::ScheduleHeader(header) => {
                self.current = Some(OpenSchedule {
                    header,
                    operator: None,
                    context: None,
                });
            }
            Record::Cancellation(header) => {
                self.tables.cancellations.push(CancellationRow { header });
                self.current = None;
            }
            Record::ExtraDetails(extra) => match self.current.as_mut() {
                Some(open) => {
                    open.operator = extra.operator;
                    open.context = None;
                }
                None => debug!("Ignoring BX record on line {line} outside a schedule"),
            },
            Record::Stop(stop) => {
                let Some(OpenSchedule {
                    header,
                    operator,
                    context,
                }) = self.current.as_mut()
                else {
                    return Err(ParseError::MissingHeaderContext {
                        line,
                        record_type: stop.position.record_type().as_str().to_string(),
                    });
                };
                let service = Arc::clone(context.get_or_insert_with(|| {
                    Arc::new(ServiceContext {
                        header: header.clone(),
                        operator: operator.clone(),
                    })
                }));
                self.tables.stops.push(StopRow { service, stop });
            }
        }
        Ok(())
    }

    pub fn finish(self) -> ScheduleTables {
        self.tables
    }
}

/// Builds tables from a record stream, failing on the first bad record.
pub fn from_records<I>(records: I) -> Result<ScheduleTables, ParseError>
where
    I: IntoIterator<Item = Result<(usize, Record), ParseError>>,
{
    let mut accumulator = ScheduleAccumulator::default();
    for parsed in records {
        let (line, record) = parsed?;
        accumulator.push(line, record)?;
    }
    Ok(accumulator.finish())
}

/// Splits lines at every basic schedule. The first group starts at index 0
/// even if it isn't a basic schedule, so nothing is dropped.
fn schedule_groups<'a>(lines: &'a [&'a str]) -> Vec<(usize, &'a [&'a str])> {
    let starts: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(i, line)| *i == 0 || RecordIdentifier::from_line(line) == RecordIdentifier::BS)
        .map(|(i, _)| i)
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(k, &start)| {
            let end = starts.get(k + 1).copied().unwrap_or(lines.len());
            (start, &lines[start..end])
        })
        .collect()
}

/// Parses a whole feed into stop and cancellation tables.
///
/// Leading header lines are skipped, the rest is split into per-schedule
/// groups which are parsed in parallel and merged back in feed order. Any
/// bad line fails the whole build; no partial tables are returned.
pub fn build_tables(lines: &[&str]) -> Result<ScheduleTables, ParseError> {
    let start = timetable_start(lines);
    let timetable = &lines[start..];
    let groups = schedule_groups(timetable);
    info!(
        "Parsing {} schedule groups from {} timetable lines...",
        groups.len(),
        timetable.len()
    );

    let progress = progress_bar_for_count(groups.len());
    let group_tables = groups
        .par_iter()
        .progress_with(progress)
        .map(|(offset, group)| from_records(RecordParser::new(group, start + offset + 1)))
        .collect::<Result<Vec<ScheduleTables>, ParseError>>()?;

    let mut tables = ScheduleTables::default();
    for group in group_tables {
        tables.extend(group);
    }
    info!(
        "Built {} stop rows and {} cancellations",
        tables.stops.len(),
        tables.cancellations.len()
    );
    debug!("{} distinct schedules", tables.schedule_keys().len());
    Ok(tables)
}
