use anyhow::Result;
use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::{convert::Infallible, ops::Range, str::FromStr};
use tracing::info;

use super::error::ParseError;

/// Reads a whole CIF (MCA) timetable file into memory.
pub fn read_file(file_path: &str) -> Result<String> {
    info!("Reading timetable from {file_path}");
    Ok(fs_err::read_to_string(file_path)?)
}

/// Splits raw CIF text into lines, dropping carriage returns.
pub fn split_lines(raw_cif_text: &str) -> Vec<&str> {
    let cif_lines: Vec<&str> = raw_cif_text.lines().collect();
    info!("Number of lines: {}", cif_lines.len());
    cif_lines
}

/// Index of the first basic schedule line. Everything before it is feed
/// header data (HD, TI, TA, ...) with no calendar content.
///
/// A feed with no basic schedule at all skips nothing, so any stray stop
/// lines are still reported rather than silently dropped.
pub fn timetable_start(lines: &[&str]) -> usize {
    lines
        .iter()
        .position(|line| RecordIdentifier::from_line(line) == RecordIdentifier::BS)
        .unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    ScheduleHeader(ScheduleHeader),
    Cancellation(ScheduleHeader),
    ExtraDetails(ExtraDetails),
    Stop(StopEvent),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIdentifier {
    BS, // Basic Schedule
    BX, // Basic Schedule Extra Details
    LO, // Location Origin
    LI, // Location Intermediate
    LT, // Location Terminate
    Other,
}

impl FromStr for RecordIdentifier {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BS" => Ok(RecordIdentifier::BS),
            "BX" => Ok(RecordIdentifier::BX),
            "LO" => Ok(RecordIdentifier::LO),
            "LI" => Ok(RecordIdentifier::LI),
            "LT" => Ok(RecordIdentifier::LT),
            _ => Ok(RecordIdentifier::Other),
        }
    }
}

impl RecordIdentifier {
    pub fn from_line(line: &str) -> Self {
        line.get(0..2)
            .and_then(|prefix| prefix.parse().ok())
            .unwrap_or(RecordIdentifier::Other)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordIdentifier::BS => "BS",
            RecordIdentifier::BX => "BX",
            RecordIdentifier::LO => "LO",
            RecordIdentifier::LI => "LI",
            RecordIdentifier::LT => "LT",
            RecordIdentifier::Other => "??",
        }
    }
}

/// Bounds-checked access to the fixed-width columns of one feed line.
struct FixedWidth<'l> {
    line: &'l str,
    line_number: usize,
    record_type: RecordIdentifier,
}

impl<'l> FixedWidth<'l> {
    fn new(line: &'l str, line_number: usize, record_type: RecordIdentifier) -> Self {
        FixedWidth {
            line,
            line_number,
            record_type,
        }
    }

    fn require(&self, min_len: usize) -> Result<(), ParseError> {
        if self.line.len() < min_len {
            return Err(self.malformed(format!(
                "expected at least {min_len} characters, found {}",
                self.line.len()
            )));
        }
        Ok(())
    }

    fn field(&self, range: Range<usize>) -> Result<&'l str, ParseError> {
        let end = range.end;
        self.line.get(range).ok_or_else(|| {
            self.malformed(format!(
                "expected at least {end} characters, found {}",
                self.line.len()
            ))
        })
    }

    fn malformed(&self, reason: impl Into<String>) -> ParseError {
        ParseError::malformed(self.line_number, self.record_type.as_str(), reason)
    }
}

/// Train service code shared by every STP variant of one logical service.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct ServiceId(pub String);

/// Timing point location code.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize)]
pub struct Tiploc(pub String);

impl Tiploc {
    /// Takes the token before the first space of a location field.
    fn from_location_field(s: &str) -> Self {
        Tiploc(s.split(' ').next().unwrap_or_default().to_string())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Hash, Serialize)]
pub struct OperatorCode(pub String);

/// Schedule type, taken from the STP indicator of a basic schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ScheduleType {
    #[serde(rename = "P")]
    Permanent,
    #[serde(rename = "N")]
    New,
    #[serde(rename = "O")]
    Overlay,
    #[serde(rename = "C")]
    Cancelled,
}

impl ScheduleType {
    fn from_flag(flag: &str) -> Option<Self> {
        match flag {
            "P" => Some(ScheduleType::Permanent),
            "N" => Some(ScheduleType::New),
            "O" => Some(ScheduleType::Overlay),
            "C" => Some(ScheduleType::Cancelled),
            _ => None,
        }
    }
}

/// Days of the week a schedule runs, Monday first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DayMask(pub [bool; 7]);

impl DayMask {
    fn from_cif_str(s: &str) -> Option<Self> {
        // Example input "1111100"
        if s.len() != 7 {
            return None;
        }
        let mut days = [false; 7];
        for (i, c) in s.chars().enumerate() {
            match c {
                '1' => days[i] = true,
                '0' => {}
                _ => return None,
            }
        }
        Some(DayMask(days))
    }

    pub fn runs_on(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_monday() as usize]
    }
}

/// CIF dates are YYMMDD; "999999" marks a schedule with no end date.
fn parse_cif_date(s: &str) -> Option<NaiveDate> {
    if s == "999999" {
        return Some(NaiveDate::MAX);
    }
    NaiveDate::parse_from_str(s, "%y%m%d").ok()
}

/// Denoted by "BS" in the CIF file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScheduleHeader {
    pub service_id: ServiceId,
    pub valid_from: NaiveDate,
    pub valid_to: NaiveDate,
    pub days: DayMask,
    pub schedule_type: ScheduleType,
}

impl ScheduleHeader {
    const MIN_LEN: usize = 80;

    fn from_bs_str(bs_string: &str, line_number: usize) -> Result<Self, ParseError> {
        let record = FixedWidth::new(bs_string, line_number, RecordIdentifier::BS);
        record.require(Self::MIN_LEN)?;

        let date = |range: Range<usize>| -> Result<NaiveDate, ParseError> {
            let raw = record.field(range)?;
            parse_cif_date(raw).ok_or_else(|| record.malformed(format!("invalid date {raw:?}")))
        };
        let valid_from = date(9..15)?;
        let valid_to = date(15..21)?;

        let raw_days = record.field(21..28)?;
        let days = DayMask::from_cif_str(raw_days)
            .ok_or_else(|| record.malformed(format!("invalid days of week {raw_days:?}")))?;

        let flag = record.field(79..80)?;
        let schedule_type = ScheduleType::from_flag(flag)
            .ok_or_else(|| record.malformed(format!("invalid schedule type flag {flag:?}")))?;

        Ok(ScheduleHeader {
            service_id: ServiceId(record.field(3..9)?.trim().to_string()),
            valid_from,
            valid_to,
            days,
            schedule_type,
        })
    }
}

/// Denoted by "BX" in the CIF file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraDetails {
    pub operator: Option<OperatorCode>,
}

impl ExtraDetails {
    fn from_bx_str(bx_string: &str, line_number: usize) -> Result<Self, ParseError> {
        let record = FixedWidth::new(bx_string, line_number, RecordIdentifier::BX);
        record.require(13)?;
        let operator = record.field(11..13)?.trim();
        Ok(ExtraDetails {
            operator: (!operator.is_empty()).then(|| OperatorCode(operator.to_string())),
        })
    }
}

/// A 24 hour "HHMM" time exactly as it appears in the feed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Hhmm(pub String);

impl Hhmm {
    /// Departures from 00:00 up to and including 01:59 belong to the
    /// previous day's service.
    pub fn is_small_hours(&self) -> bool {
        ("0000"..="0159").contains(&self.0.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum StopType {
    #[serde(rename = "S")]
    Station,
    #[serde(rename = "F")]
    Flyby,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StopPosition {
    Origin,
    Intermediate,
    Terminal,
}

impl StopPosition {
    pub fn record_type(&self) -> RecordIdentifier {
        match self {
            StopPosition::Origin => RecordIdentifier::LO,
            StopPosition::Intermediate => RecordIdentifier::LI,
            StopPosition::Terminal => RecordIdentifier::LT,
        }
    }
}

/// One "LO", "LI" or "LT" location of a journey.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StopEvent {
    pub tiploc: Tiploc,
    pub stop_type: StopType,
    pub time: Hhmm,
    pub stop_sequence: u32,
    /// Whether the journey this stop belongs to starts in the small hours.
    pub small_hours: bool,
    pub position: StopPosition,
}

/// Lazily parses feed lines into records.
///
/// The stop sequence and the journey's small-hours flag are threaded from
/// line to line and reset at every basic schedule, so a parser must see a
/// schedule's lines in feed order.
pub struct RecordParser<'a> {
    lines: std::iter::Enumerate<std::slice::Iter<'a, &'a str>>,
    first_line_number: usize,
    stop_sequence: u32,
    small_hours: bool,
    failed: bool,
}

impl<'a> RecordParser<'a> {
    /// `first_line_number` is the 1-based feed position of `lines[0]`.
    pub fn new(lines: &'a [&'a str], first_line_number: usize) -> Self {
        RecordParser {
            lines: lines.iter().enumerate(),
            first_line_number,
            stop_sequence: 0,
            small_hours: false,
            failed: false,
        }
    }

    fn parse_line(&mut self, line: &str, line_number: usize) -> Result<Option<Record>, ParseError> {
        let record_identifier = RecordIdentifier::from_line(line);
        let record = FixedWidth::new(line, line_number, record_identifier);
        match record_identifier {
            RecordIdentifier::BS => {
                let header = ScheduleHeader::from_bs_str(line, line_number)?;
                self.stop_sequence = 0;
                self.small_hours = false;
                if header.schedule_type == ScheduleType::Cancelled {
                    Ok(Some(Record::Cancellation(header)))
                } else {
                    Ok(Some(Record::ScheduleHeader(header)))
                }
            }
            RecordIdentifier::BX => Ok(Some(Record::ExtraDetails(ExtraDetails::from_bx_str(
                line,
                line_number,
            )?))),
            RecordIdentifier::LO => {
                record.require(19)?;
                let time = Hhmm(record.field(15..19)?.to_string());
                self.stop_sequence += 1;
                self.small_hours = time.is_small_hours();
                Ok(Some(self.stop(&record, StopType::Station, time, StopPosition::Origin)?))
            }
            RecordIdentifier::LI => {
                record.require(11)?;
                // Stations carry a scheduled arrival, timing points only a passing time
                if record.field(10..11)? != " " {
                    record.require(19)?;
                    let time = Hhmm(record.field(15..19)?.to_string());
                    self.stop_sequence += 1;
                    Ok(Some(self.stop(&record, StopType::Station, time, StopPosition::Intermediate)?))
                } else {
                    record.require(24)?;
                    let time = Hhmm(record.field(20..24)?.to_string());
                    Ok(Some(self.stop(&record, StopType::Flyby, time, StopPosition::Intermediate)?))
                }
            }
            RecordIdentifier::LT => {
                record.require(19)?;
                let time = Hhmm(record.field(15..19)?.to_string());
                self.stop_sequence += 1;
                Ok(Some(self.stop(&record, StopType::Station, time, StopPosition::Terminal)?))
            }
            RecordIdentifier::Other => Ok(None),
        }
    }

    fn stop(
        &self,
        record: &FixedWidth,
        stop_type: StopType,
        time: Hhmm,
        position: StopPosition,
    ) -> Result<Record, ParseError> {
        Ok(Record::Stop(StopEvent {
            tiploc: Tiploc::from_location_field(record.field(2..10)?),
            stop_type,
            time,
            stop_sequence: self.stop_sequence,
            small_hours: self.small_hours,
            position,
        }))
    }
}

impl Iterator for RecordParser<'_> {
    /// The 1-based feed line number alongside each record.
    type Item = Result<(usize, Record), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        while let Some((offset, line)) = self.lines.next() {
            let line_number = self.first_line_number + offset;
            match self.parse_line(line, line_number) {
                Ok(Some(record)) => return Some(Ok((line_number, record))),
                Ok(None) => continue,
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        None
    }
}
