//! Resolves a CIF rail timetable into the trains that actually run on given
//! dates, and compares them per station against the permanent timetable.

pub mod aggregate;
pub mod calendar;
pub mod config;
pub mod error;
pub mod exceptions;
pub mod records;
pub mod schedule;
pub mod stations;
pub mod utils;

#[cfg(test)]
mod test_feed;

pub use error::ParseError;
