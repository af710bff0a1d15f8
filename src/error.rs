use thiserror::Error;

/// Errors raised while turning feed lines into schedule tables.
///
/// Any of these aborts ingestion of the whole feed: a partially parsed
/// timetable would undercount services and can't be aggregated safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A line doesn't satisfy the fixed-width shape of its record type.
    #[error("malformed {record_type} record on line {line}: {reason}")]
    MalformedRecord {
        line: usize,
        record_type: String,
        reason: String,
    },

    /// A stop record appeared with no open schedule header.
    #[error("{record_type} record on line {line} has no preceding schedule header")]
    MissingHeaderContext { line: usize, record_type: String },
}

impl ParseError {
    pub fn malformed(line: usize, record_type: &str, reason: impl Into<String>) -> Self {
        ParseError::MalformedRecord {
            line,
            record_type: record_type.to_string(),
            reason: reason.into(),
        }
    }
}
