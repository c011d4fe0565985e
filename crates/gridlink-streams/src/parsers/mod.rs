//! Stream parsers.
//!
//! Each parser consumes one extracted data file and produces the
//! finite sequence of `(Metadata, Record)` pairs it contains, wire
//! units already converted to canonical ones and timestamps shifted
//! to start-of-interval where the source stamps at the end.
//!
//! Structural surprises abort the whole file (the caller quarantines
//! it); individual bad rows are logged and skipped.

pub mod hdm;
pub mod r151;
pub mod r171;
pub mod r4x;
pub mod r50;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

use gridlink_core::metadata::Metadata;
use gridlink_core::record::Record;
use gridlink_core::DSO_TZ;

use crate::error::StreamError;

pub type ParsedRecord = (Metadata, Record);

/// Parse a timestamp that may or may not carry an offset; civil
/// times are interpreted in the distributor's zone.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, StreamError> {
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Ok(with_offset);
    }
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .map_err(|e| StreamError::parse(format!("unexpected timestamp {value}: {e}")))?;
    DSO_TZ
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.fixed_offset())
        .ok_or_else(|| StreamError::parse(format!("nonexistent local time {value}")))
}

pub(crate) fn parse_int(value: &str, what: &str) -> Result<i64, StreamError> {
    value
        .trim()
        .parse()
        .map_err(|e| StreamError::parse(format!("bad {what} '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_with_offset_are_kept() {
        let t = parse_timestamp("2023-01-26T00:30:00+01:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2023-01-26T00:30:00+01:00");
    }

    #[test]
    fn civil_timestamps_get_the_distributor_zone() {
        let t = parse_timestamp("2023-07-26T00:30:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2023-07-26T00:30:00+02:00");
    }
}
