//! Record identifier grammar.
//!
//! Clients address measurement series with identifiers like
//! `urn:dev:prm:09111642617347_consumption/power/active/raw`: a
//! 14-digit usage point id, optionally followed by an underscore and
//! a series path.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CoreError;

pub const SAMPLE_IDENTIFIER: &str = "urn:dev:prm:00000000000000_consumption/power/active/raw";

static WITH_SERIES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^urn:dev:prm:(\d{14})_(.+)$").unwrap());
static BARE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^urn:dev:prm:(\d{14})$").unwrap());

/// Split an identifier into `(usage_point_id, series_name)`.
pub fn parse_identifier(identifier: &str) -> Result<(String, Option<String>), CoreError> {
    if let Some(captures) = WITH_SERIES.captures(identifier) {
        return Ok((captures[1].to_string(), Some(captures[2].to_string())));
    }
    if let Some(captures) = BARE.captures(identifier) {
        return Ok((captures[1].to_string(), None));
    }
    Err(CoreError::bad_request(format!(
        "Unexpected record identifier ('{identifier}', should be like '{SAMPLE_IDENTIFIER}')"
    )))
}

/// Assemble the full record name for a usage point and series path.
pub fn record_name(usage_point_id: &str, series_name: &str) -> String {
    format!("urn:dev:prm:{usage_point_id}_{series_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_identifier_with_series() {
        let (prm, series) =
            parse_identifier("urn:dev:prm:09111642617347_consumption/power/active/raw").unwrap();
        assert_eq!(prm, "09111642617347");
        assert_eq!(series.as_deref(), Some("consumption/power/active/raw"));
    }

    #[test]
    fn parses_bare_identifier() {
        let (prm, series) = parse_identifier("urn:dev:prm:09111642617347").unwrap();
        assert_eq!(prm, "09111642617347");
        assert!(series.is_none());
    }

    #[test]
    fn rejects_malformed_identifiers() {
        for bad in [
            "urn:dev:prm:123",
            "urn:dev:prm:09111642617347_",
            "prm:09111642617347",
            "urn:dev:prm:0911164261734x_consumption/power/active/raw",
        ] {
            assert!(parse_identifier(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn record_name_round_trips() {
        let name = record_name("09111642617347", "consumption/energy/active/index");
        let (prm, series) = parse_identifier(&name).unwrap();
        assert_eq!(prm, "09111642617347");
        assert_eq!(series.as_deref(), Some("consumption/energy/active/index"));
    }
}
