//! R171: consumption indexes and maxima per temporal class.
//!
//! Besides the per-class records, the parser derives per-instant
//! totals from the distributor classes: the index sum becomes the
//! plain `energy/active/index` series and the largest maximum the
//! `power/apparent/max` (or `power/active/max` when the file reports
//! true power in W) series. Derived records flush at end of stream.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset};
use tracing::warn;

use gridlink_core::metadata::{MeasurementDirection, Metadata, MeasurementUnit};
use gridlink_core::record::Record;
use gridlink_core::xml::XmlNode;
use gridlink_core::{enedis, identifier};

use crate::error::StreamError;
use crate::parsers::{parse_int, parse_timestamp, ParsedRecord};

#[derive(Default)]
struct Derived {
    apparent_max: Option<i64>,
    active_max: Option<i64>,
    index_sum: Option<i64>,
}

pub fn parse(xml: &str) -> Result<Vec<ParsedRecord>, StreamError> {
    let doc = XmlNode::parse(xml).map_err(|e| StreamError::parse(e.to_string()))?;

    let mut series_elements = Vec::new();
    doc.find_all("serieMesuresDatees", &mut series_elements);

    let mut records: Vec<ParsedRecord> = Vec::new();
    // usage point -> instant -> accumulators, ordered for a
    // deterministic flush.
    let mut derived: BTreeMap<String, BTreeMap<DateTime<FixedOffset>, Derived>> = BTreeMap::new();

    for series in series_elements {
        let usage_point = required_text(series, "prmId")?;
        let direction = match required_text(series, "grandeurMetier")? {
            "CONS" => MeasurementDirection::Consumption,
            "PROD" => MeasurementDirection::Production,
            other => return Err(StreamError::parse(format!("unexpected direction {other}"))),
        };

        let measurement_code = required_text(series, "grandeurPhysique")?;
        let unit = required_text(series, "unite")?;
        let temporal_class = required_text(series, "codeClasseTemporelle")?.to_lowercase();
        // Only the distributor calendar is marked "D"; everything
        // else is provider-owned.
        let owner = if required_text(series, "typeCalendrier")? == "D" {
            "distributor"
        } else {
            "provider"
        };

        let (series_path, metadata) = match (measurement_code, unit) {
            ("PMA", "VA") => (
                format!("power/apparent/max/{owner}/{temporal_class}"),
                enedis::power_apparent_max(usage_point),
            ),
            ("PMA", "W") => (
                format!("power/active/max/{owner}/{temporal_class}"),
                enedis::power_active_max(usage_point),
            ),
            ("PMA", other) => {
                return Err(StreamError::parse(format!("unexpected PMA unit {other}")))
            }
            ("EA", _) => (
                format!("energy/active/index/{owner}/{temporal_class}"),
                enedis::energy_active_index(usage_point, direction),
            ),
            // Reactive energy, running time and overrun series are
            // not published.
            _ => continue,
        };

        if unit != metadata.measurement.unit.as_str() {
            return Err(StreamError::parse(format!(
                "unit {unit} != {} expected",
                metadata.measurement.unit.as_str()
            )));
        }

        let direction_str = metadata.measurement.direction.as_str();
        let name = identifier::record_name(usage_point, &format!("{direction_str}/{series_path}"));

        let mut measurements = Vec::new();
        series.find_all("mesureDatee", &mut measurements);

        for measurement in measurements {
            let time_str = measurement
                .child_text("dateFin")
                .ok_or_else(|| StreamError::parse("mesureDatee without dateFin"))?;
            let value = parse_int(
                measurement
                    .child_text("valeur")
                    .ok_or_else(|| StreamError::parse("mesureDatee without valeur"))?,
                "valeur",
            )?;
            // Maxima cover a period and arguably belong at its start;
            // the file stamps them at the end and that stamp is kept.
            let time = parse_timestamp(time_str)?;

            records.push((
                metadata.clone(),
                Record::new(name.clone(), time, metadata.measurement.unit, value),
            ));

            if owner != "distributor" || direction != MeasurementDirection::Consumption {
                // Totals come from the distributor counters only; the
                // provider calendar is not always present.
                continue;
            }

            let slot = derived
                .entry(usage_point.to_string())
                .or_default()
                .entry(time)
                .or_default();

            match (measurement_code, unit) {
                ("PMA", "VA") => {
                    slot.apparent_max = Some(slot.apparent_max.map_or(value, |v| v.max(value)));
                }
                ("PMA", "W") => {
                    slot.active_max = Some(slot.active_max.map_or(value, |v| v.max(value)));
                }
                ("EA", _) => {
                    slot.index_sum = Some(slot.index_sum.unwrap_or(0) + value);
                }
                _ => {}
            }
        }
    }

    if records.is_empty() && derived.is_empty() {
        warn!("R171 file without any handled series");
    }

    for (usage_point, by_time) in derived {
        let base = format!("urn:dev:prm:{usage_point}_consumption");
        for (time, slot) in by_time {
            if let Some(value) = slot.apparent_max {
                records.push((
                    enedis::power_apparent_max(&usage_point),
                    Record::new(
                        format!("{base}/power/apparent/max"),
                        time,
                        MeasurementUnit::Va,
                        value,
                    ),
                ));
            }
            if let Some(value) = slot.active_max {
                records.push((
                    enedis::power_active_max(&usage_point),
                    Record::new(
                        format!("{base}/power/active/max"),
                        time,
                        MeasurementUnit::W,
                        value,
                    ),
                ));
            }
            if let Some(value) = slot.index_sum {
                records.push((
                    enedis::energy_active_index(&usage_point, MeasurementDirection::Consumption),
                    Record::new(
                        format!("{base}/energy/active/index"),
                        time,
                        MeasurementUnit::Wh,
                        value,
                    ),
                ));
            }
        }
    }

    Ok(records)
}

fn required_text<'a>(node: &'a XmlNode, name: &str) -> Result<&'a str, StreamError> {
    node.find_text(name)
        .ok_or_else(|| StreamError::parse(format!("unable to find {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(prm: &str, code: &str, unit: &str, class: &str, calendar: &str, values: &[(&str, i64)]) -> String {
        let measurements: String = values
            .iter()
            .map(|(time, value)| {
                format!("<mesureDatee><dateFin>{time}</dateFin><valeur>{value}</valeur></mesureDatee>")
            })
            .collect();
        format!(
            "<serieMesuresDatees><prmId>{prm}</prmId><grandeurMetier>CONS</grandeurMetier>\
             <grandeurPhysique>{code}</grandeurPhysique><unite>{unit}</unite>\
             <codeClasseTemporelle>{class}</codeClasseTemporelle><typeCalendrier>{calendar}</typeCalendrier>\
             <mesuresDatees>{measurements}</mesuresDatees></serieMesuresDatees>"
        )
    }

    const PRM: &str = "09111642617347";
    const T: &str = "2023-01-01T00:00:00";

    #[test]
    fn derives_index_sum_across_distributor_classes() {
        let xml = format!(
            "<flux>{}{}{}</flux>",
            series(PRM, "EA", "Wh", "HPH", "D", &[(T, 100)]),
            series(PRM, "EA", "Wh", "HPB", "D", &[(T, 200)]),
            series(PRM, "EA", "Wh", "HCH", "D", &[(T, 300)]),
        );
        let records = parse(&xml).unwrap();

        let per_class: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.contains("/energy/active/index/distributor/"))
            .collect();
        assert_eq!(per_class.len(), 3);

        let total: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.ends_with("_consumption/energy/active/index"))
            .collect();
        assert_eq!(total.len(), 1);
        assert_eq!(total[0].1.value, 600);
        assert_eq!(total[0].1.unit, MeasurementUnit::Wh);
    }

    #[test]
    fn derives_apparent_max_as_largest_class_value() {
        let xml = format!(
            "<flux>{}{}</flux>",
            series(PRM, "PMA", "VA", "HPH", "D", &[(T, 4200)]),
            series(PRM, "PMA", "VA", "HCH", "D", &[(T, 5100)]),
        );
        let records = parse(&xml).unwrap();

        let total: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.ends_with("_consumption/power/apparent/max"))
            .collect();
        assert_eq!(total.len(), 1);
        assert_eq!(total[0].1.value, 5100);
    }

    #[test]
    fn true_power_maxima_use_the_active_variant() {
        let xml = format!("<flux>{}</flux>", series(PRM, "PMA", "W", "BASE", "D", &[(T, 3000)]));
        let records = parse(&xml).unwrap();

        assert!(records
            .iter()
            .any(|(_, r)| r.name.contains("/power/active/max/distributor/base")));
        let derived: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.ends_with("_consumption/power/active/max"))
            .collect();
        assert_eq!(derived.len(), 1);
        assert_eq!(derived[0].1.unit, MeasurementUnit::W);
    }

    #[test]
    fn provider_classes_do_not_feed_totals() {
        let xml = format!(
            "<flux>{}{}</flux>",
            series(PRM, "EA", "Wh", "HP", "F", &[(T, 100)]),
            series(PRM, "EA", "Wh", "HC", "D", &[(T, 50)]),
        );
        let records = parse(&xml).unwrap();

        assert!(records
            .iter()
            .any(|(_, r)| r.name.contains("/energy/active/index/provider/hp")));
        let total: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.ends_with("_consumption/energy/active/index"))
            .collect();
        assert_eq!(total[0].1.value, 50);
    }

    #[test]
    fn unexpected_pma_unit_fails_the_file() {
        let xml = format!("<flux>{}</flux>", series(PRM, "PMA", "Wh", "HPH", "D", &[(T, 1)]));
        assert!(matches!(parse(&xml), Err(StreamError::Parse(_))));
    }

    #[test]
    fn every_emission_matches_its_metadata_unit() {
        let xml = format!(
            "<flux>{}{}</flux>",
            series(PRM, "EA", "Wh", "HPH", "D", &[(T, 100)]),
            series(PRM, "PMA", "VA", "HPH", "D", &[(T, 4200)]),
        );
        for (metadata, record) in parse(&xml).unwrap() {
            assert_eq!(record.unit, metadata.measurement.unit);
            assert!(record.name.starts_with("urn:dev:prm:09111642617347"));
        }
    }
}
