//! R50: 30-minute consumption load curve.
//!
//! The distributor stamps each interval at its end; records are
//! re-stamped at the start. As a sanity check the median of
//! consecutive-interval deltas must equal the declared step.

use chrono::{DateTime, Duration, FixedOffset};
use tracing::warn;

use gridlink_core::enedis;
use gridlink_core::metadata::{MeasurementDirection, MeasurementUnit, SamplingInterval};
use gridlink_core::record::Record;
use gridlink_core::xml::XmlNode;

use crate::error::StreamError;
use crate::parsers::{parse_int, parse_timestamp, ParsedRecord};

pub fn parse(xml: &str) -> Result<Vec<ParsedRecord>, StreamError> {
    let doc = XmlNode::parse(xml).map_err(|e| StreamError::parse(e.to_string()))?;

    let header = doc
        .find("En_Tete_Flux")
        .ok_or_else(|| StreamError::parse("missing En_Tete_Flux"))?;
    let step_minutes = parse_int(
        header
            .child_text("Pas_Publication")
            .ok_or_else(|| StreamError::parse("missing Pas_Publication"))?,
        "Pas_Publication",
    )?;
    if step_minutes != 30 {
        return Err(StreamError::parse(format!(
            "unexpected publication step {step_minutes} min"
        )));
    }

    let mut prms = Vec::new();
    doc.find_all("PRM", &mut prms);

    let mut records: Vec<ParsedRecord> = Vec::new();

    for prm in prms {
        let usage_point = prm
            .find_text("Id_PRM")
            .ok_or_else(|| StreamError::parse("PRM without Id_PRM"))?;
        // Direction is not specified in this stream; collection
        // orders only cover consumption curves.
        let metadata = enedis::power_active_raw(
            usage_point,
            MeasurementDirection::Consumption,
            SamplingInterval::new("PT30M"),
        );
        let name = format!("urn:dev:prm:{usage_point}_consumption/power/active/raw");

        let mut points = Vec::new();
        prm.find_all("PDC", &mut points);

        let mut values: Vec<(DateTime<FixedOffset>, i64)> = Vec::new();
        for point in points {
            let time_str = point
                .child_text("H")
                .ok_or_else(|| StreamError::parse("PDC without H"))?;

            // Sometimes the date is present but not the value.
            let Some(value_text) = point.child_text("V").filter(|v| !v.is_empty()) else {
                warn!(usage_point, "missing value, skipping point");
                continue;
            };
            let value = parse_int(value_text, "V")?;

            let caution = point
                .child_text("IV")
                .map(|iv| parse_int(iv, "IV"))
                .transpose()?
                .unwrap_or(0);
            if caution != 0 {
                warn!(usage_point, caution, "caution flag set, skipping point");
                continue;
            }

            let end_of_interval = parse_timestamp(time_str)?;
            values.push((end_of_interval - Duration::minutes(step_minutes), value));
        }

        let mut times: Vec<DateTime<FixedOffset>> = values.iter().map(|(t, _)| *t).collect();
        times.sort();
        let deltas: Vec<i64> = times
            .windows(2)
            .map(|w| (w[1] - w[0]).num_minutes())
            .collect();
        if let Some(median) = median(&deltas) {
            if median != step_minutes as f64 {
                return Err(StreamError::parse(format!(
                    "median interval {median} min does not match declared step {step_minutes} min"
                )));
            }
        }

        for (time, value) in values {
            records.push((
                metadata.clone(),
                Record::new(name.clone(), time, MeasurementUnit::W, value),
            ));
        }
    }

    Ok(records)
}

fn median(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid] as f64)
    } else {
        Some((sorted[mid - 1] + sorted[mid]) as f64 / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(points: &str) -> String {
        format!(
            "<R50><En_Tete_Flux><Pas_Publication>30</Pas_Publication></En_Tete_Flux>\
             <PRM><Id_PRM>09111642617347</Id_PRM><Donnees_Releve>{points}</Donnees_Releve></PRM></R50>"
        )
    }

    fn pdc(time: &str, value: &str, caution: i32) -> String {
        let value_element = if value.is_empty() {
            String::new()
        } else {
            format!("<V>{value}</V>")
        };
        format!("<PDC><H>{time}</H>{value_element}<IV>{caution}</IV></PDC>")
    }

    #[test]
    fn intervals_are_stamped_at_their_start() {
        let xml = doc(&pdc("2023-01-26T00:30:00+01:00", "230", 0));
        let records = parse(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.time.to_rfc3339(), "2023-01-26T00:00:00+01:00");
        assert_eq!(records[0].1.value, 230);
        assert_eq!(records[0].1.unit, MeasurementUnit::W);
    }

    #[test]
    fn missing_values_and_cautions_are_skipped() {
        let xml = doc(&format!(
            "{}{}{}",
            pdc("2023-01-26T00:30:00+01:00", "230", 0),
            pdc("2023-01-26T01:00:00+01:00", "", 0),
            pdc("2023-01-26T01:30:00+01:00", "250", 1),
        ));
        let records = parse(&xml).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn median_step_mismatch_fails_the_file() {
        // Hourly points under a declared 30-minute step.
        let xml = doc(&format!(
            "{}{}{}",
            pdc("2023-01-26T01:00:00+01:00", "230", 0),
            pdc("2023-01-26T02:00:00+01:00", "240", 0),
            pdc("2023-01-26T03:00:00+01:00", "250", 0),
        ));
        assert!(matches!(parse(&xml), Err(StreamError::Parse(_))));
    }

    #[test]
    fn declared_step_other_than_30_fails() {
        let xml = "<R50><En_Tete_Flux><Pas_Publication>60</Pas_Publication></En_Tete_Flux></R50>";
        assert!(matches!(parse(xml), Err(StreamError::Parse(_))));
    }
}
