//! R4x: detailed 5/10/15/30-minute curves.
//!
//! Carries active power, capacitive and inductive reactive power and
//! voltage. Kilounit wire values are converted to canonical units;
//! only points the distributor marks as real (`R`) are emitted.

use tracing::warn;

use gridlink_core::enedis;
use gridlink_core::metadata::{
    load_curve_sampling_interval, MeasurementDirection, Metadata,
};
use gridlink_core::record::Record;
use gridlink_core::xml::XmlNode;

use crate::error::StreamError;
use crate::parsers::{parse_int, parse_timestamp, ParsedRecord};

pub fn parse(xml: &str) -> Result<Vec<ParsedRecord>, StreamError> {
    let doc = XmlNode::parse(xml).map_err(|e| StreamError::parse(e.to_string()))?;

    let header = doc
        .find("Entete")
        .ok_or_else(|| StreamError::parse("missing Entete"))?;
    let nature = header
        .child_text("Nature_De_Courbe_Demandee")
        .ok_or_else(|| StreamError::parse("missing Nature_De_Courbe_Demandee"))?;
    if nature != "Brute" {
        return Err(StreamError::parse(format!(
            "curve nature {nature} is not supported"
        )));
    }

    let body = doc
        .find("Corps")
        .ok_or_else(|| StreamError::parse("missing Corps"))?;
    let usage_point = body
        .find_text("Identifiant_PRM")
        .ok_or_else(|| StreamError::parse("missing Identifiant_PRM"))?;

    let mut curves = Vec::new();
    body.find_all("Donnees_Courbe", &mut curves);

    let mut records: Vec<ParsedRecord> = Vec::new();

    for curve in curves {
        let unit = curve
            .child_text("Unite_Mesure")
            .ok_or_else(|| StreamError::parse("curve without Unite_Mesure"))?;
        let step_minutes = parse_int(
            curve
                .child_text("Granularite")
                .ok_or_else(|| StreamError::parse("curve without Granularite"))?,
            "Granularite",
        )?;
        let sampling_interval = load_curve_sampling_interval(step_minutes as u32)
            .ok_or_else(|| StreamError::parse(format!("unexpected granularity {step_minutes}")))?;

        let direction = match curve.child_text("Grandeur_Metier") {
            Some("CONS") => MeasurementDirection::Consumption,
            Some("PROD") => MeasurementDirection::Production,
            Some(other) => {
                return Err(StreamError::parse(format!("unexpected direction {other}")))
            }
            None => {
                warn!(usage_point, "Grandeur_Metier missing, supposing CONS");
                MeasurementDirection::Consumption
            }
        };

        let quantity = curve
            .child_text("Grandeur_Physique")
            .ok_or_else(|| StreamError::parse("curve without Grandeur_Physique"))?;

        // Kilounit wire values are converted to the canonical unit.
        let (series_path, metadata, scale): (&str, Metadata, i64) = match quantity {
            "EA" => {
                if unit != "kW" {
                    return Err(StreamError::parse(format!(
                        "unexpected active power unit {unit}"
                    )));
                }
                (
                    "power/active",
                    enedis::power_active_raw(usage_point, direction, sampling_interval.clone()),
                    1000,
                )
            }
            "ERC" => (
                "power/capacitive",
                enedis::power_capacitive_raw(usage_point, sampling_interval.clone()),
                1000,
            ),
            "ERI" => (
                "power/inductive",
                enedis::power_inductive_raw(usage_point, sampling_interval.clone()),
                1000,
            ),
            "E" => (
                "voltage",
                enedis::voltage_raw(usage_point, sampling_interval.clone()),
                1,
            ),
            other => {
                return Err(StreamError::parse(format!(
                    "unexpected Grandeur_Physique {other}"
                )))
            }
        };

        let name = format!(
            "urn:dev:prm:{usage_point}_{}/{series_path}/raw",
            direction.as_str()
        );

        let mut points = Vec::new();
        curve.find_all("Donnees_Point_Mesure", &mut points);

        for point in points {
            let Some(stamp) = point.attr("Horodatage") else {
                return Err(StreamError::parse("point without Horodatage"));
            };
            let Some(value_str) = point.attr("Valeur_Point") else {
                warn!(usage_point, "missing value, skipping point");
                continue;
            };
            let status = point.attr("Statut_Point").unwrap_or("");
            if status != "R" {
                // Reconstructed, estimated, corrected and outage
                // markers are not published.
                warn!(usage_point, status, "point status is not handled, skipping");
                continue;
            }

            let value = parse_int(value_str, "Valeur_Point")? * scale;
            let time = parse_timestamp(stamp)?;
            records.push((
                metadata.clone(),
                Record::new(name.clone(), time, metadata.measurement.unit, value),
            ));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlink_core::metadata::MeasurementUnit;

    fn doc(curves: &str) -> String {
        format!(
            "<R4x><Entete><Nature_De_Courbe_Demandee>Brute</Nature_De_Courbe_Demandee></Entete>\
             <Corps><Identifiant_PRM>30001444954220</Identifiant_PRM>{curves}</Corps></R4x>"
        )
    }

    fn curve(quantity: &str, unit: &str, step: u32, direction: &str, points: &str) -> String {
        let direction_element = if direction.is_empty() {
            String::new()
        } else {
            format!("<Grandeur_Metier>{direction}</Grandeur_Metier>")
        };
        format!(
            "<Donnees_Courbe><Unite_Mesure>{unit}</Unite_Mesure><Granularite>{step}</Granularite>\
             {direction_element}<Grandeur_Physique>{quantity}</Grandeur_Physique>{points}</Donnees_Courbe>"
        )
    }

    #[test]
    fn converts_kilounits_and_keeps_real_points_only() {
        let points = concat!(
            r#"<Donnees_Point_Mesure Horodatage="2023-03-20T00:10:00+01:00" Valeur_Point="5" Statut_Point="R"/>"#,
            r#"<Donnees_Point_Mesure Horodatage="2023-03-20T00:20:00+01:00" Valeur_Point="6" Statut_Point="E"/>"#,
            r#"<Donnees_Point_Mesure Horodatage="2023-03-20T00:30:00+01:00" Statut_Point="R"/>"#,
        );
        let xml = doc(&curve("EA", "kW", 10, "CONS", points));
        let records = parse(&xml).unwrap();

        assert_eq!(records.len(), 1);
        let (metadata, record) = &records[0];
        assert_eq!(record.value, 5000);
        assert_eq!(record.unit, MeasurementUnit::W);
        assert_eq!(
            record.name,
            "urn:dev:prm:30001444954220_consumption/power/active/raw"
        );
        assert_eq!(metadata.measurement.sampling_interval.as_str(), "PT10M");
    }

    #[test]
    fn reactive_power_is_converted_to_wr() {
        let points = r#"<Donnees_Point_Mesure Horodatage="2023-03-20T00:15:00+01:00" Valeur_Point="2" Statut_Point="R"/>"#;
        let xml = doc(&curve("ERI", "kVAr", 15, "CONS", points));
        let records = parse(&xml).unwrap();
        assert_eq!(records[0].1.value, 2000);
        assert_eq!(records[0].1.unit, MeasurementUnit::Wr);
        assert!(records[0].1.name.ends_with("consumption/power/inductive/raw"));
    }

    #[test]
    fn missing_direction_defaults_to_consumption() {
        let points = r#"<Donnees_Point_Mesure Horodatage="2023-03-20T00:05:00+01:00" Valeur_Point="1" Statut_Point="R"/>"#;
        let xml = doc(&curve("EA", "kW", 5, "", points));
        let records = parse(&xml).unwrap();
        assert_eq!(
            records[0].0.measurement.direction,
            MeasurementDirection::Consumption
        );
        assert_eq!(records[0].0.measurement.sampling_interval.as_str(), "PT5M");
    }

    #[test]
    fn unknown_granularity_fails_the_file() {
        let xml = doc(&curve("EA", "kW", 7, "CONS", ""));
        assert!(matches!(parse(&xml), Err(StreamError::Parse(_))));
    }

    #[test]
    fn unsupported_curve_nature_fails_the_file() {
        let xml = "<R4x><Entete><Nature_De_Courbe_Demandee>Corrigée</Nature_De_Courbe_Demandee></Entete></R4x>";
        assert!(matches!(parse(xml), Err(StreamError::Parse(_))));
    }
}
