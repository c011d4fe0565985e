//! R151: daily index snapshots per temporal class.
//!
//! Same derivation rules as R171, but a single instant per usage
//! point: distributor classes are emitted and summed into the plain
//! index series, provider classes are emitted as-is, and the optional
//! daily maximum becomes an apparent-power record.

use gridlink_core::metadata::{MeasurementDirection, MeasurementUnit};
use gridlink_core::record::Record;
use gridlink_core::enedis;
use gridlink_core::xml::XmlNode;

use crate::error::StreamError;
use crate::parsers::{parse_int, parse_timestamp, ParsedRecord};

pub fn parse(xml: &str) -> Result<Vec<ParsedRecord>, StreamError> {
    let doc = XmlNode::parse(xml).map_err(|e| StreamError::parse(e.to_string()))?;

    let mut prms = Vec::new();
    doc.find_all("PRM", &mut prms);

    let mut records: Vec<ParsedRecord> = Vec::new();

    for prm in prms {
        let usage_point = prm
            .find_text("Id_PRM")
            .ok_or_else(|| StreamError::parse("PRM without Id_PRM"))?;
        // The stream does not mark a direction; these snapshots are
        // only ordered for consumption.
        let base = format!("urn:dev:prm:{usage_point}_consumption");
        let ea_meta = enedis::energy_active_index(usage_point, MeasurementDirection::Consumption);

        let data = prm
            .find("Donnees_Releve")
            .ok_or_else(|| StreamError::parse("PRM without Donnees_Releve"))?;
        let time = parse_timestamp(
            data.child_text("Date_Releve")
                .ok_or_else(|| StreamError::parse("Donnees_Releve without Date_Releve"))?,
        )?;

        let mut index_sum = 0;
        for class in data
            .children
            .iter()
            .filter(|c| c.name == "Classe_Temporelle_Distributeur")
        {
            let value = parse_int(
                class
                    .child_text("Valeur")
                    .ok_or_else(|| StreamError::parse("temporal class without Valeur"))?,
                "Valeur",
            )?;
            let class_id = class
                .child_text("Id_Classe_Temporelle")
                .ok_or_else(|| StreamError::parse("temporal class without id"))?
                .to_lowercase();

            records.push((
                ea_meta.clone(),
                Record::new(
                    format!("{base}/energy/active/index/distributor/{class_id}"),
                    time,
                    MeasurementUnit::Wh,
                    value,
                ),
            ));
            index_sum += value;
        }

        records.push((
            ea_meta.clone(),
            Record::new(
                format!("{base}/energy/active/index"),
                time,
                MeasurementUnit::Wh,
                index_sum,
            ),
        ));

        for class in data
            .children
            .iter()
            .filter(|c| c.name == "Classe_Temporelle")
        {
            let value = parse_int(
                class
                    .child_text("Valeur")
                    .ok_or_else(|| StreamError::parse("temporal class without Valeur"))?,
                "Valeur",
            )?;
            let class_id = class
                .child_text("Id_Classe_Temporelle")
                .ok_or_else(|| StreamError::parse("temporal class without id"))?
                .to_lowercase();

            records.push((
                ea_meta.clone(),
                Record::new(
                    format!("{base}/energy/active/index/provider/{class_id}"),
                    time,
                    MeasurementUnit::Wh,
                    value,
                ),
            ));
        }

        // Absent when the day's data was not available.
        if let Some(pmax) = data.child("Puissance_Maximale") {
            let value = parse_int(
                pmax.child_text("Valeur")
                    .ok_or_else(|| StreamError::parse("Puissance_Maximale without Valeur"))?,
                "Valeur",
            )?;
            records.push((
                enedis::power_apparent_max(usage_point),
                Record::new(
                    format!("{base}/power/apparent/max"),
                    time,
                    MeasurementUnit::Va,
                    value,
                ),
            ));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<R151>
      <PRM>
        <Id_PRM>09111642617347</Id_PRM>
        <Donnees_Releve>
          <Date_Releve>2022-03-17</Date_Releve>
          <Classe_Temporelle_Distributeur>
            <Id_Classe_Temporelle>HPH</Id_Classe_Temporelle>
            <Valeur>1000</Valeur>
          </Classe_Temporelle_Distributeur>
          <Classe_Temporelle_Distributeur>
            <Id_Classe_Temporelle>HCH</Id_Classe_Temporelle>
            <Valeur>500</Valeur>
          </Classe_Temporelle_Distributeur>
          <Classe_Temporelle>
            <Id_Classe_Temporelle>HP</Id_Classe_Temporelle>
            <Valeur>900</Valeur>
          </Classe_Temporelle>
          <Puissance_Maximale>
            <Valeur>4300</Valeur>
          </Puissance_Maximale>
        </Donnees_Releve>
      </PRM>
    </R151>"#;

    #[test]
    fn emits_classes_total_and_maximum() {
        let records = parse(DOC).unwrap();
        let names: Vec<&str> = records.iter().map(|(_, r)| r.name.as_str()).collect();

        assert!(names.contains(
            &"urn:dev:prm:09111642617347_consumption/energy/active/index/distributor/hph"
        ));
        assert!(names
            .contains(&"urn:dev:prm:09111642617347_consumption/energy/active/index/provider/hp"));
        assert!(names.contains(&"urn:dev:prm:09111642617347_consumption/power/apparent/max"));

        let total = records
            .iter()
            .find(|(_, r)| r.name.ends_with("_consumption/energy/active/index"))
            .unwrap();
        assert_eq!(total.1.value, 1500);

        let snapshot_day = records[0].1.time;
        assert_eq!(snapshot_day.to_rfc3339(), "2022-03-17T00:00:00+01:00");
    }

    #[test]
    fn maximum_is_optional() {
        let without = DOC.replace(
            "<Puissance_Maximale>\n            <Valeur>4300</Valeur>\n          </Puissance_Maximale>",
            "",
        );
        let records = parse(&without).unwrap();
        assert!(!records
            .iter()
            .any(|(_, r)| r.name.ends_with("/power/apparent/max")));
    }

    #[test]
    fn units_match_metadata() {
        for (metadata, record) in parse(DOC).unwrap() {
            assert_eq!(record.unit, metadata.measurement.unit);
        }
    }
}
