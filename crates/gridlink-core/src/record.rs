//! Measurement records and the `Data` payload sent to clients.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use quick_xml::events::{BytesDecl, Event};
use quick_xml::Writer;

use crate::error::CoreError;
use crate::metadata::{Metadata, MeasurementUnit};

/// One measurement point. `time` always carries an offset; naive
/// timestamps cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub time: DateTime<FixedOffset>,
    pub unit: MeasurementUnit,
    pub value: i64,
}

impl Record {
    pub fn new(
        name: impl Into<String>,
        time: DateTime<FixedOffset>,
        unit: MeasurementUnit,
        value: i64,
    ) -> Self {
        Record {
            name: name.into(),
            time,
            unit,
            value,
        }
    }
}

/// A batch of records sharing one metadata, as delivered to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct Data {
    pub metadata: Metadata,
    pub records: Vec<Record>,
}

pub const DATA_NS: &str = "urn:gridlink:0";

impl Data {
    pub fn new(metadata: Metadata, records: Vec<Record>) -> Self {
        Data { metadata, records }
    }

    /// Render the payload as the `data` XML element.
    pub fn to_xml(&self) -> Result<String, CoreError> {
        let mut writer = Writer::new(Vec::new());
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(|e| CoreError::Xml(e.to_string()))?;
        writer
            .create_element("data")
            .with_attribute(("xmlns", DATA_NS))
            .write_inner_content(|w| {
                write_metadata(w, &self.metadata)?;
                w.create_element("records").write_inner_content(|w| {
                    for record in &self.records {
                        w.create_element("record")
                            .with_attribute(("name", record.name.as_str()))
                            .with_attribute((
                                "time",
                                record
                                    .time
                                    .to_rfc3339_opts(SecondsFormat::Secs, false)
                                    .as_str(),
                            ))
                            .with_attribute(("unit", record.unit.as_str()))
                            .with_attribute(("value", record.value.to_string().as_str()))
                            .write_empty()?;
                    }
                    Ok::<(), quick_xml::Error>(())
                })?;
                Ok(())
            })
            .map_err(|e: quick_xml::Error| CoreError::Xml(e.to_string()))?;
        String::from_utf8(writer.into_inner()).map_err(|e| CoreError::Xml(e.to_string()))
    }
}

fn write_metadata<W: std::io::Write>(
    writer: &mut Writer<W>,
    metadata: &Metadata,
) -> Result<(), quick_xml::Error> {
    writer.create_element("metadata").write_inner_content(|w| {
        w.create_element("device")
            .with_attribute(("type", metadata.device.kind.as_str()))
            .write_inner_content(|w| {
                w.create_element("identifier")
                    .with_attribute(("authority", metadata.device.identifier.authority.as_str()))
                    .with_attribute(("type", metadata.device.identifier.kind.as_str()))
                    .with_attribute(("value", metadata.device.identifier.value.as_str()))
                    .write_empty()?;
                Ok::<(), quick_xml::Error>(())
            })?;
        let m = &metadata.measurement;
        w.create_element("measurement")
            .with_attribute(("name", m.name.as_str()))
            .with_attribute(("direction", m.direction.as_str()))
            .with_attribute(("quantity", m.quantity.as_str()))
            .with_attribute(("type", "electrical"))
            .with_attribute(("unit", m.unit.as_str()))
            .with_attribute(("sampling-interval", m.sampling_interval.as_str()))
            .write_empty()?;
        Ok::<(), quick_xml::Error>(())
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enedis;
    use crate::metadata::{MeasurementDirection, SamplingInterval};

    fn sample_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2020-06-01T00:00:00+02:00").unwrap()
    }

    #[test]
    fn data_renders_records_and_metadata() {
        let meta = enedis::power_active_raw(
            "09111642617347",
            MeasurementDirection::Consumption,
            SamplingInterval::new("PT30M"),
        );
        let data = Data::new(
            meta,
            vec![Record::new(
                "urn:dev:prm:09111642617347_consumption/power/active/raw",
                sample_time(),
                MeasurementUnit::W,
                230,
            )],
        );
        let xml = data.to_xml().unwrap();
        assert!(xml.contains(r#"<data xmlns="urn:gridlink:0">"#));
        assert!(xml.contains(r#"value="09111642617347""#));
        assert!(xml.contains(r#"sampling-interval="PT30M""#));
        assert!(xml.contains(r#"time="2020-06-01T00:00:00+02:00""#));
        assert!(xml.contains(r#"value="230""#));
    }
}
