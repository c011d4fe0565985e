//! HDM: measurement history exported as semicolon-separated CSV
//! (UTF-8 with BOM).
//!
//! Two sub-formats share the container, dispatched by the meta
//! header's data-type field: load curves, and daily indexes followed
//! by a daily-maximum sub-table. Load-curve sampling steps are
//! inferred per row from consecutive-timestamp deltas; on the C5
//! segment the rows are stamped at end-of-interval and shifted back
//! by the inferred step. Index rows are correlated with the calendar
//! segment active at their date, and the distributor sum is published
//! as the total index.

use std::collections::HashMap;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use gridlink_core::enedis;
use gridlink_core::metadata::{
    load_curve_sampling_interval, MeasurementDirection, MeasurementUnit,
};
use gridlink_core::record::Record;

use crate::error::StreamError;
use crate::parsers::{parse_int, parse_timestamp, ParsedRecord};

static CLOSED_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Du (.{25}) au (.{25})$").unwrap());
static OPEN_PERIOD: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Du (.{25}) au$").unwrap());

const PROVIDER_CLASSES: usize = 10;
const DISTRIBUTOR_CLASSES: usize = 4;

/// Peek at the meta block to learn which usage point a file covers,
/// so the caller can look its segment up before the full parse.
pub fn usage_point(content: &str) -> Option<String> {
    let rows = read_rows(content).ok()?;
    meta_block(&rows).get("Identifiant PRM").cloned()
}

pub fn parse(content: &str, is_c5: bool) -> Result<Vec<ParsedRecord>, StreamError> {
    let rows = read_rows(content)?;
    let meta = meta_block(&rows);
    if meta.is_empty() {
        warn!("unexpected meta block, nothing to publish");
        return Ok(Vec::new());
    }

    let mut cursor = Cursor { rows: &rows, pos: 2 };
    match meta.get("Type de donnees").map(String::as_str) {
        Some("Courbe de charge") => load_curve_records(&meta, &mut cursor, is_c5),
        Some("Index") => index_records(&meta, &mut cursor),
        Some(other) => Err(StreamError::parse(format!("unexpected data type {other}"))),
        None => Err(StreamError::parse("meta block without data type")),
    }
}

fn read_rows(content: &str) -> Result<Vec<Vec<String>>, StreamError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| StreamError::parse(format!("bad csv: {e}")))?;
        rows.push(record.iter().map(|field| field.trim().to_string()).collect());
    }
    Ok(rows)
}

fn meta_block(rows: &[Vec<String>]) -> HashMap<String, String> {
    match (rows.first(), rows.get(1)) {
        (Some(header), Some(values)) if header.len() == values.len() => header
            .iter()
            .cloned()
            .zip(values.iter().cloned())
            .collect(),
        _ => HashMap::new(),
    }
}

struct Cursor<'a> {
    rows: &'a [Vec<String>],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Vec<String>> {
        self.rows.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Vec<String>> {
        let row = self.rows.get(self.pos);
        if row.is_some() {
            self.pos += 1;
        }
        row
    }
}

fn expect_meta(meta: &HashMap<String, String>, key: &str, expected: &[&str]) -> Result<(), StreamError> {
    let value = meta.get(key).map(String::as_str).unwrap_or("");
    if expected.contains(&value) {
        Ok(())
    } else {
        Err(StreamError::parse(format!(
            "unexpected {key} '{value}' in meta block"
        )))
    }
}

fn load_curve_records(
    meta: &HashMap<String, String>,
    cursor: &mut Cursor<'_>,
    is_c5: bool,
) -> Result<Vec<ParsedRecord>, StreamError> {
    expect_meta(meta, "Grandeur physique", &["Energie active"])?;
    expect_meta(meta, "Grandeur metier", &["Consommation"])?;
    expect_meta(meta, "Etape metier", &["Comptage Brut"])?;
    // The unit is sometimes left unspecified; assume W.
    expect_meta(meta, "Unite", &["W", ""])?;

    let usage_point = meta
        .get("Identifiant PRM")
        .ok_or_else(|| StreamError::parse("meta block without usage point"))?;
    let name = format!("urn:dev:prm:{usage_point}_consumption/power/active/raw");

    let header = cursor
        .next()
        .ok_or_else(|| StreamError::parse("missing load curve header"))?;
    if header != &["Horodate", "Valeur"] {
        return Err(StreamError::parse(format!(
            "unexpected load curve header {header:?}"
        )));
    }

    let mut rows: Vec<(DateTime<FixedOffset>, Option<i64>)> = Vec::new();
    while let Some(row) = cursor.next() {
        if row.len() != 2 {
            return Err(StreamError::parse(format!("unexpected row {row:?}")));
        }
        if row[0].is_empty() {
            continue;
        }
        let time = parse_timestamp(&row[0])?;
        let value = if row[1].is_empty() {
            None
        } else {
            Some(parse_int(&row[1], "Valeur")?)
        };
        rows.push((time, value));
    }

    if rows.len() < 2 {
        warn!(usage_point, "not enough rows to infer sampling, skipping");
        return Ok(Vec::new());
    }

    // Per-row step, inferred from the previous timestamp; the first
    // row borrows the step of the following pair.
    let mut steps: Vec<Duration> = Vec::with_capacity(rows.len());
    steps.push(rows[1].0 - rows[0].0);
    for window in rows.windows(2) {
        steps.push(window[1].0 - window[0].0);
    }

    let mut records = Vec::new();
    for ((mut time, value), step) in rows.into_iter().zip(steps) {
        let Some(value) = value else { continue };

        let step_minutes = (step.num_seconds() as f64 / 60.0).round() as i64;
        let Some(sampling_interval) = load_curve_sampling_interval(step_minutes.max(0) as u32)
        else {
            warn!(usage_point, step_minutes, "unexpected sampling interval, skipping value");
            continue;
        };

        // C5 rows are stamped at end of interval, C4 at the start.
        if is_c5 {
            time -= step;
        }

        let metadata = enedis::power_active_raw(
            usage_point,
            MeasurementDirection::Consumption,
            sampling_interval,
        );
        records.push((
            metadata,
            Record::new(name.clone(), time, MeasurementUnit::W, value),
        ));
    }

    Ok(records)
}

fn index_header() -> Vec<String> {
    let mut header = vec!["Horodate".to_string(), "Type de releve".to_string()];
    for i in 1..=PROVIDER_CLASSES {
        header.push(format!("EAS F{i}"));
    }
    for i in 1..=DISTRIBUTOR_CLASSES {
        header.push(format!("EAS D{i}"));
    }
    // The totalizer sums every counter of the meter, including ones
    // not transmitted because the active calendar does not use them.
    header.push("EAS T".to_string());
    header
}

fn calendar_header() -> Vec<String> {
    let mut header = vec![
        "Periode".to_string(),
        "Identifiant calendrier fournisseur".to_string(),
        "Libelle calendrier fournisseur".to_string(),
    ];
    for i in 1..=PROVIDER_CLASSES {
        header.push(format!("Identifiant classe temporelle {i}"));
        header.push(format!("Libelle classe temporelle {i}"));
        header.push(format!("Cadran classe temporelle {i}"));
    }
    header.push("Identifiant calendrier distributeur".to_string());
    header.push("Libelle calendrier distributeur".to_string());
    for i in 1..=DISTRIBUTOR_CLASSES {
        header.push(format!("Identifiant classe temporelle distributeur {i}"));
        header.push(format!("Libelle classe temporelle distributeur {i}"));
        header.push(format!("Cadran classe temporelle distributeur {i}"));
    }
    header
}

struct IndexRow {
    time: DateTime<FixedOffset>,
    provider: Vec<Option<i64>>,
    distributor: Vec<Option<i64>>,
    total: Option<i64>,
}

struct CalendarSegment {
    from: DateTime<FixedOffset>,
    to: DateTime<FixedOffset>,
    provider_ids: Vec<String>,
    distributor_ids: Vec<String>,
}

fn optional_int(value: &str, what: &str) -> Result<Option<i64>, StreamError> {
    if value.is_empty() {
        Ok(None)
    } else {
        parse_int(value, what).map(Some)
    }
}

fn index_records(
    meta: &HashMap<String, String>,
    cursor: &mut Cursor<'_>,
) -> Result<Vec<ParsedRecord>, StreamError> {
    expect_meta(meta, "Grandeur physique", &["Energie active"])?;

    let usage_point = meta
        .get("Identifiant PRM")
        .ok_or_else(|| StreamError::parse("meta block without usage point"))?;
    let base = format!("urn:dev:prm:{usage_point}_consumption");
    let ea_meta = enedis::energy_active_index(usage_point, MeasurementDirection::Consumption);

    let header = cursor
        .next()
        .ok_or_else(|| StreamError::parse("missing index header"))?;
    if header != &index_header() {
        return Err(StreamError::parse(format!(
            "unexpected index header {header:?}"
        )));
    }
    let columns = header.len();

    let mut index_rows: Vec<IndexRow> = Vec::new();
    let mut got_values = false;
    while let Some(row) = cursor.peek() {
        if row.len() != columns {
            break;
        }
        cursor.next();
        if row[1] != "Arrêté quotidien" {
            return Err(StreamError::parse(format!(
                "unexpected reading type {}",
                row[1]
            )));
        }
        let time = parse_timestamp(&row[0])?;
        let provider: Vec<Option<i64>> = row[2..2 + PROVIDER_CLASSES]
            .iter()
            .map(|v| optional_int(v, "provider index"))
            .collect::<Result<_, _>>()?;
        let distributor: Vec<Option<i64>> = row
            [2 + PROVIDER_CLASSES..2 + PROVIDER_CLASSES + DISTRIBUTOR_CLASSES]
            .iter()
            .map(|v| optional_int(v, "distributor index"))
            .collect::<Result<_, _>>()?;
        let total = optional_int(&row[2 + PROVIDER_CLASSES + DISTRIBUTOR_CLASSES], "total")?;
        got_values = got_values || total.is_some();
        index_rows.push(IndexRow {
            time,
            provider,
            distributor,
            total,
        });
    }

    let mut records: Vec<ParsedRecord> = Vec::new();
    let mut index_rows = std::collections::VecDeque::from(index_rows);

    if got_values {
        // Calendar information only follows when index values are
        // present.
        let header = cursor
            .next()
            .ok_or_else(|| StreamError::parse("missing calendar header"))?;
        if header != &calendar_header() {
            return Err(StreamError::parse(format!(
                "unexpected calendar header {header:?}"
            )));
        }
        let calendar_columns = header.len();

        let mut segments: Vec<CalendarSegment> = Vec::new();
        while let Some(row) = cursor.peek() {
            if row.len() != calendar_columns {
                // Most likely the daily-maximum meta header.
                break;
            }
            cursor.next();
            let (from, to) = parse_period(&row[0])?;
            let provider_ids = (0..PROVIDER_CLASSES)
                .map(|i| row[3 + 3 * i].to_lowercase())
                .collect();
            let distributor_ids = (0..DISTRIBUTOR_CLASSES)
                .map(|i| row[3 + 3 * PROVIDER_CLASSES + 2 + 3 * i].to_lowercase())
                .collect();
            segments.push(CalendarSegment {
                from,
                to,
                provider_ids,
                distributor_ids,
            });
        }

        for window in segments.windows(2) {
            if window[0].to != window[1].from {
                return Err(StreamError::parse(
                    "calendar periods are not contiguous".to_string(),
                ));
            }
        }

        for segment in &segments {
            let mut provider_total_prev: Option<i64> = None;
            let mut distributor_total_prev: Option<i64> = None;
            let mut total_prev: Option<i64> = None;

            loop {
                match index_rows.front() {
                    None => break,
                    Some(front) if front.time < segment.from => {
                        return Err(StreamError::parse(format!(
                            "index at {} precedes its calendar segment",
                            front.time
                        )));
                    }
                    Some(front) if front.time >= segment.to => break,
                    Some(_) => {}
                }
                let Some(mut row) = index_rows.pop_front() else { break };

                // Counters sometimes carry values while the calendar
                // no longer uses them; drop those, they break the
                // day-over-day check.
                for (i, id) in segment.provider_ids.iter().enumerate() {
                    if id.is_empty() {
                        row.provider[i] = None;
                    }
                }
                for (i, id) in segment.distributor_ids.iter().enumerate() {
                    if id.is_empty() {
                        row.distributor[i] = None;
                    }
                }

                let provider_total = sum_present(&row.provider);
                let distributor_total = sum_present(&row.distributor);

                let diff = match (row.total, total_prev) {
                    (Some(total), Some(prev)) => Some(total - prev),
                    _ => None,
                };
                if let (Some(d_total), Some(d_prev)) = (distributor_total, distributor_total_prev) {
                    if Some(d_total - d_prev) != diff {
                        warn!(usage_point, "unexpected distributor index");
                    }
                }
                if let (Some(p_total), Some(p_prev)) = (provider_total, provider_total_prev) {
                    if Some(p_total - p_prev) != diff {
                        warn!(usage_point, "unexpected provider index");
                    }
                }

                provider_total_prev = provider_total;
                distributor_total_prev = distributor_total;
                total_prev = row.total;

                let Some(distributor_total) = distributor_total else {
                    if provider_total.is_some() {
                        warn!(usage_point, "index for provider only, skipping");
                    }
                    continue;
                };

                for (i, id) in segment.provider_ids.iter().enumerate() {
                    let (Some(value), false) = (row.provider[i], id.is_empty()) else {
                        continue;
                    };
                    records.push((
                        ea_meta.clone(),
                        Record::new(
                            format!("{base}/energy/active/index/provider/{id}"),
                            row.time,
                            MeasurementUnit::Wh,
                            value,
                        ),
                    ));
                }
                for (i, id) in segment.distributor_ids.iter().enumerate() {
                    let (Some(value), false) = (row.distributor[i], id.is_empty()) else {
                        continue;
                    };
                    records.push((
                        ea_meta.clone(),
                        Record::new(
                            format!("{base}/energy/active/index/distributor/{id}"),
                            row.time,
                            MeasurementUnit::Wh,
                            value,
                        ),
                    ));
                }

                // The distributor sum is published as the total, like
                // for the daily streams.
                records.push((
                    ea_meta.clone(),
                    Record::new(
                        format!("{base}/energy/active/index"),
                        row.time,
                        MeasurementUnit::Wh,
                        distributor_total,
                    ),
                ));
            }
        }

        if !index_rows.is_empty() {
            return Err(StreamError::parse(
                "index values left without a calendar segment".to_string(),
            ));
        }
    }

    // Daily-maximum sub-table: its own meta block then (time, value)
    // pairs.
    let pmax_meta_header = cursor
        .next()
        .ok_or_else(|| StreamError::parse("missing daily maximum meta"))?;
    let pmax_meta_values = cursor
        .next()
        .ok_or_else(|| StreamError::parse("missing daily maximum meta values"))?;
    if pmax_meta_header.len() != pmax_meta_values.len() {
        return Err(StreamError::parse("mismatched daily maximum meta"));
    }
    let pmax_meta: HashMap<String, String> = pmax_meta_header
        .iter()
        .cloned()
        .zip(pmax_meta_values.iter().cloned())
        .collect();

    if pmax_meta.get("Identifiant PRM") != Some(usage_point) {
        return Err(StreamError::parse("daily maximum for another usage point"));
    }
    expect_meta(
        &pmax_meta,
        "Type de donnees",
        &["Puissance maximale quotidienne"],
    )?;
    expect_meta(
        &pmax_meta,
        "Grandeur physique",
        &["Puissance maximale atteinte"],
    )?;
    expect_meta(&pmax_meta, "Grandeur metier", &["Consommation"])?;

    let pmax_header = cursor
        .next()
        .ok_or_else(|| StreamError::parse("missing daily maximum header"))?;
    if pmax_header != &["Horodate", "Valeur"] {
        return Err(StreamError::parse(format!(
            "unexpected daily maximum header {pmax_header:?}"
        )));
    }

    let pmax_meta_model = enedis::power_apparent_max(usage_point);
    while let Some(row) = cursor.next() {
        if row.len() != 2 {
            return Err(StreamError::parse(format!("unexpected row {row:?}")));
        }
        if row[1].is_empty() {
            continue;
        }
        let time = parse_timestamp(&row[0])?;
        let value = parse_int(&row[1], "Valeur")?;
        records.push((
            pmax_meta_model.clone(),
            Record::new(
                format!("{base}/power/apparent/max"),
                time,
                MeasurementUnit::Va,
                value,
            ),
        ));
    }

    Ok(records)
}

fn sum_present(values: &[Option<i64>]) -> Option<i64> {
    let present: Vec<i64> = values.iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum())
    }
}

fn parse_period(value: &str) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>), StreamError> {
    if let Some(captures) = CLOSED_PERIOD.captures(value) {
        return Ok((
            parse_timestamp(&captures[1])?,
            parse_timestamp(&captures[2])?,
        ));
    }
    if let Some(captures) = OPEN_PERIOD.captures(value) {
        // Open-ended current period.
        return Ok((parse_timestamp(&captures[1])?, Utc::now().fixed_offset()));
    }
    Err(StreamError::parse(format!(
        "unexpected calendar period {value}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdc_content(unit: &str, rows: &str) -> String {
        format!(
            "\u{feff}Identifiant PRM;Type de donnees;Grandeur physique;Grandeur metier;Etape metier;Unite\n\
             09111642617347;Courbe de charge;Energie active;Consommation;Comptage Brut;{unit}\n\
             Horodate;Valeur\n{rows}"
        )
    }

    #[test]
    fn usage_point_is_read_from_the_meta_block() {
        let content = cdc_content("W", "");
        assert_eq!(usage_point(&content).as_deref(), Some("09111642617347"));
    }

    #[test]
    fn c5_rows_shift_back_by_the_inferred_step() {
        let content = cdc_content(
            "W",
            "2023-01-26T00:30:00+01:00;100\n2023-01-26T01:00:00+01:00;200\n",
        );
        let records = parse(&content, true).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].1.time.to_rfc3339(), "2023-01-26T00:00:00+01:00");
        assert_eq!(records[1].1.time.to_rfc3339(), "2023-01-26T00:30:00+01:00");
        assert_eq!(records[0].0.measurement.sampling_interval.as_str(), "PT30M");
    }

    #[test]
    fn c4_rows_are_already_start_stamped() {
        let content = cdc_content(
            "",
            "2023-01-26T00:00:00+01:00;100\n2023-01-26T00:10:00+01:00;200\n",
        );
        let records = parse(&content, false).unwrap();
        assert_eq!(records[0].1.time.to_rfc3339(), "2023-01-26T00:00:00+01:00");
        assert_eq!(records[0].0.measurement.sampling_interval.as_str(), "PT10M");
    }

    #[test]
    fn missing_values_and_odd_steps_are_skipped() {
        let content = cdc_content(
            "W",
            "2023-01-26T00:30:00+01:00;100\n2023-01-26T01:00:00+01:00;\n2023-01-26T01:07:00+01:00;300\n",
        );
        let records = parse(&content, true).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.value, 100);
    }

    #[test]
    fn single_row_files_cannot_infer_a_step() {
        let content = cdc_content("W", "2023-01-26T00:30:00+01:00;100\n");
        assert!(parse(&content, true).unwrap().is_empty());
    }

    #[test]
    fn unexpected_unit_fails_the_file() {
        let content = cdc_content("kW", "2023-01-26T00:30:00+01:00;100\n");
        assert!(matches!(parse(&content, true), Err(StreamError::Parse(_))));
    }

    fn idx_content() -> String {
        let index_header = index_header().join(";");
        let calendar_header = calendar_header().join(";");

        // Two days on a single-class distributor calendar (base) and
        // one provider class (hp).
        let mut fields = vec![String::new(); 47];
        fields[0] = "Du 2022-02-26T23:00:00+01:00 au".to_string();
        fields[1] = "FC000013".to_string();
        fields[2] = "Calendrier fournisseur".to_string();
        fields[3] = "HP".to_string();
        fields[4] = "Heures Pleines".to_string();
        fields[33] = "DC000001".to_string();
        fields[34] = "Calendrier distributeur".to_string();
        fields[35] = "BASE".to_string();
        fields[36] = "Base".to_string();
        let calendar_line = fields.join(";");

        format!(
            "\u{feff}Identifiant PRM;Type de donnees;Grandeur physique;Date de debut;Date de fin\n\
             09111642617347;Index;Energie active;2022-02-27;2022-03-01\n\
             {index_header}\n\
             2022-02-27T23:00:00+01:00;Arrêté quotidien;1000;;;;;;;;;;5000;;;;5000\n\
             2022-02-28T23:00:00+01:00;Arrêté quotidien;1100;;;;;;;;;;5100;;;;5100\n\
             {calendar_header}\n\
             {calendar_line}\n\
             Identifiant PRM;Type de donnees;Grandeur physique;Grandeur metier\n\
             09111642617347;Puissance maximale quotidienne;Puissance maximale atteinte;Consommation\n\
             Horodate;Valeur\n\
             2022-02-27T23:00:00+01:00;4300\n\
             2022-02-28T23:00:00+01:00;\n"
        )
    }

    #[test]
    fn index_rows_emit_classes_and_distributor_sum_total() {
        let records = parse(&idx_content(), true).unwrap();
        let names: Vec<&str> = records.iter().map(|(_, r)| r.name.as_str()).collect();

        assert!(names
            .contains(&"urn:dev:prm:09111642617347_consumption/energy/active/index/provider/hp"));
        assert!(names.contains(
            &"urn:dev:prm:09111642617347_consumption/energy/active/index/distributor/base"
        ));

        let totals: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.ends_with("_consumption/energy/active/index"))
            .collect();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].1.value, 5000);
        assert_eq!(totals[1].1.value, 5100);
    }

    #[test]
    fn daily_maximum_sub_table_is_emitted() {
        let records = parse(&idx_content(), true).unwrap();
        let maxima: Vec<_> = records
            .iter()
            .filter(|(_, r)| r.name.ends_with("/power/apparent/max"))
            .collect();
        // The empty-value row is skipped.
        assert_eq!(maxima.len(), 1);
        assert_eq!(maxima[0].1.value, 4300);
        assert_eq!(maxima[0].1.unit, MeasurementUnit::Va);
    }

    #[test]
    fn units_always_match_metadata() {
        for (metadata, record) in parse(&idx_content(), true).unwrap() {
            assert_eq!(record.unit, metadata.measurement.unit);
        }
    }
}
