//! Grouping of parsed records for delivery.
//!
//! Records are first keyed by full record name, then by metadata, so
//! a subscription prefix can select everything it covers and send
//! each metadata group as one batch. Parser emission order is kept
//! within a group and never reordered across chunks.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use gridlink_core::metadata::Metadata;
use gridlink_core::record::Record;

#[derive(Default)]
pub struct RecordsByName {
    // name -> (metadata -> records), insertion-ordered per name.
    records: HashMap<String, Vec<(Metadata, Vec<Record>)>>,
    names: Vec<String>,
}

impl RecordsByName {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, metadata: Metadata, record: Record) {
        assert_eq!(
            record.unit, metadata.measurement.unit,
            "record unit must match its metadata"
        );
        let by_meta = match self.records.entry(record.name.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                self.names.push(record.name.clone());
                entry.insert(Vec::new())
            }
        };
        match by_meta.iter_mut().find(|(meta, _)| *meta == metadata) {
            Some((_, records)) => records.push(record),
            None => by_meta.push((metadata, vec![record])),
        }
    }

    pub fn count(&self) -> usize {
        self.records
            .values()
            .flat_map(|by_meta| by_meta.iter())
            .map(|(_, records)| records.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Records whose name starts with `prefix`, merged across names
    /// by shared metadata and split into `chunk_size`-sized batches
    /// (0 = unchunked). Emission order is preserved.
    pub fn get(&self, prefix: &str, chunk_size: usize) -> Vec<(Metadata, Vec<Record>)> {
        let mut merged: Vec<(Metadata, Vec<Record>)> = Vec::new();
        for name in &self.names {
            if !name.starts_with(prefix) {
                continue;
            }
            for (metadata, records) in &self.records[name] {
                match merged.iter_mut().find(|(meta, _)| meta == metadata) {
                    Some((_, merged_records)) => merged_records.extend(records.iter().cloned()),
                    None => merged.push((metadata.clone(), records.clone())),
                }
            }
        }

        if chunk_size == 0 {
            return merged;
        }
        merged
            .into_iter()
            .flat_map(|(metadata, records)| {
                records
                    .chunks(chunk_size)
                    .map(|chunk| (metadata.clone(), chunk.to_vec()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}
