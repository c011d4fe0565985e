//! Ingestion passes: discover drops, decrypt, dispatch, parse, fan
//! out, then archive or quarantine.

use std::path::Path;

use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};

use gridlink_db::repositories::UsagePointRepository;

use crate::dispatch::{self, ParserKind};
use crate::error::StreamError;
use crate::files::{extract_with_keys, StreamsFiles};
use crate::grouping::RecordsByName;
use crate::parsers::{self, ParsedRecord};
use crate::publisher::Publisher;

/// Files parsed together before a fan-out pass.
const GROUP_FILES: usize = 10;

/// Parse every data file contained in one drop. An empty result
/// means the drop carries nothing to publish (companions, unmatched
/// names); an error means corruption or structural surprise.
pub async fn file_records(
    streams: &StreamsFiles,
    db: &DatabaseConnection,
    path: &Path,
) -> Result<Vec<ParsedRecord>, StreamError> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StreamError::corrupted(format!("unreadable file name {path:?}")))?;

    // Transfer companion metadata is not used.
    if dispatch::is_companion(filename) {
        return Ok(Vec::new());
    }

    let Some(kind) = dispatch::parser_for(filename) else {
        error!(path = %path.display(), "No handler for file");
        return Ok(Vec::new());
    };

    let extracted = extract_with_keys(path, &streams.keys)?;

    let mut records = Vec::new();
    for data_file in &extracted.files {
        match kind {
            ParserKind::Hdm => {
                let content = read_bom_tolerant(data_file)?;
                // Whether timestamps are end-stamped depends on the
                // usage point's segment.
                let is_c5 = match parsers::hdm::usage_point(&content) {
                    Some(prm) => UsagePointRepository::new(db).is_c5(&prm).await?,
                    None => true,
                };
                records.extend(parsers::hdm::parse(&content, is_c5)?);
            }
            ParserKind::R171 => {
                records.extend(parsers::r171::parse(&std::fs::read_to_string(data_file)?)?)
            }
            ParserKind::R151 => {
                records.extend(parsers::r151::parse(&std::fs::read_to_string(data_file)?)?)
            }
            ParserKind::R50 => {
                records.extend(parsers::r50::parse(&std::fs::read_to_string(data_file)?)?)
            }
            ParserKind::R4x => {
                records.extend(parsers::r4x::parse(&std::fs::read_to_string(data_file)?)?)
            }
        }
    }
    Ok(records)
}

fn read_bom_tolerant(path: &Path) -> Result<String, StreamError> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One full pass over the discoverable files.
pub async fn run_pass(
    streams: &StreamsFiles,
    db: &DatabaseConnection,
    publisher: &Publisher<'_>,
    record_filter: Option<&str>,
) -> Result<(), StreamError> {
    let mut files = streams.scan()?;
    info!(count = files.len(), "Ingestion pass starting");

    while !files.is_empty() {
        let mut records = RecordsByName::new();
        let mut parsed_files = Vec::new();

        while let Some(path) = files.first().cloned() {
            if parsed_files.len() >= GROUP_FILES {
                break;
            }
            files.remove(0);

            info!(path = %path.display(), "Parsing");
            match file_records(streams, db, &path).await {
                Ok(file_records) => {
                    let mut kept = 0;
                    for (metadata, record) in file_records {
                        if record_filter.map_or(true, |f| record.name.contains(f)) {
                            records.add(metadata, record);
                            kept += 1;
                        }
                    }
                    if kept > 0 {
                        parsed_files.push(path);
                    } else {
                        streams.archive(&path)?;
                    }
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "Unable to parse data");
                    streams.move_to_errors(&path)?;
                }
            }
        }

        publisher.fan_out(&records).await?;

        // Records have been fanned out; only now do the sources move
        // to the archive.
        for path in parsed_files {
            streams.archive(&path)?;
        }
    }

    info!("Ingestion pass done");
    Ok(())
}
