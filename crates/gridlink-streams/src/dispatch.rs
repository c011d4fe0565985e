//! Filename dispatch table.
//!
//! Drops are routed to their parser by basename, first match wins.
//! Transfer companion files (`*_svc.xml`) carry no measurements and
//! are archived untouched.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    R171,
    R151,
    R50,
    R4x,
    Hdm,
}

static DISPATCH: Lazy<Vec<(Regex, ParserKind)>> = Lazy::new(|| {
    [
        (r"^ENEDIS_R171_.+\.zip$", ParserKind::R171),
        (r"^ERDF_R151_.+\.zip$", ParserKind::R151),
        (r"^ERDF_R50_.+\.zip$", ParserKind::R50),
        (r"^ENEDIS_.+_R4Q_CDC_.+\.zip$", ParserKind::R4x),
        (r"^Enedis_SGE_HDM.+\.csv$", ParserKind::Hdm),
    ]
    .into_iter()
    .map(|(pattern, kind)| (Regex::new(pattern).expect("static pattern"), kind))
    .collect()
});

pub fn parser_for(filename: &str) -> Option<ParserKind> {
    DISPATCH
        .iter()
        .find(|(pattern, _)| pattern.is_match(filename))
        .map(|(_, kind)| *kind)
}

pub fn is_companion(filename: &str) -> bool {
    filename.ends_with("_svc.xml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_known_stream_names() {
        assert_eq!(
            parser_for("ENEDIS_R171_00001_12345_2023.zip"),
            Some(ParserKind::R171)
        );
        assert_eq!(parser_for("ERDF_R151_20230115.zip"), Some(ParserKind::R151));
        assert_eq!(parser_for("ERDF_R50_20230126.zip"), Some(ParserKind::R50));
        assert_eq!(
            parser_for("ENEDIS_AB12_R4Q_CDC_20230320.zip"),
            Some(ParserKind::R4x)
        );
        assert_eq!(
            parser_for("Enedis_SGE_HDM_09111642617347.csv"),
            Some(ParserKind::Hdm)
        );
    }

    #[test]
    fn unknown_names_and_companions() {
        assert_eq!(parser_for("README.txt"), None);
        assert_eq!(parser_for("ENEDIS_R171_x.csv"), None);
        assert!(is_companion("ERDF_R50_20230126_svc.xml"));
        assert!(!is_companion("ERDF_R50_20230126.zip"));
    }
}
