//! The label shown for a record in every export.

use crate::record::ImageRecord;

type TitleSource = fn(&ImageRecord) -> Option<&str>;

/// Sources in priority order; the first non-blank one wins.
const TITLE_SOURCES: &[TitleSource] = &[custom_name, description_first_line];

fn custom_name(record: &ImageRecord) -> Option<&str> {
    record.custom_name.as_deref()
}

fn description_first_line(record: &ImageRecord) -> Option<&str> {
    record.description.as_deref().and_then(|d| d.split('\n').next())
}

/// Resolve the human-facing title: custom name, else the first description
/// line, else the file name. Whitespace-only values count as empty.
pub fn resolve(record: &ImageRecord) -> &str {
    TITLE_SOURCES
        .iter()
        .filter_map(|source| source(record))
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .unwrap_or(&record.filename)
}
