//! Per-format extraction: consuming page grids and emitting raw security
//! candidates.
//!
//! Two algorithms cover every supported institution. Block-style statements
//! (messos and friends) open a candidate at each `ISIN:` tag and collect the
//! following rows as detail lines; tabular statements map one row to one
//! security through header-synonym column resolution. The `generic` family
//! is the tabular algorithm with a relaxed header match. Which algorithm a
//! format uses is declared in the registry.

pub(crate) mod block;
pub(crate) mod tabular;

use crate::categories::Currency;
use crate::model::SecurityRecord;
use crate::registry::{ExtractorFamily, FormatSpec};
use crate::tables::Table;

/// Dispatch to the format's extraction family.
pub(crate) fn extract_records(
    spec: &FormatSpec,
    tables: &[Table],
    currency: Currency,
) -> Vec<SecurityRecord> {
    let records = match spec.family {
        ExtractorFamily::Block => block::extract(tables, currency),
        ExtractorFamily::Tabular => tabular::extract(spec, tables, currency),
        ExtractorFamily::Generic => tabular::extract_generic(tables, currency),
    };
    log::debug!(
        "{} extractor produced {} candidate records",
        spec.format,
        records.len()
    );
    records
}
