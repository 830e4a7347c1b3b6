use std::{collections::BTreeSet, fmt};
use tracing::error;

use crate::error::EtlError;
use crate::table::RawTable;

/// Why a table was excluded from consolidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaViolation {
    /// Required columns absent from the header row.
    MissingColumns(BTreeSet<String>),
    /// Header names that occur more than once.
    DuplicateColumns(BTreeSet<String>),
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (what, cols) = match self {
            SchemaViolation::MissingColumns(c) => ("missing columns", c),
            SchemaViolation::DuplicateColumns(c) => ("duplicate columns", c),
        };
        let list: Vec<&str> = cols.iter().map(String::as_str).collect();
        write!(f, "{}: {}", what, list.join(", "))
    }
}

/// Accept `table` only if every required column is present exactly once.
pub fn check(table: &RawTable, required: &[String]) -> Result<(), SchemaViolation> {
    let mut seen = BTreeSet::new();
    let duplicates: BTreeSet<String> = table
        .headers
        .iter()
        .filter(|h| !seen.insert(h.as_str()))
        .cloned()
        .collect();
    if !duplicates.is_empty() {
        return Err(SchemaViolation::DuplicateColumns(duplicates));
    }

    let present = table.column_set();
    let missing: BTreeSet<String> = required
        .iter()
        .filter(|c| !present.contains(c.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaViolation::MissingColumns(missing))
    }
}

/// [`check`] plus an error log naming the source on rejection.
pub fn validate(table: &RawTable, required: &[String]) -> Result<(), SchemaViolation> {
    check(table, required).map_err(|v| {
        let err = EtlError::Schema {
            source_name: table.source.clone(),
            reason: v.to_string(),
        };
        error!("{}", err);
        v
    })
}
