use anyhow::{anyhow, Result};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::EtlError;
use crate::sheets::{SpreadsheetService, WorksheetHandle};

/// One worksheet as read: header row plus string cells, no typing yet.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    /// Spreadsheet title the table came from.
    pub source: String,
    /// Column names from the first row, trimmed. May contain repeats.
    pub headers: Vec<String>,
    /// Data rows, each exactly `headers.len()` cells long.
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Build a table from a row-major grid whose first row is the header.
    ///
    /// Columns with a blank header are dropped. Short rows are padded with
    /// empty cells since the Sheets API trims trailing blanks.
    pub fn from_grid(source: impl Into<String>, grid: Vec<Vec<String>>) -> Result<Self> {
        let source = source.into();
        let mut it = grid.into_iter();
        let header_row = it.next().ok_or_else(|| anyhow!("worksheet is empty"))?;

        let width = header_row.len();
        let kept: Vec<(usize, String)> = header_row
            .into_iter()
            .enumerate()
            .map(|(i, h)| (i, h.trim().to_string()))
            .filter(|(_, h)| !h.is_empty())
            .collect();
        if kept.len() < width {
            debug!(
                source = %source,
                dropped = width - kept.len(),
                "ignoring columns with blank headers"
            );
        }

        let rows = it
            .map(|row| {
                kept.iter()
                    .map(|(i, _)| row.get(*i).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(RawTable {
            source,
            headers: kept.into_iter().map(|(_, h)| h).collect(),
            rows,
        })
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn column_set(&self) -> BTreeSet<&str> {
        self.headers.iter().map(String::as_str).collect()
    }
}

/// Fetch a worksheet and turn it into a [`RawTable`].
pub async fn read_table<S: SpreadsheetService>(
    service: &S,
    ws: &WorksheetHandle,
) -> Result<RawTable, EtlError> {
    let source_name = ws.source_name().to_string();
    let grid = service
        .read_values(ws)
        .await
        .map_err(|cause| EtlError::SourceRead {
            source_name: source_name.clone(),
            cause,
        })?;
    RawTable::from_grid(source_name.clone(), grid)
        .map_err(|cause| EtlError::SourceRead { source_name, cause })
}
