use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::table::RawTable;

/// Cell values of one column. Every variant holds one entry per row;
/// `None` is the null marker.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Text(v) => v.len(),
            ColumnValues::Number(v) => v.len(),
            ColumnValues::Date(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
}

/// Row-wise union of all accepted sheets for a run, stored by column.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConsolidatedTable {
    pub columns: Vec<Column>,
    rows: usize,
}

impl ConsolidatedTable {
    pub fn new(columns: Vec<Column>) -> Self {
        let rows = columns.first().map_or(0, |c| c.values.len());
        debug_assert!(columns.iter().all(|c| c.values.len() == rows));
        Self { columns, rows }
    }

    pub fn num_rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Concatenate `tables` in order. Columns appear in order of first sight;
/// a table lacking a column contributes nulls for it. Within one table only
/// the first column of a repeated header is kept.
pub fn consolidate(tables: Vec<RawTable>) -> ConsolidatedTable {
    let total: usize = tables.iter().map(RawTable::num_rows).sum();

    let mut names: Vec<String> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for t in &tables {
        for h in &t.headers {
            if !index.contains_key(h) {
                index.insert(h.clone(), names.len());
                names.push(h.clone());
            }
        }
    }

    let mut cells: Vec<Vec<Option<String>>> =
        (0..names.len()).map(|_| Vec::with_capacity(total)).collect();
    let mut filled = 0;
    for t in tables {
        let mut taken = HashSet::new();
        let positions: Vec<Option<usize>> = t
            .headers
            .iter()
            .map(|h| taken.insert(h.as_str()).then(|| index[h]))
            .collect();
        filled += t.rows.len();
        for row in t.rows {
            for (pos, cell) in positions.iter().zip(row) {
                if let Some(pos) = pos {
                    cells[*pos].push(Some(cell));
                }
            }
        }
        // columns this table does not carry
        for col in cells.iter_mut() {
            col.resize(filled, None);
        }
    }

    ConsolidatedTable::new(
        names
            .into_iter()
            .zip(cells)
            .map(|(name, v)| Column {
                name,
                values: ColumnValues::Text(v),
            })
            .collect(),
    )
}
