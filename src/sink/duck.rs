use anyhow::{Context, Result};
use duckdb::{types::Value, Connection, ToSql};
use std::path::PathBuf;
use tracing::debug;

use super::arrow::epoch_days;
use super::Sink;
use crate::consolidate::{ColumnValues, ConsolidatedTable};

/// Replaces one table in an on-disk DuckDB database.
pub struct DuckDbSink {
    path: PathBuf,
    table: String,
}

impl DuckDbSink {
    pub fn new(path: impl Into<PathBuf>, table: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            table: table.into(),
        }
    }
}

impl Sink for DuckDbSink {
    fn describe(&self) -> String {
        format!("duckdb {} table {}", self.path.display(), self.table)
    }

    /// Drop, recreate and bulk-append inside one transaction. On any error the
    /// transaction rolls back and the connection is closed on drop.
    fn write(&self, table: &ConsolidatedTable) -> Result<usize> {
        let mut conn = Connection::open(&self.path)
            .with_context(|| format!("opening database {}", self.path.display()))?;
        let tx = conn.transaction().context("starting transaction")?;

        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {name}; {create}",
            name = quote_ident(&self.table),
            create = create_table_sql(&self.table, table),
        ))
        .with_context(|| format!("recreating table {}", self.table))?;

        {
            let mut appender = tx
                .appender(&self.table)
                .with_context(|| format!("opening appender on {}", self.table))?;
            for row in 0..table.num_rows() {
                let values: Vec<Value> = table
                    .columns
                    .iter()
                    .map(|c| cell_value(&c.values, row))
                    .collect();
                let params: Vec<&dyn ToSql> = values.iter().map(|v| v as &dyn ToSql).collect();
                appender
                    .append_row(params.as_slice())
                    .with_context(|| format!("appending row {}", row))?;
            }
            appender.flush().context("flushing appender")?;
        }

        tx.commit().context("committing")?;
        debug!(table = %self.table, rows = table.num_rows(), "table replaced");
        Ok(table.num_rows())
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn create_table_sql(name: &str, table: &ConsolidatedTable) -> String {
    let cols: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let ty = match c.values {
                ColumnValues::Text(_) => "VARCHAR",
                ColumnValues::Number(_) => "DOUBLE",
                ColumnValues::Date(_) => "DATE",
            };
            format!("{} {}", quote_ident(&c.name), ty)
        })
        .collect();
    format!("CREATE TABLE {} ({});", quote_ident(name), cols.join(", "))
}

fn cell_value(values: &ColumnValues, row: usize) -> Value {
    match values {
        ColumnValues::Text(v) => v[row].clone().map_or(Value::Null, Value::Text),
        ColumnValues::Number(v) => v[row].map_or(Value::Null, Value::Double),
        ColumnValues::Date(v) => v[row].map_or(Value::Null, |d| Value::Date32(epoch_days(d))),
    }
}
