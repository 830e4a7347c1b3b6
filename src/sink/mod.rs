//! Persistence of the consolidated table.

pub mod arrow;
pub mod duck;
pub mod file;

use anyhow::Result;
use std::path::PathBuf;

use crate::consolidate::ConsolidatedTable;

pub use duck::DuckDbSink;
pub use file::FileSink;

/// Configured destination of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    /// Replace `table` inside the embedded database at `path`.
    Database { path: PathBuf, table: String },
    /// Overwrite a tabular file; format follows the extension.
    File { path: PathBuf },
}

pub trait Sink {
    /// Human-readable destination for logs.
    fn describe(&self) -> String;

    /// Persist `table` wholesale, returning the number of rows written.
    fn write(&self, table: &ConsolidatedTable) -> Result<usize>;
}

pub fn open(target: &SinkTarget) -> Box<dyn Sink> {
    match target {
        SinkTarget::Database { path, table } => Box::new(DuckDbSink::new(path, table)),
        SinkTarget::File { path } => Box::new(FileSink::new(path)),
    }
}
