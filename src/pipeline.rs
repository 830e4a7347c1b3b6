//! The run: `INIT → LIST → READ → VALIDATE → CONSOLIDATE → NORMALIZE → WRITE → DONE`.
//!
//! Every empty intermediate result goes straight to `DONE` with a warning;
//! no step after construction can fail the run.

use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SchemaConfig};
use crate::consolidate::consolidate;
use crate::discover::{list_worksheets, Discovery};
use crate::error::EtlError;
use crate::normalize::normalize;
use crate::sheets::SpreadsheetService;
use crate::sink::{self, Sink};
use crate::table::read_table;
use crate::validate::{validate, SchemaViolation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    List,
    Read,
    Validate,
    Consolidate,
    Normalize,
    Write,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Init => "INIT",
            Stage::List => "LIST",
            Stage::Read => "READ",
            Stage::Validate => "VALIDATE",
            Stage::Consolidate => "CONSOLIDATE",
            Stage::Normalize => "NORMALIZE",
            Stage::Write => "WRITE",
            Stage::Done => "DONE",
        };
        f.write_str(s)
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written { rows: usize },
    NoSources,
    NoAcceptedTables,
    EmptyTable,
    SinkFailed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub source: String,
    pub reason: SchemaViolation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Worksheets resolved by the listing step.
    pub sources: usize,
    pub accepted: Vec<String>,
    pub rejected: Vec<Rejection>,
    /// Sources that could not be resolved or read.
    pub failed: Vec<String>,
    pub outcome: Outcome,
}

impl RunReport {
    fn new() -> Self {
        Self {
            sources: 0,
            accepted: Vec::new(),
            rejected: Vec::new(),
            failed: Vec::new(),
            outcome: Outcome::NoSources,
        }
    }
}

pub struct Pipeline<S> {
    service: S,
    discovery: Discovery,
    schema: SchemaConfig,
    sink: Box<dyn Sink>,
}

impl<S: SpreadsheetService> Pipeline<S> {
    pub fn new(service: S, config: &Config) -> Self {
        Self::with_sink(service, config, sink::open(&config.sink))
    }

    pub fn with_sink(service: S, config: &Config, sink: Box<dyn Sink>) -> Self {
        Self {
            service,
            discovery: config.discovery.clone(),
            schema: config.schema.clone(),
            sink,
        }
    }

    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        info!("starting ETL pipeline");
        enter(Stage::Init);

        enter(Stage::List);
        let found = list_worksheets(&self.service, &self.discovery).await;
        report.sources = found.worksheets.len();
        report.failed.extend(found.skipped);
        if found.worksheets.is_empty() {
            warn!("no spreadsheets found, nothing to load");
            return finish(report, Outcome::NoSources);
        }

        let mut accepted = Vec::new();
        for ws in &found.worksheets {
            enter(Stage::Read);
            let table = match read_table(&self.service, ws).await {
                Ok(t) => t,
                Err(e) => {
                    error!("{}", e);
                    report.failed.push(ws.source_name().to_string());
                    continue;
                }
            };

            enter(Stage::Validate);
            match validate(&table, &self.schema.required_columns) {
                Ok(()) => {
                    debug!(source = %table.source, rows = table.num_rows(), "accepted");
                    report.accepted.push(table.source.clone());
                    accepted.push(table);
                }
                Err(reason) => report.rejected.push(Rejection {
                    source: table.source,
                    reason,
                }),
            }
        }
        if accepted.is_empty() {
            warn!("no sheet passed schema validation, nothing to load");
            return finish(report, Outcome::NoAcceptedTables);
        }

        enter(Stage::Consolidate);
        info!(tables = accepted.len(), "transforming");
        let table = consolidate(accepted);

        enter(Stage::Normalize);
        let table = normalize(table, &self.schema);
        if table.is_empty() {
            warn!("consolidated table is empty, nothing to load");
            return finish(report, Outcome::EmptyTable);
        }

        enter(Stage::Write);
        let rows = table.num_rows();
        let outcome = match self.sink.write(&table) {
            Ok(n) => {
                info!(rows = n, target = %self.sink.describe(), "load complete");
                Outcome::Written { rows: n }
            }
            Err(cause) => {
                let err = EtlError::SinkWrite {
                    target: self.sink.describe(),
                    rows,
                    cause,
                };
                error!("{}", err);
                Outcome::SinkFailed {
                    error: err.to_string(),
                }
            }
        };
        finish(report, outcome)
    }
}

fn enter(stage: Stage) {
    debug!(%stage, "stage");
}

fn finish(mut report: RunReport, outcome: Outcome) -> RunReport {
    enter(Stage::Done);
    report.outcome = outcome;
    report
}
