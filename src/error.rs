use thiserror::Error;

/// Failure classes of a run. Only `Configuration` and `Connection` stop a run;
/// the rest are logged and recovered at the sheet level or at the final write.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("cannot connect to spreadsheet service: {0:#}")]
    Connection(anyhow::Error),

    #[error("failed to read `{source_name}`: {cause:#}")]
    SourceRead {
        source_name: String,
        cause: anyhow::Error,
    },

    #[error("`{source_name}` does not match the expected schema: {reason}")]
    Schema { source_name: String, reason: String },

    #[error("failed to write {rows} rows to {target}: {cause:#}")]
    SinkWrite {
        target: String,
        rows: usize,
        cause: anyhow::Error,
    },
}

impl EtlError {
    /// Whether this error must halt the run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EtlError::Configuration(_) | EtlError::Connection(_))
    }
}
