use salesetl::{
    config::{self, SourceConfig, DEFAULT_LOG_FILE},
    logging,
    sheets::{Backend, GoogleSheets, LocalSheets},
    Config, EtlError, Outcome, Pipeline,
};
use std::{path::PathBuf, process::ExitCode};
use tracing::{error, info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // ─── 1) config, then logging (the log file path comes from config) ───
    let dotenv_problem = config::load_dotenv();
    let config = Config::from_env();
    let log_path = config
        .as_ref()
        .map(|c| c.log_file.clone())
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_FILE));
    if let Err(e) = logging::init(&log_path) {
        eprintln!("logging setup failed: {:#}", e);
    }
    if let Some(e) = dotenv_problem {
        warn!(error = %e, ".env not loaded");
    }

    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // ─── 2) connect to the spreadsheet service ──────────────────────────
    let backend = match &config.source {
        SourceConfig::Google { credentials_path } => {
            match GoogleSheets::connect(credentials_path).await {
                Ok(s) => Backend::Google(s),
                Err(e) => {
                    error!("{}", EtlError::Connection(e));
                    return ExitCode::FAILURE;
                }
            }
        }
        SourceConfig::Local { dir } => {
            info!(dir = %dir.display(), "reading local CSV sheets");
            Backend::Local(LocalSheets::new(dir))
        }
    };

    // ─── 3) run ─────────────────────────────────────────────────────────
    let report = Pipeline::new(backend, &config).run().await;
    info!(
        sources = report.sources,
        accepted = report.accepted.len(),
        rejected = report.rejected.len(),
        failed = report.failed.len(),
        outcome = ?report.outcome,
        "pipeline finished"
    );
    if let Outcome::SinkFailed { .. } = report.outcome {
        info!("no output written");
    }
    ExitCode::SUCCESS
}
