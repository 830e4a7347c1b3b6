// src/config.rs

use anyhow::Context;
use serde::Deserialize;
use std::{env, fs, path::PathBuf};

use crate::discover::Discovery;
use crate::error::EtlError;
use crate::normalize::NumberFormat;
use crate::sink::SinkTarget;

pub const DEFAULT_PATTERN: &str = "vendas -";
pub const DEFAULT_DB_PATH: &str = "vendas_dw.db";
pub const DEFAULT_TABLE: &str = "tb_vendas_consolidadas";
pub const DEFAULT_OUTPUT_PATH: &str = "vendas_consolidadas.csv";
pub const DEFAULT_LOG_FILE: &str = "processo_etl.log";
pub const DEFAULT_CURRENCY_SYMBOL: &str = "R$";

pub const REQUIRED_COLUMNS: &[&str] = &[
    "Date",
    "Salesperson",
    "Product",
    "Quantity",
    "Unit Price",
    "Total",
];
pub const NUMERIC_COLUMNS: &[&str] = &["Unit Price", "Total", "Quantity"];
pub const DATE_COLUMN: &str = "Date";

/// Where spreadsheets come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceConfig {
    /// Google Drive/Sheets, authenticated with a service-account key file.
    Google { credentials_path: PathBuf },
    /// A directory of `*.csv` files, one spreadsheet per file.
    Local { dir: PathBuf },
}

/// Column expectations and value formats for the sales sheets.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaConfig {
    pub required_columns: Vec<String>,
    pub numeric_columns: Vec<String>,
    pub date_column: String,
    pub currency_symbol: String,
    pub number_format: NumberFormat,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            required_columns: REQUIRED_COLUMNS.iter().map(|s| s.to_string()).collect(),
            numeric_columns: NUMERIC_COLUMNS.iter().map(|s| s.to_string()).collect(),
            date_column: DATE_COLUMN.to_string(),
            currency_symbol: DEFAULT_CURRENCY_SYMBOL.to_string(),
            number_format: NumberFormat::default(),
        }
    }
}

/// Everything a run needs, resolved once at start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source: SourceConfig,
    pub discovery: Discovery,
    pub sink: SinkTarget,
    pub schema: SchemaConfig,
    pub log_file: PathBuf,
}

/// Optional YAML settings file. Every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub credentials_path: Option<PathBuf>,
    pub source_dir: Option<PathBuf>,
    pub pattern: Option<String>,
    pub sheets: Option<Vec<String>>,
    pub sink: Option<String>,
    pub db_path: Option<PathBuf>,
    pub table: Option<String>,
    pub output_path: Option<PathBuf>,
    pub number_format: Option<String>,
    pub currency_symbol: Option<String>,
    pub log_file: Option<PathBuf>,
    pub required_columns: Option<Vec<String>>,
    pub numeric_columns: Option<Vec<String>>,
    pub date_column: Option<String>,
}

/// Load `.env` from the working directory. A missing file is normal; any
/// other failure is handed back so it can be logged once logging is up.
pub fn load_dotenv() -> Option<dotenvy::Error> {
    dotenv_problem(dotenvy::dotenv().map(|_| ()))
}

fn dotenv_problem(result: Result<(), dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

impl FileConfig {
    pub fn parse(yaml: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(yaml).context("parsing YAML config")
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        Self::parse(&text).with_context(|| format!("in {}", path))
    }
}

impl Config {
    /// Read the optional `ETL_CONFIG` YAML file, then the process environment.
    /// Call [`load_dotenv`] first for `.env` support.
    pub fn from_env() -> Result<Self, EtlError> {
        let file = match env::var("ETL_CONFIG") {
            Ok(path) if !path.trim().is_empty() => FileConfig::load(&path)
                .map_err(|e| EtlError::Configuration(format!("{:#}", e)))?,
            _ => FileConfig::default(),
        };
        Self::from_lookup(file, |key| env::var(key).ok())
    }

    /// Merge file settings with variables from `lookup`; variables win.
    pub fn from_lookup<F>(file: FileConfig, lookup: F) -> Result<Self, EtlError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank variables count as unset
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source_dir = var("ETL_SOURCE_DIR").map(PathBuf::from).or(file.source_dir);
        let credentials = var("GOOGLE_CREDENTIALS_PATH")
            .map(PathBuf::from)
            .or(file.credentials_path);
        let source = match (source_dir, credentials) {
            (Some(dir), _) => SourceConfig::Local { dir },
            (None, Some(credentials_path)) => SourceConfig::Google { credentials_path },
            (None, None) => {
                return Err(EtlError::Configuration(
                    "GOOGLE_CREDENTIALS_PATH is not set".into(),
                ))
            }
        };

        let names = var("ETL_SHEETS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .or(file.sheets);
        let discovery = match names {
            Some(names) => Discovery::Names(names),
            None => Discovery::Pattern(
                var("ETL_PATTERN")
                    .or(file.pattern)
                    .unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
            ),
        };

        let sink_kind = var("ETL_SINK")
            .or(file.sink)
            .unwrap_or_else(|| "database".to_string());
        let sink = match sink_kind.to_lowercase().as_str() {
            "database" | "db" | "duckdb" => SinkTarget::Database {
                path: var("ETL_DB_PATH")
                    .map(PathBuf::from)
                    .or(file.db_path)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH)),
                table: var("ETL_TABLE")
                    .or(file.table)
                    .unwrap_or_else(|| DEFAULT_TABLE.to_string()),
            },
            "file" => SinkTarget::File {
                path: var("ETL_OUTPUT_PATH")
                    .map(PathBuf::from)
                    .or(file.output_path)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH)),
            },
            other => {
                return Err(EtlError::Configuration(format!(
                    "unknown sink `{}` (expected `database` or `file`)",
                    other
                )))
            }
        };

        let defaults = SchemaConfig::default();
        let number_format = match var("ETL_NUMBER_FORMAT").or(file.number_format) {
            Some(s) => s.parse().map_err(EtlError::Configuration)?,
            None => defaults.number_format,
        };
        let schema = SchemaConfig {
            required_columns: file.required_columns.unwrap_or(defaults.required_columns),
            numeric_columns: file.numeric_columns.unwrap_or(defaults.numeric_columns),
            date_column: file.date_column.unwrap_or(defaults.date_column),
            currency_symbol: var("ETL_CURRENCY_SYMBOL")
                .or(file.currency_symbol)
                .unwrap_or(defaults.currency_symbol),
            number_format,
        };

        let log_file = var("ETL_LOG_FILE")
            .map(PathBuf::from)
            .or(file.log_file)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

        Ok(Config {
            source,
            discovery,
            sink,
            schema,
            log_file,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(file: FileConfig, vars: &[(&str, &str)]) -> Result<Config, EtlError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(file, |k| vars.get(k).cloned())
    }

    #[test]
    fn only_a_missing_dotenv_is_silent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let absent = dotenvy::from_path(dir.path().join(".env"));
        assert!(dotenv_problem(absent).is_none());

        let broken = dir.path().join("broken.env");
        fs::write(&broken, "THIS LINE HAS NO EQUALS SIGN\n")?;
        let err = dotenv_problem(dotenvy::from_path(&broken));
        assert!(matches!(err, Some(dotenvy::Error::LineParse(..))), "{:?}", err);
        Ok(())
    }

    #[test]
    fn missing_credentials_is_a_configuration_error() {
        let err = resolve(FileConfig::default(), &[]).unwrap_err();
        assert!(matches!(err, EtlError::Configuration(_)));
        assert!(err.is_fatal());

        let err = resolve(FileConfig::default(), &[("GOOGLE_CREDENTIALS_PATH", "  ")]).unwrap_err();
        assert!(matches!(err, EtlError::Configuration(_)));
    }

    #[test]
    fn defaults_match_the_sales_warehouse() {
        let cfg = resolve(FileConfig::default(), &[("GOOGLE_CREDENTIALS_PATH", "sa.json")]).unwrap();
        assert_eq!(
            cfg.source,
            SourceConfig::Google {
                credentials_path: PathBuf::from("sa.json")
            }
        );
        assert_eq!(cfg.discovery, Discovery::Pattern("vendas -".into()));
        assert_eq!(
            cfg.sink,
            SinkTarget::Database {
                path: PathBuf::from("vendas_dw.db"),
                table: "tb_vendas_consolidadas".into()
            }
        );
        assert_eq!(cfg.schema, SchemaConfig::default());
        assert_eq!(cfg.log_file, PathBuf::from("processo_etl.log"));
    }

    #[test]
    fn explicit_sheet_list_selects_names_mode() {
        let cfg = resolve(
            FileConfig::default(),
            &[
                ("GOOGLE_CREDENTIALS_PATH", "sa.json"),
                ("ETL_SHEETS", "Vendas - Jan, Vendas - Fev,,"),
                ("ETL_SINK", "file"),
            ],
        )
        .unwrap();
        assert_eq!(
            cfg.discovery,
            Discovery::Names(vec!["Vendas - Jan".into(), "Vendas - Fev".into()])
        );
        assert_eq!(
            cfg.sink,
            SinkTarget::File {
                path: PathBuf::from(DEFAULT_OUTPUT_PATH)
            }
        );
    }

    #[test]
    fn environment_overrides_yaml() {
        let file = FileConfig::parse(
            r#"
source_dir: ./sheets
pattern: "relatorio"
sink: file
output_path: out.parquet
number_format: comma-decimal
required_columns: [Date, Total]
"#,
        )
        .unwrap();
        let cfg = resolve(file, &[("ETL_PATTERN", "vendas 2024")]).unwrap();
        assert_eq!(
            cfg.source,
            SourceConfig::Local {
                dir: PathBuf::from("./sheets")
            }
        );
        assert_eq!(cfg.discovery, Discovery::Pattern("vendas 2024".into()));
        assert_eq!(
            cfg.sink,
            SinkTarget::File {
                path: PathBuf::from("out.parquet")
            }
        );
        assert_eq!(cfg.schema.number_format, NumberFormat::CommaDecimal);
        assert_eq!(cfg.schema.required_columns, vec!["Date", "Total"]);
    }

    #[test]
    fn unknown_values_are_rejected() {
        let err = resolve(
            FileConfig::default(),
            &[("ETL_SOURCE_DIR", "x"), ("ETL_SINK", "s3")],
        )
        .unwrap_err();
        assert!(err.to_string().contains("s3"));

        let err = resolve(
            FileConfig::default(),
            &[("ETL_SOURCE_DIR", "x"), ("ETL_NUMBER_FORMAT", "roman")],
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::Configuration(_)));

        assert!(FileConfig::parse("bogus_key: 1").is_err());
    }
}
