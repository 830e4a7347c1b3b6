//! Currency and date coercion for the consolidated table.
//!
//! Values that do not parse become nulls; nothing here can fail a run.

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{fmt, str::FromStr};
use tracing::{debug, warn};

use crate::config::SchemaConfig;
use crate::consolidate::{Column, ColumnValues, ConsolidatedTable};

/// How `.` and `,` are read in numeric cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NumberFormat {
    /// pt-BR style: `,` is the decimal mark and `.` groups thousands.
    /// Without a `,`, dots count as grouping only in the exact `1.234.567`
    /// shape, so `1234.56` still reads as a decimal.
    #[default]
    ThousandsDot,
    /// Only `,` → `.`; dots are left alone, so `1.234,56` is unparseable.
    CommaDecimal,
}

impl NumberFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumberFormat::ThousandsDot => "thousands-dot",
            NumberFormat::CommaDecimal => "comma-decimal",
        }
    }
}

impl fmt::Display for NumberFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NumberFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "thousands-dot" => Ok(NumberFormat::ThousandsDot),
            "comma-decimal" => Ok(NumberFormat::CommaDecimal),
            other => Err(format!(
                "unknown number format `{}` (expected `thousands-dot` or `comma-decimal`)",
                other
            )),
        }
    }
}

static DOT_GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d{1,3}(\.\d{3})+$").expect("grouping regex"));

/// Parse a locale-formatted amount such as `R$ 1.234,56`.
pub fn parse_number(raw: &str, currency_symbol: &str, format: NumberFormat) -> Option<f64> {
    let stripped = if currency_symbol.is_empty() {
        raw.to_string()
    } else {
        raw.replace(currency_symbol, "")
    };
    let cleaned: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return None;
    }

    let canonical = match format {
        NumberFormat::ThousandsDot if cleaned.contains(',') => {
            cleaned.replace('.', "").replace(',', ".")
        }
        NumberFormat::ThousandsDot if DOT_GROUPED.is_match(&cleaned) => cleaned.replace('.', ""),
        NumberFormat::ThousandsDot => cleaned,
        NumberFormat::CommaDecimal => cleaned.replace(',', "."),
    };
    canonical.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Day-first layouts, two-digit years before four so `%Y` never eats `24`.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%y", "%d/%m/%Y", "%d-%m-%y", "%d-%m-%Y", "%d.%m.%y", "%d.%m.%Y", "%Y-%m-%d",
    "%Y/%m/%d",
];

/// Time-of-day suffixes accepted after any date layout; the time is dropped.
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Only tried once no day-first reading exists, e.g. `03/25/2024`.
const MONTH_FIRST_FALLBACK: &str = "%m/%d/%Y";

fn parse_calendar_day(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
        .or_else(|| NaiveDate::parse_from_str(s, MONTH_FIRST_FALLBACK).ok())
}

/// Date part of `05-03-2024 14:30` or `2024-03-05T08:00:00`, if the rest is a time.
fn strip_time(s: &str) -> Option<&str> {
    let (day, time) = s.split_once(|c: char| c == 'T' || c.is_whitespace())?;
    let time = time.trim();
    TIME_FORMATS
        .iter()
        .any(|f| NaiveTime::parse_from_str(time, f).is_ok())
        .then_some(day)
}

/// Best-effort day-before-month date parse.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    parse_calendar_day(s).or_else(|| strip_time(s).and_then(parse_calendar_day))
}

/// Coerce the configured numeric and date columns. Columns that are already
/// typed pass through untouched, which makes the operation idempotent.
pub fn normalize(table: ConsolidatedTable, schema: &SchemaConfig) -> ConsolidatedTable {
    let columns = table
        .columns
        .into_iter()
        .map(|col| {
            let Column { name, values } = col;
            let values = match values {
                ColumnValues::Text(cells) if schema.numeric_columns.contains(&name) => {
                    let parsed: Vec<Option<f64>> = cells
                        .iter()
                        .map(|c| {
                            c.as_deref().and_then(|s| {
                                parse_number(s, &schema.currency_symbol, schema.number_format)
                            })
                        })
                        .collect();
                    report_nulls(&name, &cells, &parsed);
                    ColumnValues::Number(parsed)
                }
                ColumnValues::Text(cells) if name == schema.date_column => {
                    let parsed: Vec<Option<NaiveDate>> = cells
                        .iter()
                        .map(|c| c.as_deref().and_then(parse_date))
                        .collect();
                    report_nulls(&name, &cells, &parsed);
                    ColumnValues::Date(parsed)
                }
                other => other,
            };
            Column { name, values }
        })
        .collect();
    ConsolidatedTable::new(columns)
}

fn report_nulls<T>(column: &str, raw: &[Option<String>], parsed: &[Option<T>]) {
    let failed = raw
        .iter()
        .zip(parsed)
        .filter(|(r, p)| p.is_none() && r.as_deref().is_some_and(|s| !s.trim().is_empty()))
        .count();
    if failed > 0 {
        warn!(column, failed, "unparseable values set to null");
    } else {
        debug!(column, "normalized");
    }
}
