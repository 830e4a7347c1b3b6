use tracing::{error, info, warn};

use crate::sheets::{SpreadsheetRef, SpreadsheetService, WorksheetHandle};

/// How source spreadsheets are found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// Case-insensitive substring of the spreadsheet title.
    Pattern(String),
    /// Exact titles, tried in order.
    Names(Vec<String>),
}

/// Result of the listing step. `skipped` holds the names that could not be
/// resolved to a worksheet, for the run report.
#[derive(Debug, Default)]
pub struct Discovered {
    pub worksheets: Vec<WorksheetHandle>,
    pub skipped: Vec<String>,
}

/// Resolve `discovery` into first-worksheet handles. Never fails: a listing
/// error yields an empty result, a bad candidate is skipped.
pub async fn list_worksheets<S: SpreadsheetService>(
    service: &S,
    discovery: &Discovery,
) -> Discovered {
    let mut out = Discovered::default();

    let candidates: Vec<SpreadsheetRef> = match discovery {
        Discovery::Pattern(pattern) => {
            let needle = pattern.to_lowercase();
            match service.list_spreadsheets().await {
                Ok(all) => all
                    .into_iter()
                    .filter(|s| s.title.to_lowercase().contains(&needle))
                    .collect(),
                Err(e) => {
                    error!("listing spreadsheets failed: {:#}", e);
                    return out;
                }
            }
        }
        Discovery::Names(names) => {
            let mut found = Vec::with_capacity(names.len());
            for name in names {
                match service.open_by_title(name).await {
                    Ok(Some(sheet)) => found.push(sheet),
                    Ok(None) => {
                        warn!(source = %name, "spreadsheet not found, skipping");
                        out.skipped.push(name.clone());
                    }
                    Err(e) => {
                        warn!(source = %name, "lookup failed, skipping: {:#}", e);
                        out.skipped.push(name.clone());
                    }
                }
            }
            found
        }
    };

    for sheet in candidates {
        match service.first_worksheet(&sheet).await {
            Ok(ws) => {
                info!(source = %sheet.title, worksheet = %ws.worksheet, "extracting");
                out.worksheets.push(ws);
            }
            Err(e) => {
                error!(source = %sheet.title, "cannot open first worksheet: {:#}", e);
                out.skipped.push(sheet.title);
            }
        }
    }
    out
}
