//! Access to the remote spreadsheet service.
//!
//! The pipeline only sees [`SpreadsheetService`]; [`google::GoogleSheets`] talks to
//! Drive/Sheets over REST, [`local::LocalSheets`] serves a directory of CSV files.

pub mod google;
pub mod local;

use anyhow::Result;

pub use google::GoogleSheets;
pub use local::LocalSheets;

/// A spreadsheet visible to the service account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetRef {
    pub id: String,
    pub title: String,
}

/// The first tab of a spreadsheet, ready to be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetHandle {
    pub spreadsheet: SpreadsheetRef,
    pub worksheet: String,
}

impl WorksheetHandle {
    /// Name used in logs and rejection reports.
    pub fn source_name(&self) -> &str {
        &self.spreadsheet.title
    }
}

#[allow(async_fn_in_trait)]
pub trait SpreadsheetService {
    /// Every spreadsheet the account can see, in service order.
    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetRef>>;

    /// Exact-title lookup; `Ok(None)` when nothing has that title.
    async fn open_by_title(&self, title: &str) -> Result<Option<SpreadsheetRef>>;

    /// Resolve the first worksheet (lowest tab index) of a spreadsheet.
    async fn first_worksheet(&self, sheet: &SpreadsheetRef) -> Result<WorksheetHandle>;

    /// All cell values of the worksheet as displayed, row-major.
    async fn read_values(&self, ws: &WorksheetHandle) -> Result<Vec<Vec<String>>>;
}

/// Runtime choice of backend.
pub enum Backend {
    Google(GoogleSheets),
    Local(LocalSheets),
}

impl SpreadsheetService for Backend {
    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetRef>> {
        match self {
            Backend::Google(s) => s.list_spreadsheets().await,
            Backend::Local(s) => s.list_spreadsheets().await,
        }
    }

    async fn open_by_title(&self, title: &str) -> Result<Option<SpreadsheetRef>> {
        match self {
            Backend::Google(s) => s.open_by_title(title).await,
            Backend::Local(s) => s.open_by_title(title).await,
        }
    }

    async fn first_worksheet(&self, sheet: &SpreadsheetRef) -> Result<WorksheetHandle> {
        match self {
            Backend::Google(s) => s.first_worksheet(sheet).await,
            Backend::Local(s) => s.first_worksheet(sheet).await,
        }
    }

    async fn read_values(&self, ws: &WorksheetHandle) -> Result<Vec<Vec<String>>> {
        match self {
            Backend::Google(s) => s.read_values(ws).await,
            Backend::Local(s) => s.read_values(ws).await,
        }
    }
}
