use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use glob::glob;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{SpreadsheetRef, SpreadsheetService, WorksheetHandle};

/// Serves every `*.csv` in a directory as a one-worksheet spreadsheet titled
/// by the file stem. The spreadsheet id is the file path.
pub struct LocalSheets {
    dir: PathBuf,
}

impl LocalSheets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl SpreadsheetService for LocalSheets {
    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetRef>> {
        if !self.dir.is_dir() {
            return Err(anyhow!("{} is not a directory", self.dir.display()));
        }
        let pattern = format!("{}/*.csv", self.dir.display());
        let mut out = Vec::new();
        for entry in glob(&pattern)? {
            match entry {
                Ok(path) => {
                    if let Some(title) = path.file_stem().and_then(|s| s.to_str()) {
                        out.push(SpreadsheetRef {
                            id: path.to_string_lossy().into_owned(),
                            title: title.to_string(),
                        });
                    }
                }
                Err(e) => warn!("skipping unreadable entry: {}", e),
            }
        }
        Ok(out)
    }

    async fn open_by_title(&self, title: &str) -> Result<Option<SpreadsheetRef>> {
        let path = self.dir.join(format!("{}.csv", title));
        Ok(path.is_file().then(|| SpreadsheetRef {
            id: path.to_string_lossy().into_owned(),
            title: title.to_string(),
        }))
    }

    async fn first_worksheet(&self, sheet: &SpreadsheetRef) -> Result<WorksheetHandle> {
        Ok(WorksheetHandle {
            spreadsheet: sheet.clone(),
            worksheet: "Sheet1".to_string(),
        })
    }

    async fn read_values(&self, ws: &WorksheetHandle) -> Result<Vec<Vec<String>>> {
        read_grid(Path::new(&ws.spreadsheet.id))
    }
}

fn read_grid(path: &Path) -> Result<Vec<Vec<String>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let mut grid = Vec::new();
    for rec in rdr.records() {
        let rec = rec.with_context(|| format!("parsing {}", path.display()))?;
        grid.push(rec.iter().map(String::from).collect());
    }
    Ok(grid)
}
