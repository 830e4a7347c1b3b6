// src/sheets/google.rs

use anyhow::{anyhow, Context, Result};
use google_cloud_auth::{
    credentials::CredentialsFile,
    project::{create_token_source_from_credentials, Config as AuthConfig},
    token_source::TokenSource,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use std::path::Path;
use tracing::debug;
use url::Url;

use super::{SpreadsheetRef, SpreadsheetService, WorksheetHandle};

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const SHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";
const PAGE_SIZE: &str = "1000";

static SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct DriveFile {
    id: String,
    name: String,
}

#[derive(Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: u32,
}

/// `values.get` body. Empty worksheets omit `values`.
#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Drive v3 + Sheets v4 client authenticated as a service account.
pub struct GoogleSheets {
    http: Client,
    tokens: Box<dyn TokenSource>,
}

impl GoogleSheets {
    /// Load the key file and obtain a first access token. Any failure here
    /// means the run cannot reach the service at all.
    pub async fn connect(credentials_path: &Path) -> Result<Self> {
        let creds =
            CredentialsFile::new_from_file(credentials_path.to_string_lossy().into_owned())
                .await
                .with_context(|| {
                    format!("loading credentials from {}", credentials_path.display())
                })?;
        let config = AuthConfig::default().with_scopes(SCOPES);
        let tokens = create_token_source_from_credentials(&creds, &config)
            .await
            .context("creating token source")?;
        tokens.token().await.context("requesting access token")?;
        Ok(Self {
            http: Client::new(),
            tokens,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let token = self
            .tokens
            .token()
            .await
            .context("refreshing access token")?;
        let resp = self
            .http
            .get(url.clone())
            .bearer_auth(&token.access_token)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?
            .error_for_status()
            .with_context(|| format!("GET {}", url))?;
        resp.json::<T>()
            .await
            .with_context(|| format!("decoding response from {}", url))
    }

    /// Page through `files.list` for spreadsheets matching `query`.
    async fn list_files(&self, query: &str) -> Result<Vec<SpreadsheetRef>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let url = files_url(query, page_token.as_deref())?;
            let page: FileList = self.get_json(url).await?;
            out.extend(page.files.into_iter().map(|f| SpreadsheetRef {
                id: f.id,
                title: f.name,
            }));
            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }
        debug!(count = out.len(), "drive listing");
        Ok(out)
    }
}

impl SpreadsheetService for GoogleSheets {
    async fn list_spreadsheets(&self) -> Result<Vec<SpreadsheetRef>> {
        self.list_files(&spreadsheet_query(None)).await
    }

    async fn open_by_title(&self, title: &str) -> Result<Option<SpreadsheetRef>> {
        let found = self.list_files(&spreadsheet_query(Some(title))).await?;
        Ok(found.into_iter().next())
    }

    async fn first_worksheet(&self, sheet: &SpreadsheetRef) -> Result<WorksheetHandle> {
        let mut url = spreadsheet_url(&[&sheet.id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");
        let meta: SpreadsheetMeta = self.get_json(url).await?;
        let first = meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .min_by_key(|p| p.index)
            .ok_or_else(|| anyhow!("spreadsheet `{}` has no worksheets", sheet.title))?;
        Ok(WorksheetHandle {
            spreadsheet: sheet.clone(),
            worksheet: first.title,
        })
    }

    async fn read_values(&self, ws: &WorksheetHandle) -> Result<Vec<Vec<String>>> {
        let mut url = values_url(&ws.spreadsheet.id, &ws.worksheet)?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "FORMATTED_VALUE");
        let range: ValueRange = self.get_json(url).await?;
        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}

/// Drive `q` expression for spreadsheets, optionally with an exact title.
fn spreadsheet_query(title: Option<&str>) -> String {
    let mut q = format!(
        "mimeType={} and trashed=false",
        drive_literal(SPREADSHEET_MIME)
    );
    if let Some(t) = title {
        q.push_str(&format!(" and name={}", drive_literal(t)));
    }
    q
}

fn drive_literal(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn files_url(query: &str, page_token: Option<&str>) -> Result<Url> {
    let mut url = Url::parse(DRIVE_FILES_URL)?;
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("q", query)
            .append_pair("pageSize", PAGE_SIZE)
            .append_pair("fields", "nextPageToken,files(id,name)")
            .append_pair("supportsAllDrives", "true")
            .append_pair("includeItemsFromAllDrives", "true");
        if let Some(t) = page_token {
            q.append_pair("pageToken", t);
        }
    }
    Ok(url)
}

fn spreadsheet_url(segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(SHEETS_URL)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot be a base URL", SHEETS_URL))?
        .extend(segments);
    Ok(url)
}

/// `values.get` URL covering the whole worksheet. The tab title is quoted as
/// an A1 sheet reference and percent-encoded as one path segment.
fn values_url(spreadsheet_id: &str, worksheet: &str) -> Result<Url> {
    let range = format!("'{}'", worksheet.replace('\'', "''"));
    spreadsheet_url(&[spreadsheet_id, "values", &range])
}

fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EtlError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn title_lookup_query_escapes_quotes() {
        let q = spreadsheet_query(Some("Vendas - D'Ávila"));
        assert_eq!(
            q,
            "mimeType='application/vnd.google-apps.spreadsheet' and trashed=false \
             and name='Vendas - D\\'Ávila'"
        );
        assert!(!spreadsheet_query(None).contains("name="));
    }

    #[test]
    fn files_url_carries_paging() -> Result<()> {
        let url = files_url("mimeType='x'", Some("tok123"))?;
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".into(), "mimeType='x'".into())));
        assert!(pairs.contains(&("pageToken".into(), "tok123".into())));
        assert!(pairs.contains(&("supportsAllDrives".into(), "true".into())));
        assert!(files_url("q", None)?.query_pairs().all(|(k, _)| k != "pageToken"));
        Ok(())
    }

    #[test]
    fn values_url_quotes_tab_title() -> Result<()> {
        let url = values_url("abc123", "Página 1/Jan's")?;
        let segs: Vec<&str> = url.path_segments().unwrap().collect();
        assert_eq!(segs[..4], ["v4", "spreadsheets", "abc123", "values"]);
        // one segment: `/` must not split the range
        assert_eq!(segs.len(), 5);
        assert!(segs[4].starts_with("'P"));
        assert!(segs[4].contains("%2F"));
        assert!(segs[4].ends_with("''s'"));
        Ok(())
    }

    #[test]
    fn decodes_value_ranges() -> Result<()> {
        let body = r#"{"range":"'S'!A1:C2","majorDimension":"ROWS",
            "values":[["Date","Total"],["05/03/2024",12.5,null]]}"#;
        let vr: ValueRange = serde_json::from_str(body)?;
        let grid: Vec<Vec<String>> = vr
            .values
            .into_iter()
            .map(|r| r.into_iter().map(cell_text).collect())
            .collect();
        assert_eq!(grid[1], vec!["05/03/2024", "12.5", ""]);

        let empty: ValueRange = serde_json::from_str(r#"{"range":"'S'!A1:Z1000"}"#)?;
        assert!(empty.values.is_empty());
        Ok(())
    }

    #[test]
    fn first_worksheet_is_lowest_index() -> Result<()> {
        let body = r#"{"sheets":[{"properties":{"title":"Resumo","index":1}},
                                 {"properties":{"title":"Dados"}}]}"#;
        let meta: SpreadsheetMeta = serde_json::from_str(body)?;
        let first = meta
            .sheets
            .into_iter()
            .map(|s| s.properties)
            .min_by_key(|p| p.index)
            .unwrap();
        assert_eq!(first.title, "Dados");
        Ok(())
    }

    #[tokio::test]
    async fn unusable_key_file_is_a_fatal_connection_error() -> Result<()> {
        let dir = tempdir()?;
        let missing = dir.path().join("service-account.json");
        let malformed = dir.path().join("broken.json");
        fs::write(&malformed, "{ \"type\": \"service_account\", ")?;

        for path in [missing, malformed] {
            let cause = match GoogleSheets::connect(&path).await {
                Ok(_) => panic!("connected using {}", path.display()),
                Err(e) => e,
            };
            assert!(format!("{:#}", cause).contains("loading credentials"));
            assert!(EtlError::Connection(cause).is_fatal());
        }
        Ok(())
    }
}
