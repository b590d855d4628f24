use crate::config::Config;
use crate::sheets::{SheetsBackend, Tab};
use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const SPREADSHEET_MIME: &str = "application/vnd.google-apps.spreadsheet";

#[derive(Debug, Deserialize)]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

#[derive(Debug, Deserialize)]
struct DriveFile {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    sheet_id: i64,
    title: String,
    #[serde(default)]
    index: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Google Sheets v4 / Drive v3 over REST with a bearer token.
pub struct GoogleSheets {
    sheets_base_url: String,
    drive_base_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl GoogleSheets {
    pub fn new(config: &Config) -> Self {
        Self {
            sheets_base_url: config.sheets_api_base_url.clone(),
            drive_base_url: config.drive_api_base_url.clone(),
            access_token: config.sheets_access_token.clone(),
            timeout: config.http_timeout(),
        }
    }

    fn client(&self) -> Result<Client> {
        let token = self
            .access_token
            .as_deref()
            .filter(|token| !token.trim().is_empty())
            .context("Spreadsheet access token is missing. Set `sheets.token` or FIELDREPORT_SHEETS_TOKEN.")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))
                .context("Failed to build Authorization header")?,
        );

        Client::builder()
            .timeout(self.timeout)
            .default_headers(headers)
            .build()
            .context("Failed to create spreadsheet HTTP client")
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str, suffix: &str) -> Result<Url> {
        endpoint(
            &self.sheets_base_url,
            &[
                "spreadsheets",
                spreadsheet_id,
                "values",
                &format!("{range}{suffix}"),
            ],
        )
    }
}

impl SheetsBackend for GoogleSheets {
    fn open_by_name(&self, name: &str) -> Result<String> {
        let mut url = endpoint(&self.drive_base_url, &["files"])?;
        url.query_pairs_mut()
            .append_pair("q", &drive_name_query(name))
            .append_pair("fields", "files(id,name)")
            .append_pair("supportsAllDrives", "true")
            .append_pair("includeItemsFromAllDrives", "true");

        let listing: DriveFileList = send_json(self.client()?.get(url), "Drive files.list")?;

        listing
            .files
            .into_iter()
            .next()
            .map(|file| file.id)
            .ok_or_else(|| anyhow!("Spreadsheet not found: {name}"))
    }

    fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<Tab>> {
        let mut url = endpoint(&self.sheets_base_url, &["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(sheetId,title,index)");

        let meta: SpreadsheetMeta = send_json(self.client()?.get(url), "spreadsheets.get")?;

        Ok(meta
            .sheets
            .into_iter()
            .map(|entry| Tab {
                id: entry.properties.sheet_id,
                title: entry.properties.title,
                index: entry.properties.index,
            })
            .collect())
    }

    fn all_values(&self, spreadsheet_id: &str, tab: &Tab) -> Result<Vec<Vec<String>>> {
        let url = self.values_url(spreadsheet_id, &quote_tab(&tab.title), "")?;
        let range: ValueRange = send_json(self.client()?.get(url), "values.get")?;

        Ok(range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    fn insert_row(
        &self,
        spreadsheet_id: &str,
        tab: &Tab,
        index: usize,
        values: &[String],
    ) -> Result<()> {
        let batch_url = endpoint(
            &self.sheets_base_url,
            &["spreadsheets", &format!("{spreadsheet_id}:batchUpdate")],
        )?;
        let _: Value = send_json(
            self.client()?
                .post(batch_url)
                .json(&insert_row_request(tab.id, index, values)),
            "batchUpdate insertDimension+updateCells",
        )?;

        Ok(())
    }

    fn append_row(&self, spreadsheet_id: &str, tab: &Tab, values: &[String]) -> Result<()> {
        let mut url = self.values_url(spreadsheet_id, &quote_tab(&tab.title), ":append")?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let _: Value = send_json(
            self.client()?.post(url).json(&json!({
                "majorDimension": "ROWS",
                "values": [values],
            })),
            "values.append",
        )?;

        Ok(())
    }
}

fn send_json<T: DeserializeOwned>(request: RequestBuilder, operation: &str) -> Result<T> {
    let response = request
        .send()
        .with_context(|| format!("Spreadsheet request failed: {operation}"))?;

    let status = response.status();
    let body = response
        .text()
        .with_context(|| format!("Failed to read {operation} response body"))?;

    if !status.is_success() {
        bail!("Spreadsheet API error {} on {}: {}", status, operation, body);
    }

    serde_json::from_str(&body)
        .with_context(|| format!("Failed to parse {operation} response: {body}"))
}

fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url.trim_end_matches('/'))
        .with_context(|| format!("Invalid API base URL: {base_url}"))?;

    url.path_segments_mut()
        .map_err(|_| anyhow!("API base URL cannot be a base: {base_url}"))?
        .extend(segments);

    Ok(url)
}

/// A1-notation sheet reference, always quoted.
fn quote_tab(title: &str) -> String {
    format!("'{}'", title.replace('\'', "''"))
}

fn drive_name_query(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\").replace('\'', "\\'");
    format!("name = '{escaped}' and mimeType = '{SPREADSHEET_MIME}' and trashed = false")
}

/// Opens an empty row at `index` (1-based) and fills it within one batch.
fn insert_row_request(sheet_id: i64, index: usize, values: &[String]) -> Value {
    let cells = values
        .iter()
        .map(|value| json!({ "userEnteredValue": { "stringValue": value } }))
        .collect::<Vec<_>>();

    json!({
        "requests": [
            {
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": "ROWS",
                        "startIndex": index - 1,
                        "endIndex": index,
                    },
                    "inheritFromBefore": index > 1,
                }
            },
            {
                "updateCells": {
                    "start": {
                        "sheetId": sheet_id,
                        "rowIndex": index - 1,
                        "columnIndex": 0,
                    },
                    "rows": [{ "values": cells }],
                    "fields": "userEnteredValue",
                }
            }
        ]
    })
}

fn cell_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{cell_text, drive_name_query, endpoint, insert_row_request, quote_tab};
    use crate::testing::row;
    use serde_json::json;

    #[test]
    fn tab_titles_are_quoted_for_a1_ranges() {
        assert_eq!(quote_tab("Controle_GDM"), "'Controle_GDM'");
        assert_eq!(quote_tab("Loja d'Ana"), "'Loja d''Ana'");
    }

    #[test]
    fn endpoint_encodes_range_segments() {
        let url = endpoint(
            "https://sheets.googleapis.com/v4/",
            &["spreadsheets", "abc", "values", "'Minha Aba'!A5"],
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/abc/values/'Minha%20Aba'!A5"
        );
    }

    #[test]
    fn batch_update_keeps_colon_suffix() {
        let url = endpoint(
            "https://sheets.googleapis.com/v4",
            &["spreadsheets", "abc:batchUpdate"],
        )
        .unwrap();
        assert!(url.as_str().ends_with("/spreadsheets/abc:batchUpdate"));
    }

    #[test]
    fn drive_query_escapes_quotes() {
        let query = drive_name_query("Sistema d'Ana");
        assert!(query.starts_with("name = 'Sistema d\\'Ana'"));
        assert!(query.contains("trashed = false"));
    }

    #[test]
    fn insert_and_fill_share_one_batch() {
        let request = insert_row_request(7, 5, &row(&["14/02/2026 16:45", "Ana", "0042"]));
        let requests = request["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);

        let range = &requests[0]["insertDimension"]["range"];
        assert_eq!(range["sheetId"], json!(7));
        assert_eq!(range["startIndex"], json!(4));
        assert_eq!(range["endIndex"], json!(5));
        assert_eq!(requests[0]["insertDimension"]["inheritFromBefore"], json!(true));

        let update = &requests[1]["updateCells"];
        assert_eq!(update["start"]["rowIndex"], json!(4));
        assert_eq!(update["start"]["columnIndex"], json!(0));
        assert_eq!(update["fields"], json!("userEnteredValue"));
        let cells = update["rows"][0]["values"].as_array().unwrap();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[2]["userEnteredValue"]["stringValue"], json!("0042"));
    }

    #[test]
    fn first_row_does_not_inherit_formatting() {
        let request = insert_row_request(7, 1, &[]);
        assert_eq!(
            request["requests"][0]["insertDimension"]["inheritFromBefore"],
            json!(false)
        );
        assert_eq!(request["requests"][1]["updateCells"]["start"]["rowIndex"], json!(0));
    }

    #[test]
    fn non_string_cells_become_text() {
        assert_eq!(cell_text(json!("Ana")), "Ana");
        assert_eq!(cell_text(json!(1234)), "1234");
        assert_eq!(cell_text(json!(null)), "");
    }
}
