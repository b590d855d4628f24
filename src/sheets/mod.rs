pub mod append;
pub mod google;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// A tab (worksheet) inside one spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tab {
    pub id: i64,
    pub title: String,
    pub index: i64,
}

/// Operations the remote spreadsheet provider has to offer.
///
/// Row indexes are 1-based, as the provider shows them.
pub trait SheetsBackend: Send + Sync {
    fn open_by_name(&self, name: &str) -> Result<String>;
    fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<Tab>>;
    fn all_values(&self, spreadsheet_id: &str, tab: &Tab) -> Result<Vec<Vec<String>>>;
    fn insert_row(
        &self,
        spreadsheet_id: &str,
        tab: &Tab,
        index: usize,
        values: &[String],
    ) -> Result<()>;
    fn append_row(&self, spreadsheet_id: &str, tab: &Tab, values: &[String]) -> Result<()>;
}

/// Header row plus data rows of a tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecordTable {
    /// First row is the header; data rows are padded or cut to the header width.
    pub fn from_values(mut values: Vec<Vec<String>>) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let headers = values.remove(0);
        let width = headers.len();
        let rows = values
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Opens the configured spreadsheet and hands out worksheets by tab name.
#[derive(Clone)]
pub struct SheetAccessor {
    backend: Arc<dyn SheetsBackend>,
    spreadsheet_name: String,
    spreadsheet_id: Option<String>,
}

impl SheetAccessor {
    pub fn new(
        backend: Arc<dyn SheetsBackend>,
        spreadsheet_name: impl Into<String>,
        spreadsheet_id: Option<String>,
    ) -> Self {
        Self {
            backend,
            spreadsheet_name: spreadsheet_name.into(),
            spreadsheet_id,
        }
    }

    pub fn spreadsheet_id(&self) -> Result<String> {
        match &self.spreadsheet_id {
            Some(id) => Ok(id.clone()),
            None => self
                .backend
                .open_by_name(&self.spreadsheet_name)
                .with_context(|| format!("Failed to open spreadsheet: {}", self.spreadsheet_name)),
        }
    }

    pub fn tabs(&self) -> Result<Vec<Tab>> {
        let spreadsheet_id = self.spreadsheet_id()?;
        self.backend.list_tabs(&spreadsheet_id)
    }

    /// Returns the tab titled exactly `name`, or the first tab when there is none.
    pub fn worksheet(&self, name: &str) -> Result<Worksheet> {
        let spreadsheet_id = self.spreadsheet_id()?;
        let mut tabs = self.backend.list_tabs(&spreadsheet_id)?;
        tabs.sort_by_key(|tab| tab.index);

        let tab = match tabs.iter().position(|tab| tab.title == name) {
            Some(position) => tabs.swap_remove(position),
            None => {
                if tabs.is_empty() {
                    bail!("Spreadsheet {} has no tabs", self.spreadsheet_name);
                }
                let first = tabs.swap_remove(0);
                warn!(requested = %name, fallback = %first.title, "tab not found, using first tab");
                first
            }
        };

        Ok(Worksheet {
            backend: Arc::clone(&self.backend),
            spreadsheet_id,
            tab,
        })
    }
}

pub struct Worksheet {
    backend: Arc<dyn SheetsBackend>,
    spreadsheet_id: String,
    tab: Tab,
}

impl Worksheet {
    pub fn title(&self) -> &str {
        &self.tab.title
    }

    pub fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        self.backend
            .all_values(&self.spreadsheet_id, &self.tab)
            .with_context(|| format!("Failed to read tab: {}", self.tab.title))
    }

    pub fn get_all_records(&self) -> Result<RecordTable> {
        Ok(RecordTable::from_values(self.get_all_values()?))
    }

    pub fn insert_row(&self, values: &[String], index: usize) -> Result<()> {
        if index == 0 {
            bail!("Row index is 1-based");
        }

        self.backend
            .insert_row(&self.spreadsheet_id, &self.tab, index, values)
            .with_context(|| format!("Failed to insert row {index} into tab: {}", self.tab.title))
    }

    pub fn append_row(&self, values: &[String]) -> Result<()> {
        self.backend
            .append_row(&self.spreadsheet_id, &self.tab, values)
            .with_context(|| format!("Failed to append row to tab: {}", self.tab.title))
    }
}
