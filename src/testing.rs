//! In-memory stand-ins for the spreadsheet, image host and mail relay.

use crate::config::Config;
use crate::report::mailer::MailSender;
use crate::sheets::{SheetsBackend, Tab};
use crate::uploader::{ImageFile, ImageHost};
use anyhow::{Context, Result, anyhow, bail};
use lettre::Message;
use std::sync::Mutex;

const SPREADSHEET_NAME: &str = "Dados";
const SPREADSHEET_ID: &str = "mem-sheet-1";

pub fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|cell| cell.to_string()).collect()
}

pub fn test_config() -> Config {
    Config {
        spreadsheet_name: SPREADSHEET_NAME.to_string(),
        mail_username: Some("promo@example.com".to_string()),
        mail_password: Some("app-password".to_string()),
        report_recipient: Some("admin@example.com".to_string()),
        admin_password: Some("segredo".to_string()),
        ..Config::default()
    }
}

#[derive(Default)]
struct MemoryState {
    tabs: Vec<(Tab, Vec<Vec<String>>)>,
    insert_calls: Vec<(String, usize)>,
    fail_reads: bool,
    fail_writes: bool,
}

pub struct MemorySheets {
    state: Mutex<MemoryState>,
}

impl MemorySheets {
    pub fn with_tabs(titles: &[&str]) -> Self {
        let tabs = titles
            .iter()
            .enumerate()
            .map(|(position, title)| {
                let tab = Tab {
                    id: position as i64 * 100,
                    title: title.to_string(),
                    index: position as i64,
                };
                (tab, Vec::new())
            })
            .collect();

        Self {
            state: Mutex::new(MemoryState {
                tabs,
                ..MemoryState::default()
            }),
        }
    }

    pub fn spreadsheet_id(&self) -> &'static str {
        SPREADSHEET_ID
    }

    pub fn seed(&self, title: &str, rows: Vec<Vec<String>>) {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .tabs
            .iter_mut()
            .find(|(tab, _)| tab.title == title)
            .expect("seeded tab exists");
        entry.1 = rows;
    }

    pub fn rows(&self, title: &str) -> Vec<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .tabs
            .iter()
            .find(|(tab, _)| tab.title == title)
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default()
    }

    pub fn insert_calls(&self) -> Vec<(String, usize)> {
        self.state.lock().unwrap().insert_calls.clone()
    }

    pub fn fail_reads(&self) {
        self.state.lock().unwrap().fail_reads = true;
    }

    pub fn fail_writes(&self) {
        self.state.lock().unwrap().fail_writes = true;
    }

    fn check_id(spreadsheet_id: &str) -> Result<()> {
        if spreadsheet_id != SPREADSHEET_ID {
            bail!("unknown spreadsheet id: {spreadsheet_id}");
        }
        Ok(())
    }
}

impl SheetsBackend for MemorySheets {
    fn open_by_name(&self, name: &str) -> Result<String> {
        if name == SPREADSHEET_NAME {
            Ok(SPREADSHEET_ID.to_string())
        } else {
            Err(anyhow!("Spreadsheet not found: {name}"))
        }
    }

    fn list_tabs(&self, spreadsheet_id: &str) -> Result<Vec<Tab>> {
        Self::check_id(spreadsheet_id)?;
        let state = self.state.lock().unwrap();
        if state.fail_reads {
            bail!("simulated read failure");
        }
        Ok(state.tabs.iter().map(|(tab, _)| tab.clone()).collect())
    }

    fn all_values(&self, spreadsheet_id: &str, tab: &Tab) -> Result<Vec<Vec<String>>> {
        Self::check_id(spreadsheet_id)?;
        Ok(self.rows(&tab.title))
    }

    fn insert_row(
        &self,
        spreadsheet_id: &str,
        tab: &Tab,
        index: usize,
        values: &[String],
    ) -> Result<()> {
        Self::check_id(spreadsheet_id)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            bail!("simulated write failure");
        }
        state.insert_calls.push((tab.title.clone(), index));

        let (_, rows) = state
            .tabs
            .iter_mut()
            .find(|(candidate, _)| candidate.id == tab.id)
            .ok_or_else(|| anyhow!("unknown tab: {}", tab.title))?;
        let position = index - 1;
        if rows.len() < position {
            rows.resize(position, Vec::new());
        }
        rows.insert(position, values.to_vec());

        Ok(())
    }

    fn append_row(&self, spreadsheet_id: &str, tab: &Tab, values: &[String]) -> Result<()> {
        Self::check_id(spreadsheet_id)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            bail!("simulated write failure");
        }

        let (_, rows) = state
            .tabs
            .iter_mut()
            .find(|(candidate, _)| candidate.id == tab.id)
            .ok_or_else(|| anyhow!("unknown tab: {}", tab.title))?;
        rows.push(values.to_vec());

        Ok(())
    }
}

#[derive(Default)]
pub struct FakeImageHost {
    uploaded: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl FakeImageHost {
    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    pub fn uploaded(&self) -> Vec<String> {
        self.uploaded.lock().unwrap().clone()
    }
}

impl ImageHost for FakeImageHost {
    fn upload(&self, image: &ImageFile) -> Result<String> {
        self.uploaded.lock().unwrap().push(image.file_name.clone());

        if self.fail_on.as_deref() == Some(image.file_name.as_str()) {
            return Err(anyhow!("connection reset")).context("image host request failed");
        }

        Ok(format!("https://img.test/{}", image.file_name))
    }
}

/// Keeps the formatted text of every message it is asked to send.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl MailSender for RecordingMailer {
    fn send(&self, message: &Message) -> Result<()> {
        if self.fail {
            bail!("535 authentication failed");
        }

        let formatted = String::from_utf8_lossy(&message.formatted()).into_owned();
        self.sent.lock().unwrap().push(formatted);
        Ok(())
    }
}
