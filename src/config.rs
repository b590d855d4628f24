use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const APP_DIR: &str = ".FieldReport";
const CONFIG_FILE: &str = "config.json";
const MIN_HTTP_TIMEOUT_SECONDS: u64 = 5;

pub const DEFAULT_VISITS_TAB: &str = "Atividades_Semanais_Promotor";
pub const DEFAULT_GDM_TAB: &str = "Controle_GDM";

const ENV_IMAGE_HOST_API_KEY: &str = "FIELDREPORT_IMAGE_HOST_API_KEY";
const ENV_MAIL_USERNAME: &str = "FIELDREPORT_MAIL_USERNAME";
const ENV_MAIL_PASSWORD: &str = "FIELDREPORT_MAIL_PASSWORD";
const ENV_REPORT_RECIPIENT: &str = "FIELDREPORT_REPORT_RECIPIENT";
const ENV_ADMIN_PASSWORD: &str = "FIELDREPORT_ADMIN_PASSWORD";
const ENV_SHEETS_TOKEN: &str = "FIELDREPORT_SHEETS_TOKEN";

/// How the row appender positions a new row in a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppendMode {
    /// Count the used rows, then insert at `count + 1`.
    #[default]
    Insert,
    /// Let the provider place the row after its own last-row tracking.
    Append,
}

impl fmt::Display for AppendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendMode::Insert => f.write_str("insert"),
            AppendMode::Append => f.write_str("append"),
        }
    }
}

impl FromStr for AppendMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "insert" => Ok(AppendMode::Insert),
            "append" => Ok(AppendMode::Append),
            other => Err(anyhow!("append_mode must be insert/append, got: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub brand_name: String,
    pub bind_address: String,
    pub api_port: u16,
    pub max_upload_bytes: usize,
    pub http_timeout_seconds: u64,

    pub spreadsheet_name: String,
    pub spreadsheet_id: Option<String>,
    pub sheets_api_base_url: String,
    pub drive_api_base_url: String,
    pub sheets_access_token: Option<String>,
    pub visits_tab: String,
    pub gdm_tab: String,
    pub append_mode: AppendMode,

    pub image_host_url: String,
    pub image_host_api_key: Option<String>,

    pub smtp_host: String,
    pub smtp_port: u16,
    pub mail_username: Option<String>,
    pub mail_password: Option<String>,
    pub report_recipient: Option<String>,

    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            brand_name: "Solar Force".to_string(),
            bind_address: "127.0.0.1".to_string(),
            api_port: 8501,
            max_upload_bytes: 20 * 1024 * 1024,
            http_timeout_seconds: 30,
            spreadsheet_name: "Sistema Solar Force - Dados".to_string(),
            spreadsheet_id: None,
            sheets_api_base_url: "https://sheets.googleapis.com/v4".to_string(),
            drive_api_base_url: "https://www.googleapis.com/drive/v3".to_string(),
            sheets_access_token: None,
            visits_tab: DEFAULT_VISITS_TAB.to_string(),
            gdm_tab: DEFAULT_GDM_TAB.to_string(),
            append_mode: AppendMode::Insert,
            image_host_url: "https://api.imgbb.com/1/upload".to_string(),
            image_host_api_key: None,
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            mail_username: None,
            mail_password: None,
            report_recipient: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(config_path)?;

        Ok(())
    }

    /// Secrets set in the environment win over the ones stored on disk.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = read(ENV_IMAGE_HOST_API_KEY) {
            self.image_host_api_key = Some(value);
        }
        if let Some(value) = read(ENV_MAIL_USERNAME) {
            self.mail_username = Some(value);
        }
        if let Some(value) = read(ENV_MAIL_PASSWORD) {
            self.mail_password = Some(value);
        }
        if let Some(value) = read(ENV_REPORT_RECIPIENT) {
            self.report_recipient = Some(value);
        }
        if let Some(value) = read(ENV_ADMIN_PASSWORD) {
            self.admin_password = Some(value);
        }
        if let Some(value) = read(ENV_SHEETS_TOKEN) {
            self.sheets_access_token = Some(value);
        }

        self
    }

    /// Names of the secrets the web service cannot run without.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = self.missing_mail_secrets();
        if is_unset(&self.admin_password) {
            missing.push("admin.password");
        }
        missing
    }

    /// Names of the secrets needed to mail a report.
    pub fn missing_mail_secrets(&self) -> Vec<&'static str> {
        [
            ("mail.username", &self.mail_username),
            ("mail.password", &self.mail_password),
            ("report.recipient", &self.report_recipient),
        ]
        .into_iter()
        .filter(|(_, value)| is_unset(value))
        .map(|(key, _)| key)
        .collect()
    }

    pub fn ensure_secrets(&self) -> Result<()> {
        secrets_present(&self.missing_secrets())
    }

    pub fn ensure_mail_secrets(&self) -> Result<()> {
        secrets_present(&self.missing_mail_secrets())
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_seconds.max(MIN_HTTP_TIMEOUT_SECONDS))
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "brand_name" => self.brand_name = value.trim().to_string(),
            "bind_address" => {
                value
                    .trim()
                    .parse::<std::net::IpAddr>()
                    .map_err(|_| anyhow!("bind_address must be an IP address"))?;
                self.bind_address = value.trim().to_string();
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "max_upload_bytes" => {
                self.max_upload_bytes = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("max_upload_bytes must be a number"))?;
            }
            "http_timeout_seconds" => {
                self.http_timeout_seconds = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("http_timeout_seconds must be a number"))?
                    .max(MIN_HTTP_TIMEOUT_SECONDS);
            }
            "spreadsheet_name" => {
                if value.trim().is_empty() {
                    bail!("spreadsheet_name must not be empty");
                }
                self.spreadsheet_name = value.to_string();
            }
            "spreadsheet_id" => self.spreadsheet_id = optional(value),
            "sheets_api_base_url" => {
                self.sheets_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "drive_api_base_url" => {
                self.drive_api_base_url = value.trim().trim_end_matches('/').to_string();
            }
            "sheets_access_token" => self.sheets_access_token = optional(value),
            "visits_tab" => self.visits_tab = value.to_string(),
            "gdm_tab" => self.gdm_tab = value.to_string(),
            "append_mode" => self.append_mode = value.parse()?,
            "image_host_url" => self.image_host_url = value.trim().to_string(),
            "image_host_api_key" => self.image_host_api_key = optional(value),
            "smtp_host" => self.smtp_host = value.trim().to_string(),
            "smtp_port" => {
                self.smtp_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("smtp_port must be a number"))?;
            }
            "mail_username" => self.mail_username = optional(value),
            "mail_password" => self.mail_password = optional(value),
            "report_recipient" => self.report_recipient = optional(value),
            "admin_password" => self.admin_password = optional(value),
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: brand_name|brand.name, bind_address|api.bind, api_port|api.port, max_upload_bytes|api.max_upload_bytes, http_timeout_seconds|http.timeout_seconds, spreadsheet_name|sheets.name, spreadsheet_id|sheets.id, sheets_api_base_url|sheets.base_url, drive_api_base_url|drive.base_url, sheets_access_token|sheets.token, visits_tab|sheets.visits_tab, gdm_tab|sheets.gdm_tab, append_mode|sheets.append_mode, image_host_url|images.url, image_host_api_key|images.api_key, smtp_host|mail.host, smtp_port|mail.port, mail_username|mail.username, mail_password|mail.password, report_recipient|report.recipient, admin_password|admin.password"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "brand_name" => Some(self.brand_name.clone()),
            "bind_address" => Some(self.bind_address.clone()),
            "api_port" => Some(self.api_port.to_string()),
            "max_upload_bytes" => Some(self.max_upload_bytes.to_string()),
            "http_timeout_seconds" => Some(self.http_timeout_seconds.to_string()),
            "spreadsheet_name" => Some(self.spreadsheet_name.clone()),
            "spreadsheet_id" => Some(
                self.spreadsheet_id
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "sheets_api_base_url" => Some(self.sheets_api_base_url.clone()),
            "drive_api_base_url" => Some(self.drive_api_base_url.clone()),
            "sheets_access_token" => Some(masked(&self.sheets_access_token)),
            "visits_tab" => Some(self.visits_tab.clone()),
            "gdm_tab" => Some(self.gdm_tab.clone()),
            "append_mode" => Some(self.append_mode.to_string()),
            "image_host_url" => Some(self.image_host_url.clone()),
            "image_host_api_key" => Some(masked(&self.image_host_api_key)),
            "smtp_host" => Some(self.smtp_host.clone()),
            "smtp_port" => Some(self.smtp_port.to_string()),
            "mail_username" => Some(
                self.mail_username
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "mail_password" => Some(masked(&self.mail_password)),
            "report_recipient" => Some(
                self.report_recipient
                    .clone()
                    .unwrap_or_else(|| "not_set".to_string()),
            ),
            "admin_password" => Some(masked(&self.admin_password)),
            _ => None,
        }
    }
}

pub fn is_secret_key(key: &str) -> bool {
    matches!(
        normalize_config_key(key),
        "sheets_access_token" | "image_host_api_key" | "mail_password" | "admin_password"
    )
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "brand_name" | "brand.name" => "brand_name",
        "bind_address" | "api.bind" => "bind_address",
        "api_port" | "api.port" => "api_port",
        "max_upload_bytes" | "api.max_upload_bytes" => "max_upload_bytes",
        "http_timeout_seconds" | "http.timeout_seconds" => "http_timeout_seconds",
        "spreadsheet_name" | "sheets.name" => "spreadsheet_name",
        "spreadsheet_id" | "sheets.id" => "spreadsheet_id",
        "sheets_api_base_url" | "sheets.base_url" => "sheets_api_base_url",
        "drive_api_base_url" | "drive.base_url" => "drive_api_base_url",
        "sheets_access_token" | "sheets.token" => "sheets_access_token",
        "visits_tab" | "sheets.visits_tab" => "visits_tab",
        "gdm_tab" | "sheets.gdm_tab" => "gdm_tab",
        "append_mode" | "sheets.append_mode" => "append_mode",
        "image_host_url" | "images.url" => "image_host_url",
        "image_host_api_key" | "images.api_key" => "image_host_api_key",
        "smtp_host" | "mail.host" => "smtp_host",
        "smtp_port" | "mail.port" => "smtp_port",
        "mail_username" | "mail.username" => "mail_username",
        "mail_password" | "mail.password" => "mail_password",
        "report_recipient" | "report.recipient" => "report_recipient",
        "admin_password" | "admin.password" => "admin_password",
        _ => key,
    }
}

fn secrets_present(missing: &[&str]) -> Result<()> {
    if !missing.is_empty() {
        bail!(
            "Security error: required secrets are not configured: {}. Use `FieldReport config set <key> <value>` or the FIELDREPORT_* environment variables.",
            missing.join(", ")
        );
    }

    Ok(())
}

fn optional(value: &str) -> Option<String> {
    (!value.trim().is_empty()).then(|| value.to_string())
}

fn is_unset(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|inner| inner.trim().is_empty())
}

fn masked(value: &Option<String>) -> String {
    if is_unset(value) {
        "not_set".to_string()
    } else {
        "***set***".to_string()
    }
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{AppendMode, Config};
    use std::collections::HashMap;

    #[test]
    fn dotted_aliases_set_the_same_field() {
        let mut config = Config::default();
        config.set_value("mail.username", "promo@example.com").unwrap();
        config.set_value("sheets.append_mode", "append").unwrap();

        assert_eq!(config.mail_username.as_deref(), Some("promo@example.com"));
        assert_eq!(config.append_mode, AppendMode::Append);
        assert_eq!(
            config.get_value("mail_username").as_deref(),
            Some("promo@example.com")
        );
    }

    #[test]
    fn secrets_are_masked_on_read() {
        let mut config = Config::default();
        assert_eq!(config.get_value("admin.password").as_deref(), Some("not_set"));

        config.set_value("admin.password", "s3cret").unwrap();
        assert_eq!(config.get_value("admin.password").as_deref(), Some("***set***"));
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        let mut config = Config::default();
        assert!(config.set_value("nope", "1").is_err());
        assert!(config.set_value("smtp_port", "abc").is_err());
        assert!(config.set_value("append_mode", "sideways").is_err());
        assert!(config.set_value("bind_address", "localhost").is_err());
    }

    #[test]
    fn save_and_load_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.set_value("report.recipient", "boss@example.com").unwrap();
        config.set_value("api.port", "9000").unwrap();
        config.save_to(&path).expect("config saved");

        let loaded = Config::load_from(&path).expect("config loaded");
        assert_eq!(loaded.report_recipient.as_deref(), Some("boss@example.com"));
        assert_eq!(loaded.api_port, 9000);
        assert_eq!(loaded.visits_tab, "Atividades_Semanais_Promotor");
    }

    #[test]
    fn partial_config_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"gdm_tab":"GDM"}"#).unwrap();

        let loaded = Config::load_from(&path).expect("config loaded");
        assert_eq!(loaded.gdm_tab, "GDM");
        assert_eq!(loaded.smtp_port, 587);
        assert_eq!(loaded.append_mode, AppendMode::Insert);
    }

    #[test]
    fn environment_overrides_win_and_blank_values_are_ignored() {
        let env = HashMap::from([
            ("FIELDREPORT_ADMIN_PASSWORD", "from-env"),
            ("FIELDREPORT_MAIL_PASSWORD", "   "),
        ]);
        let mut config = Config::default();
        config.mail_password = Some("from-file".to_string());

        let config = config.with_overrides(|name| env.get(name).map(|value| value.to_string()));

        assert_eq!(config.admin_password.as_deref(), Some("from-env"));
        assert_eq!(config.mail_password.as_deref(), Some("from-file"));
    }

    #[test]
    fn missing_secrets_are_reported_by_key() {
        let mut config = Config::default();
        config.mail_username = Some("user".to_string());
        config.mail_password = Some("pass".to_string());

        assert_eq!(
            config.missing_secrets(),
            vec!["report.recipient", "admin.password"]
        );
        assert!(config.ensure_secrets().is_err());

        config.report_recipient = Some("boss@example.com".to_string());
        config.admin_password = Some("admin".to_string());
        assert!(config.ensure_secrets().is_ok());
    }

    #[test]
    fn mailing_a_report_does_not_need_the_admin_password() {
        let mut config = Config::default();
        config.mail_username = Some("user".to_string());
        config.mail_password = Some("pass".to_string());
        config.report_recipient = Some("boss@example.com".to_string());

        assert!(config.missing_mail_secrets().is_empty());
        assert!(config.ensure_mail_secrets().is_ok());
        assert_eq!(config.missing_secrets(), vec!["admin.password"]);

        config.mail_password = Some(" ".to_string());
        assert_eq!(config.missing_mail_secrets(), vec!["mail.password"]);
        assert!(config.ensure_mail_secrets().is_err());
    }
}
