mod api;
mod cli;
mod config;
mod forms;
mod report;
mod sheets;
mod uploader;

#[cfg(test)]
mod testing;

use crate::cli::onboard::run_onboarding;
use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::{Config, is_secret_key};
use crate::forms::FormController;
use crate::report::{ReportKind, ReportStatus};
use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Onboard => {
            let _ = run_onboarding()?;
            Ok(())
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Doctor => handle_doctor().await,
        Commands::Serve => handle_serve().await,
        Commands::Report { kind } => handle_report(kind).await,
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.save()?;

            let masked = if is_secret_key(&key) {
                "***hidden***".to_string()
            } else {
                value
            };
            println!("Config saved: {key} = {masked}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

async fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = Config::load().unwrap_or_default().with_env_overrides();

    let missing = config.missing_secrets();
    if missing.is_empty() {
        println!("[OK] mail, recipient and admin secrets configured");
    } else {
        println!("[WARN] missing secrets: {}", missing.join(", "));
        issues.push("secrets missing".to_string());
    }

    if config.image_host_api_key.is_some() {
        println!("[OK] image host API key is configured");
    } else {
        println!("[WARN] image host API key missing; photo uploads will fail");
        issues.push("image host key missing".to_string());
    }

    if config.sheets_access_token.is_none() {
        println!("[WARN] spreadsheet access token missing");
        issues.push("sheets token missing".to_string());
    } else {
        let checked = Arc::new(config.clone());
        let tabs = tokio::task::spawn_blocking(move || inspect_tabs(checked))
            .await
            .context("Spreadsheet check worker failed")?;

        match tabs {
            Ok(tabs) => {
                println!("[OK] spreadsheet reachable: {}", config.spreadsheet_name);
                for check in tabs {
                    let wanted = check.kind.tab(&config);
                    match check.header {
                        None => {
                            println!("[WARN] tab not found: {wanted} (first tab will be used)");
                            issues.push(format!("tab {wanted} missing"));
                        }
                        Some(header) if header.is_empty() => {
                            println!("[OK] tab found: {wanted} (no header row yet)");
                        }
                        Some(header) if header_matches(&header, check.kind.columns()) => {
                            println!("[OK] tab found: {wanted}");
                        }
                        Some(header) => {
                            println!(
                                "[WARN] tab {wanted} header differs: expected [{}], found [{}]",
                                check.kind.columns().join(", "),
                                header.join(", ")
                            );
                            issues.push(format!("tab {wanted} header differs"));
                        }
                    }
                }
            }
            Err(error) => {
                println!("[WARN] spreadsheet check failed: {error:#}");
                issues.push("spreadsheet unreachable".to_string());
            }
        }
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

struct TabCheck {
    kind: ReportKind,
    /// First row of the tab, `None` when the tab does not exist.
    header: Option<Vec<String>>,
}

fn inspect_tabs(config: Arc<Config>) -> Result<Vec<TabCheck>> {
    let controller = FormController::from_config(config);
    let accessor = controller.accessor();
    let tabs = accessor.tabs()?;

    ReportKind::ALL
        .into_iter()
        .map(|kind| {
            let wanted = kind.tab(controller.config());
            if !tabs.iter().any(|tab| tab.title == wanted) {
                return Ok(TabCheck { kind, header: None });
            }

            let header = accessor
                .worksheet(wanted)?
                .get_all_values()?
                .into_iter()
                .next()
                .unwrap_or_default();
            Ok(TabCheck {
                kind,
                header: Some(header),
            })
        })
        .collect()
}

fn header_matches(header: &[String], expected: &[&str]) -> bool {
    header.len() == expected.len() && header.iter().zip(expected).all(|(cell, name)| cell.as_str() == *name)
}

async fn handle_serve() -> Result<()> {
    let config = load_config()?.with_env_overrides();
    config.ensure_secrets()?;

    let shared_config = Arc::new(config);

    tokio::select! {
        api_result = api::run_server(shared_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

async fn handle_report(kind: ReportKind) -> Result<()> {
    let config = load_config()?.with_env_overrides();
    config.ensure_mail_secrets()?;

    let controller = FormController::from_config(Arc::new(config));
    let status = tokio::task::spawn_blocking(move || controller.send_report(kind, Local::now()))
        .await
        .context("Report worker failed")?;

    match status {
        ReportStatus::Sent { records } => {
            println!("Report sent: {kind} ({records} records)");
            Ok(())
        }
        ReportStatus::Empty => {
            println!("Report skipped: {kind} has no records");
            Ok(())
        }
        ReportStatus::Failed(message) => bail!("{message}"),
    }
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load()
        .with_context(|| "Config file not found. Run `FieldReport onboard` first.".to_string())
}
