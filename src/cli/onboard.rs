use crate::config::Config;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input, Password, theme::ColorfulTheme};

pub fn run_onboarding() -> Result<Config> {
    println!("──────────────────────────────────────────");
    println!("  Welcome to FieldReport onboarding.");
    println!("──────────────────────────────────────────");

    let theme = ColorfulTheme::default();
    let defaults = Config::load().unwrap_or_default();

    println!("\n[1/5] Spreadsheet");
    let spreadsheet_name: String = Input::with_theme(&theme)
        .with_prompt("  Spreadsheet name")
        .default(defaults.spreadsheet_name.clone())
        .interact_text()
        .context("Failed to read spreadsheet name")?;
    let sheets_access_token = optional_secret(
        &theme,
        "  Google API access token (leave empty to use FIELDREPORT_SHEETS_TOKEN)",
    )?
    .or(defaults.sheets_access_token.clone());
    println!("  ✓ Rows will be stored in \"{spreadsheet_name}\"");

    println!("\n[2/5] Image host");
    let image_host_api_key = optional_secret(&theme, "  ImgBB API key (leave empty to skip)")?
        .or(defaults.image_host_api_key.clone());
    if image_host_api_key.is_none() {
        println!("  ! Photos will be stored as error placeholders until a key is set");
    }

    println!("\n[3/5] Report e-mail");
    let mail_username: String = Input::with_theme(&theme)
        .with_prompt("  Sender account")
        .with_initial_text(defaults.mail_username.clone().unwrap_or_default())
        .interact_text()
        .context("Failed to read sender account")?;
    let mail_password = Password::with_theme(&theme)
        .with_prompt("  Sender app password")
        .interact()
        .context("Failed to read sender password")?;
    let report_recipient: String = Input::with_theme(&theme)
        .with_prompt("  Report recipient")
        .with_initial_text(defaults.report_recipient.clone().unwrap_or_default())
        .interact_text()
        .context("Failed to read report recipient")?;

    println!("\n[4/5] Admin panel");
    let admin_password = Password::with_theme(&theme)
        .with_prompt("  Admin password")
        .with_confirmation("  Repeat admin password", "Passwords do not match")
        .interact()
        .context("Failed to read admin password")?;

    println!("\n[5/5] Web server");
    let api_port: u16 = Input::with_theme(&theme)
        .with_prompt("  Port")
        .default(defaults.api_port)
        .interact_text()
        .context("Failed to read port")?;

    let config = Config {
        spreadsheet_name,
        sheets_access_token,
        image_host_api_key,
        mail_username: Some(mail_username),
        mail_password: Some(mail_password),
        report_recipient: Some(report_recipient),
        admin_password: Some(admin_password),
        api_port,
        ..defaults
    };

    let confirmed = Confirm::with_theme(&theme)
        .with_prompt(format!(
            "  Save configuration to {}?",
            Config::config_path()?.display()
        ))
        .default(true)
        .interact()
        .context("Failed to read save confirmation")?;

    if !confirmed {
        println!("  ! Nothing was saved");
        return Ok(config);
    }

    config.save()?;

    println!("\n──────────────────────────────────────────");
    println!("  Onboarding complete!");
    println!("  Run FieldReport doctor to check spreadsheet access.");
    println!("  Run FieldReport serve to open the forms.");
    println!("──────────────────────────────────────────");

    Ok(config)
}

fn optional_secret(theme: &ColorfulTheme, prompt: &str) -> Result<Option<String>> {
    let value = Password::with_theme(theme)
        .with_prompt(prompt)
        .allow_empty_password(true)
        .interact()
        .context("Failed to read secret input")?;

    Ok(Some(value).filter(|value| !value.trim().is_empty()))
}
