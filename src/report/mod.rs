pub mod mailer;
pub mod workbook;

use crate::config::Config;
use crate::forms::records::{GdmRecord, VisitRecord};
use crate::report::mailer::MailSender;
use crate::sheets::SheetAccessor;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use lettre::Message;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Visits,
    Gdm,
}

impl ReportKind {
    pub const ALL: [ReportKind; 2] = [ReportKind::Visits, ReportKind::Gdm];

    pub fn tab<'a>(&self, config: &'a Config) -> &'a str {
        match self {
            ReportKind::Visits => &config.visits_tab,
            ReportKind::Gdm => &config.gdm_tab,
        }
    }

    /// Header row the form writes into this tab.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            ReportKind::Visits => &VisitRecord::COLUMNS,
            ReportKind::Gdm => &GdmRecord::COLUMNS,
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            ReportKind::Visits => "Resumo Consolidado - VISITAS",
            ReportKind::Gdm => "Resumo Consolidado - CONTROLE GDM",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportKind::Visits => "Relatorio_Visitas",
            ReportKind::Gdm => "Relatorio_GDM",
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            ReportKind::Visits => "visitas",
            ReportKind::Gdm => "gdm",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Visits => "Relatório de Visitas",
            ReportKind::Gdm => "Relatório de GDM",
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "visitas" | "visits" | "geral" => Ok(ReportKind::Visits),
            "gdm" => Ok(ReportKind::Gdm),
            other => Err(format!("Unknown report kind: {other}. Use visitas or gdm")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Sent { records: usize },
    Empty,
    Failed(String),
}

/// Reads the tab behind `kind`, exports it and mails it to the report recipient.
///
/// Never returns an error: failures come back as `ReportStatus::Failed`.
pub fn send_report(
    config: &Config,
    accessor: &SheetAccessor,
    mailer: &dyn MailSender,
    kind: ReportKind,
    now: DateTime<Local>,
) -> ReportStatus {
    match try_send_report(config, accessor, mailer, kind, now) {
        Ok(status) => status,
        Err(error) => {
            error!(report = %kind, error = %format!("{error:#}"), "report delivery failed");
            ReportStatus::Failed(format!("Erro Técnico: {error:#}"))
        }
    }
}

fn try_send_report(
    config: &Config,
    accessor: &SheetAccessor,
    mailer: &dyn MailSender,
    kind: ReportKind,
    now: DateTime<Local>,
) -> Result<ReportStatus> {
    let worksheet = accessor.worksheet(kind.tab(config))?;
    let table = worksheet.get_all_records()?;

    if table.is_empty() {
        info!(report = %kind, tab = %worksheet.title(), "report skipped, no records");
        return Ok(ReportStatus::Empty);
    }

    let attachment = workbook::build_workbook(&table)?;
    let message = compose_message(config, kind, table.len(), attachment, now)?;
    mailer.send(&message)?;

    info!(report = %kind, records = table.len(), "report sent");
    Ok(ReportStatus::Sent {
        records: table.len(),
    })
}

pub fn subject_line(config: &Config, kind: ReportKind, now: DateTime<Local>) -> String {
    format!(
        "{} - {} ({})",
        kind.subject(),
        config.brand_name,
        now.format("%d/%m")
    )
}

pub fn attachment_name(kind: ReportKind, now: DateTime<Local>) -> String {
    format!("{}_{}.xlsx", kind.file_prefix(), now.format("%d_%m"))
}

pub fn body_text(config: &Config, kind: ReportKind, records: usize) -> String {
    format!(
        "Olá,\n\nSegue em anexo o relatório solicitado: {}.\nTotal de registros: {}\n\nAtenciosamente,\nSistema {}\n",
        kind.subject(),
        records,
        config.brand_name
    )
}

fn compose_message(
    config: &Config,
    kind: ReportKind,
    records: usize,
    attachment: Vec<u8>,
    now: DateTime<Local>,
) -> Result<Message> {
    let from = config
        .mail_username
        .as_deref()
        .context("Mail username is not configured")?;
    let to = config
        .report_recipient
        .as_deref()
        .context("Report recipient is not configured")?;

    let attachment = Attachment::new(attachment_name(kind, now)).body(
        attachment,
        ContentType::parse("application/octet-stream")
            .context("Failed to build attachment content type")?,
    );

    Message::builder()
        .from(
            from.parse::<Mailbox>()
                .with_context(|| format!("Invalid sender address: {from}"))?,
        )
        .to(to
            .parse::<Mailbox>()
            .with_context(|| format!("Invalid recipient address: {to}"))?)
        .subject(subject_line(config, kind, now))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body_text(config, kind, records)))
                .singlepart(attachment),
        )
        .context("Failed to build report email")
}
