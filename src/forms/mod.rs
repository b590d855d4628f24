pub mod records;

use crate::config::Config;
use crate::forms::records::{GdmRecord, VisitRecord, known_activities, timestamp};
use crate::report::mailer::{MailSender, SmtpMailer};
use crate::report::{self, ReportKind, ReportStatus};
use crate::sheets::append::{RowPosition, save_row};
use crate::sheets::google::GoogleSheets;
use crate::sheets::{SheetAccessor, SheetsBackend};
use crate::uploader::{ImageFile, ImageHost, ImgbbUploader, upload_all};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{error, info, warn};

pub const VISIT_REQUIRED: &str = "⚠️ Preencha Nome, Loja e Atividades!";
pub const GDM_IDENTITY_REQUIRED: &str = "⚠️ Identifique o promotor e a loja!";
pub const GDM_STATUS_REQUIRED: &str = "⚠️ Preencha pelo menos um campo de GDM!";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitForm {
    pub name: String,
    pub registration_id: String,
    pub store_code: String,
    pub city: String,
    pub activities: Vec<String>,
    pub notes: String,
}

impl VisitForm {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() || self.store_code.is_empty() || self.activities.is_empty() {
            return Err(VISIT_REQUIRED);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GdmForm {
    pub promoter_name: String,
    pub store_code: String,
    pub not_surveyed: String,
    pub missing: String,
    pub broken: String,
    pub note: String,
}

impl GdmForm {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.promoter_name.is_empty() || self.store_code.is_empty() {
            return Err(GDM_IDENTITY_REQUIRED);
        }
        if self.not_surveyed.is_empty() && self.missing.is_empty() && self.broken.is_empty() {
            return Err(GDM_STATUS_REQUIRED);
        }

        Ok(())
    }
}

/// Result of one form submission.
///
/// `Rejected` sends the user back to editing with the inline message and
/// nothing is written. `Failed` means validation passed but the row could
/// not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Saved {
        row: Vec<String>,
        position: RowPosition,
    },
    Rejected(String),
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAccess {
    /// Nothing typed yet.
    Locked,
    Denied,
    Granted,
}

/// Ties the forms and the admin panel to the image host, the spreadsheet and the mail relay.
#[derive(Clone)]
pub struct FormController {
    config: Arc<Config>,
    accessor: SheetAccessor,
    images: Arc<dyn ImageHost>,
    mailer: Arc<dyn MailSender>,
}

impl FormController {
    pub fn new(
        config: Arc<Config>,
        sheets: Arc<dyn SheetsBackend>,
        images: Arc<dyn ImageHost>,
        mailer: Arc<dyn MailSender>,
    ) -> Self {
        let accessor = SheetAccessor::new(
            sheets,
            config.spreadsheet_name.clone(),
            config.spreadsheet_id.clone(),
        );

        Self {
            config,
            accessor,
            images,
            mailer,
        }
    }

    pub fn from_config(config: Arc<Config>) -> Self {
        let sheets = Arc::new(GoogleSheets::new(&config));
        let images = Arc::new(ImgbbUploader::new(&config));
        let mailer = Arc::new(SmtpMailer::new(&config));

        Self::new(config, sheets, images, mailer)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn accessor(&self) -> &SheetAccessor {
        &self.accessor
    }

    pub fn submit_visit(
        &self,
        form: VisitForm,
        images: &[ImageFile],
        now: DateTime<Local>,
    ) -> SubmissionOutcome {
        let form = VisitForm {
            activities: known_activities(form.activities),
            ..form
        };

        if let Err(message) = form.validate() {
            info!(form = "visit", reason = message, "submission rejected");
            return SubmissionOutcome::Rejected(message.to_string());
        }

        let record = VisitRecord {
            image_links: upload_all(self.images.as_ref(), images),
            timestamp: timestamp(now),
            promoter_name: form.name,
            registration_id: form.registration_id,
            store_code: form.store_code,
            city: form.city,
            activities: form.activities,
            notes: form.notes,
        };

        self.persist("visit", &self.config.visits_tab, record.to_row(), "Erro")
    }

    pub fn submit_gdm(
        &self,
        form: GdmForm,
        images: &[ImageFile],
        now: DateTime<Local>,
    ) -> SubmissionOutcome {
        if let Err(message) = form.validate() {
            info!(form = "gdm", reason = message, "submission rejected");
            return SubmissionOutcome::Rejected(message.to_string());
        }

        let record = GdmRecord {
            image_links: upload_all(self.images.as_ref(), images),
            timestamp: timestamp(now),
            promoter_name: form.promoter_name,
            store_code: form.store_code,
            not_surveyed: form.not_surveyed,
            missing: form.missing,
            broken: form.broken,
            note: form.note,
        };

        self.persist("gdm", &self.config.gdm_tab, record.to_row(), "Erro ao salvar")
    }

    fn persist(
        &self,
        form: &str,
        tab: &str,
        row: Vec<String>,
        failure_prefix: &str,
    ) -> SubmissionOutcome {
        match save_row(&self.accessor, tab, &row, self.config.append_mode) {
            Ok(position) => SubmissionOutcome::Saved { row, position },
            Err(error) => {
                error!(form, tab, error = %format!("{error:#}"), "failed to store submission");
                SubmissionOutcome::Failed(format!("{failure_prefix}: {error:#}"))
            }
        }
    }

    /// Plain comparison against the configured admin password.
    pub fn admin_access(&self, password: &str) -> AdminAccess {
        if password.is_empty() {
            return AdminAccess::Locked;
        }

        match self.config.admin_password.as_deref() {
            Some(expected) if !expected.is_empty() && expected == password => AdminAccess::Granted,
            _ => {
                warn!("admin password rejected");
                AdminAccess::Denied
            }
        }
    }

    /// Runs a report when `password` unlocks the admin panel; `None` otherwise.
    pub fn run_report(
        &self,
        password: &str,
        kind: ReportKind,
        now: DateTime<Local>,
    ) -> Option<ReportStatus> {
        if self.admin_access(password) != AdminAccess::Granted {
            return None;
        }

        Some(self.send_report(kind, now))
    }

    pub fn send_report(&self, kind: ReportKind, now: DateTime<Local>) -> ReportStatus {
        report::send_report(
            &self.config,
            &self.accessor,
            self.mailer.as_ref(),
            kind,
            now,
        )
    }
}
