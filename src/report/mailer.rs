use crate::config::Config;
use anyhow::{Context, Result};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

pub trait MailSender: Send + Sync {
    fn send(&self, message: &Message) -> Result<()>;
}

/// Authenticated SMTP relay using STARTTLS.
pub struct SmtpMailer {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            username: config.mail_username.clone(),
            password: config.mail_password.clone(),
            timeout: config.http_timeout(),
        }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let username = self
            .username
            .clone()
            .context("Mail username is not configured")?;
        let password = self
            .password
            .clone()
            .context("Mail password is not configured")?;

        let transport = SmtpTransport::starttls_relay(&self.host)
            .with_context(|| format!("Failed to configure SMTP relay: {}", self.host))?
            .port(self.port)
            .credentials(Credentials::new(username, password))
            .timeout(Some(self.timeout))
            .build();

        Ok(transport)
    }
}

impl MailSender for SmtpMailer {
    fn send(&self, message: &Message) -> Result<()> {
        self.transport()?
            .send(message)
            .with_context(|| format!("SMTP send via {}:{} failed", self.host, self.port))?;

        Ok(())
    }
}
