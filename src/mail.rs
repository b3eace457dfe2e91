use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()>;
}

/// STARTTLS relay with credentials.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = cfg
            .from
            .parse()
            .with_context(|| format!("invalid SMTP_FROM {:?}", cfg.from))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port);
        if !cfg.user.is_empty() {
            builder = builder.credentials(Credentials::new(cfg.user.clone(), cfg.pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            timeout: Duration::from_secs(cfg.timeout_secs),
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        let to: Mailbox = mail
            .to
            .parse()
            .with_context(|| format!("invalid recipient {:?}", mail.to))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .context("build message")?;

        tokio::time::timeout(self.timeout, self.transport.send(message))
            .await
            .context("smtp send timed out")?
            .context("smtp send")?;
        tracing::debug!(to = %mail.to, "mail sent");
        Ok(())
    }
}

/// Writes mail to the log; for local development without an SMTP relay.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        tracing::info!(to = %mail.to, subject = %mail.subject, body = %mail.body, "mail (log transport)");
        Ok(())
    }
}

// ---- templates ----

pub fn login_code_mail(to: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Your Shopping List Login Code".into(),
        body: format!(
            "Your login code is: {code}\n\n\
             This code will expire in 15 minutes.\n\n\
             If you didn't request this, please ignore this email.\n"
        ),
    }
}

pub fn server_invitation_mail(to: &str, inviter_email: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: "Invitation to Shopping List Server".into(),
        body: format!(
            "You've been invited to join the Shopping List Server by {inviter_email}.\n\n\
             Your invitation code is: {code}\n\n\
             This invitation will expire in 7 days.\n\n\
             To accept this invitation, log in with this email address.\n"
        ),
    }
}

pub fn list_invitation_mail(to: &str, list_name: &str, inviter_email: &str, code: &str) -> OutgoingMail {
    OutgoingMail {
        to: to.to_string(),
        subject: format!("Invitation to shopping list: {list_name}"),
        body: format!(
            "You've been invited to join the shopping list \"{list_name}\" by {inviter_email}.\n\n\
             Your invitation code is: {code}\n\n\
             This invitation will expire in 7 days.\n\n\
             To accept this invitation, log in with this email address.\n"
        ),
    }
}
