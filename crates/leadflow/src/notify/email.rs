use std::fmt::Display;

use lettre::message::{header::ContentType, Mailbox, Message};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{info, warn};

use super::{escape_html, LeadSummary, NotifyError};
use crate::config::EmailConfig;
use crate::leads::export::format_currency;

pub const ADMIN_SUBJECT: &str = "New lead received";
pub const ACKNOWLEDGEMENT_SUBJECT: &str = "We received your loan application";

/// Outcome of each message in one lead's email pair. `admin_alert` is `None`
/// when no admin address is configured.
#[derive(Debug)]
pub struct EmailReport {
    pub admin_alert: Option<Result<(), NotifyError>>,
    pub acknowledgement: Result<(), NotifyError>,
}

impl EmailReport {
    /// The first failure, when no message went out at all.
    fn into_result(self) -> Result<(), NotifyError> {
        match (self.admin_alert, self.acknowledgement) {
            (Some(Err(_)) | None, Err(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

/// Send the HTML admin alert (when an admin address is configured) and the
/// plain acknowledgement to the lead. Fails only when nothing was delivered.
pub async fn send_lead_emails(config: &EmailConfig, lead: &LeadSummary) -> Result<(), NotifyError> {
    let transport = build_transport(config)?;
    let from = parse_mailbox(&config.from)?;
    if config.admin_recipient.is_none() {
        warn!("ADMIN_EMAIL not configured, admin alert email skipped");
    }

    deliver_lead_emails(&transport, &from, config.admin_recipient.as_deref(), lead)
        .await
        .into_result()
}

/// Build and send both messages independently over `transport`.
pub async fn deliver_lead_emails<T>(
    transport: &T,
    from: &Mailbox,
    admin: Option<&str>,
    lead: &LeadSummary,
) -> EmailReport
where
    T: AsyncTransport + Sync,
    T::Error: Display,
{
    let admin_alert = match admin {
        Some(admin) => {
            let result = match admin_alert_message(from, admin, lead) {
                Ok(message) => send_message(transport, message).await,
                Err(err) => Err(err),
            };
            log_outcome("admin_alert", &result);
            Some(result)
        }
        None => None,
    };

    let acknowledgement = match acknowledgement_message(from, lead) {
        Ok(message) => send_message(transport, message).await,
        Err(err) => Err(err),
    };
    log_outcome("acknowledgement", &acknowledgement);

    EmailReport {
        admin_alert,
        acknowledgement,
    }
}

fn admin_alert_message(from: &Mailbox, admin: &str, lead: &LeadSummary) -> Result<Message, NotifyError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(admin)?)
        .subject(ADMIN_SUBJECT)
        .header(ContentType::TEXT_HTML)
        .body(admin_alert_html(lead))
        .map_err(|err| NotifyError::Message(err.to_string()))
}

fn acknowledgement_message(from: &Mailbox, lead: &LeadSummary) -> Result<Message, NotifyError> {
    Message::builder()
        .from(from.clone())
        .to(parse_mailbox(&lead.email)?)
        .subject(ACKNOWLEDGEMENT_SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(acknowledgement_text(&lead.name))
        .map_err(|err| NotifyError::Message(err.to_string()))
}

async fn send_message<T>(transport: &T, message: Message) -> Result<(), NotifyError>
where
    T: AsyncTransport + Sync,
    T::Error: Display,
{
    transport
        .send(message)
        .await
        .map(|_| ())
        .map_err(|err| NotifyError::Transport(err.to_string()))
}

fn log_outcome(message: &'static str, result: &Result<(), NotifyError>) {
    match result {
        Ok(()) => info!(message, "lead email sent"),
        Err(err) => warn!(message, error = %err, "lead email failed"),
    }
}

fn build_transport(config: &EmailConfig) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
    let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        .map_err(|err| NotifyError::Transport(err.to_string()))?
        .port(config.port);
    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
    }
    Ok(builder.build())
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse::<Mailbox>().map_err(|err| NotifyError::Address {
        address: address.to_string(),
        reason: err.to_string(),
    })
}

pub fn admin_alert_html(lead: &LeadSummary) -> String {
    let loan = lead
        .loan_amount
        .map(format_currency)
        .unwrap_or_else(|| "Not specified".to_string());
    let city = if lead.city.is_empty() {
        "Not specified"
    } else {
        lead.city.as_str()
    };

    let rows = [
        ("Name", lead.name.as_str()),
        ("Email", lead.email.as_str()),
        ("Phone", lead.phone.as_str()),
        ("City", city),
        ("Loan Amount", loan.as_str()),
    ]
    .iter()
    .map(|(label, value)| {
        format!(
            "<p style=\"margin: 0; color: #059669; font-size: 16px;\">{label}: {}</p>",
            escape_html(value)
        )
    })
    .collect::<Vec<_>>()
    .join("\n");

    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>New Lead</title></head>\n\
         <body style=\"font-family: Arial, sans-serif; line-height: 1.6; color: #333;\">\n\
         <h1 style=\"font-size: 20px;\">New Lead Received!</h1>\n\
         <div style=\"border: 2px solid #059669; border-radius: 8px; padding: 20px;\">\n{rows}\n</div>\n\
         </body>\n</html>\n"
    )
}

pub fn acknowledgement_text(name: &str) -> String {
    format!(
        "Hey {name},\n\nYour loan application has been received.\nWe will contact you shortly.\n"
    )
}
