//! Best-effort alerts fired after a lead is stored.
//!
//! Each channel is a plain async function that takes its configuration
//! explicitly. [`ChannelNotifier`] bundles the configured channels and runs them
//! on a detached task so intake responses never wait on outbound calls.
//! Failures are logged and otherwise swallowed; nothing is retried.

pub mod email;
pub mod push;
pub mod sms;
pub mod telegram;

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::NotificationConfig;
use crate::leads::Lead;
use push::{PushGateway, PushMessage, PushSubscriptionRepository};

/// Contact details handed to every channel.
#[derive(Debug, Clone, PartialEq)]
pub struct LeadSummary {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub city: String,
    pub loan_amount: Option<f64>,
}

impl From<&Lead> for LeadSummary {
    fn from(lead: &Lead) -> Self {
        Self {
            name: lead.name.clone(),
            email: lead.email.clone(),
            phone: lead.phone.clone(),
            city: lead.city.clone(),
            loan_amount: lead.loan_amount,
        }
    }
}

/// Hook invoked by the intake service once a lead is persisted. Implementations
/// must return immediately.
pub trait LeadNotifier: Send + Sync {
    fn lead_captured(&self, lead: LeadSummary);
}

/// Outbound channel failure. Logged only.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address '{address}': {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("provider rejected the request: {0}")]
    Rejected(String),
}

/// What happened on one channel for one lead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Sent,
    Skipped(&'static str),
    Failed(String),
}

impl ChannelOutcome {
    fn from_result(channel: &'static str, result: Result<(), NotifyError>) -> Self {
        match result {
            Ok(()) => {
                info!(channel, "lead notification sent");
                Self::Sent
            }
            Err(err) => {
                warn!(channel, error = %err, "lead notification failed");
                Self::Failed(err.to_string())
            }
        }
    }
}

/// Per-channel outcomes of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub email: ChannelOutcome,
    pub sms: ChannelOutcome,
    pub telegram: ChannelOutcome,
    pub push: ChannelOutcome,
}

/// Run every configured channel concurrently for one lead.
pub async fn dispatch<S, G>(
    config: &NotificationConfig,
    client: &reqwest::Client,
    subscriptions: &S,
    gateway: Option<&G>,
    lead: &LeadSummary,
) -> DispatchReport
where
    S: PushSubscriptionRepository + ?Sized,
    G: PushGateway + ?Sized,
{
    let email = async {
        match &config.email {
            Some(email) => {
                ChannelOutcome::from_result("email", email::send_lead_emails(email, lead).await)
            }
            None => skipped("email", "SMTP_FROM not configured"),
        }
    };

    let sms = async {
        match &config.sms {
            Some(sms) => match sms::send_lead_sms(client, sms, lead).await {
                Ok(sms::SmsDelivery::Sent) => ChannelOutcome::from_result("sms", Ok(())),
                Ok(sms::SmsDelivery::InvalidNumber) => {
                    ChannelOutcome::Skipped("phone number is not a valid mobile number")
                }
                Err(err) => ChannelOutcome::from_result("sms", Err(err)),
            },
            None => skipped("sms", "FAST2SMS_AUTHORIZATION not configured"),
        }
    };

    let telegram = async {
        match &config.telegram {
            Some(telegram) => ChannelOutcome::from_result(
                "telegram",
                telegram::send_lead_message(
                    client,
                    telegram,
                    config.admin_panel_url.as_deref(),
                    lead,
                )
                .await,
            ),
            None => skipped("telegram", "TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not configured"),
        }
    };

    let push = async {
        match gateway {
            Some(gateway) => {
                let message = PushMessage::now(format!("New lead: {} ({})", lead.name, lead.phone));
                match push::broadcast(subscriptions, gateway, &message).await {
                    Ok(summary) => {
                        info!(
                            attempted = summary.attempted,
                            delivered = summary.delivered,
                            deactivated = summary.deactivated,
                            "lead push broadcast finished"
                        );
                        ChannelOutcome::Sent
                    }
                    Err(err) => {
                        warn!(error = %err, "lead push broadcast failed");
                        ChannelOutcome::Failed(err.to_string())
                    }
                }
            }
            None => skipped("push", "VAPID_PRIVATE_KEY not configured"),
        }
    };

    let (email, sms, telegram, push) = tokio::join!(email, sms, telegram, push);
    DispatchReport {
        email,
        sms,
        telegram,
        push,
    }
}

fn skipped(channel: &'static str, reason: &'static str) -> ChannelOutcome {
    warn!(channel, reason, "lead notification skipped");
    ChannelOutcome::Skipped(reason)
}

/// Production notifier: spawns [`dispatch`] on the current tokio runtime.
pub struct ChannelNotifier<S, G> {
    config: Arc<NotificationConfig>,
    client: reqwest::Client,
    subscriptions: Arc<S>,
    gateway: Option<Arc<G>>,
}

impl<S, G> ChannelNotifier<S, G>
where
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    pub fn new(
        config: NotificationConfig,
        client: reqwest::Client,
        subscriptions: Arc<S>,
        gateway: Option<Arc<G>>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            subscriptions,
            gateway,
        }
    }

    /// Notifier sharing one pooled HTTP client across the SMS and bot channels.
    pub fn from_config(
        config: NotificationConfig,
        subscriptions: Arc<S>,
        gateway: Option<Arc<G>>,
    ) -> Self {
        Self::new(config, reqwest::Client::new(), subscriptions, gateway)
    }

    /// Channels that will be attempted for each lead.
    pub fn enabled_channels(&self) -> Vec<&'static str> {
        let mut channels = Vec::new();
        if self.config.email.is_some() {
            channels.push("email");
        }
        if self.config.sms.is_some() {
            channels.push("sms");
        }
        if self.config.telegram.is_some() {
            channels.push("telegram");
        }
        if self.gateway.is_some() {
            channels.push("push");
        }
        channels
    }
}

impl<S, G> LeadNotifier for ChannelNotifier<S, G>
where
    S: PushSubscriptionRepository + 'static,
    G: PushGateway + 'static,
{
    fn lead_captured(&self, lead: LeadSummary) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime available, lead notifications dropped");
            return;
        };

        let config = Arc::clone(&self.config);
        let client = self.client.clone();
        let subscriptions = Arc::clone(&self.subscriptions);
        let gateway = self.gateway.clone();

        handle.spawn(async move {
            dispatch(
                &config,
                &client,
                subscriptions.as_ref(),
                gateway.as_deref(),
                &lead,
            )
            .await;
        });
    }
}

/// Escape text interpolated into HTML email bodies and bot messages.
pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
