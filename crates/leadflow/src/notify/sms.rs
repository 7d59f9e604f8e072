use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{LeadSummary, NotifyError};
use crate::config::SmsConfig;

pub const SMS_TIMEOUT: Duration = Duration::from_secs(10);

/// Template variable appended after the lead name.
const LOAN_TYPE: &str = "Business";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsDelivery {
    Sent,
    InvalidNumber,
}

#[derive(Debug, Serialize)]
struct Fast2SmsRequest<'a> {
    route: &'static str,
    sender_id: Option<&'a str>,
    message: Option<&'a str>,
    variables_values: String,
    numbers: String,
    flash: u8,
}

#[derive(Debug, Deserialize)]
struct Fast2SmsResponse {
    #[serde(rename = "return", default)]
    accepted: bool,
    #[serde(default)]
    message: serde_json::Value,
}

/// Reduce a phone number to the ten-digit Indian mobile form the gateway
/// expects. Shorter numbers cannot be delivered.
pub fn normalize_indian_mobile(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 10 {
        return None;
    }
    Some(digits[digits.len() - 10..].to_string())
}

pub async fn send_lead_sms(
    client: &reqwest::Client,
    config: &SmsConfig,
    lead: &LeadSummary,
) -> Result<SmsDelivery, NotifyError> {
    let Some(number) = normalize_indian_mobile(&lead.phone) else {
        warn!(phone = %lead.phone, "invalid phone number format, SMS skipped");
        return Ok(SmsDelivery::InvalidNumber);
    };

    let request = Fast2SmsRequest {
        route: "dlt",
        sender_id: config.sender_id.as_deref(),
        message: config.message_id.as_deref(),
        variables_values: format!("{}:{LOAN_TYPE}", lead.name),
        numbers: number,
        flash: 0,
    };

    let response = client
        .post(&config.endpoint)
        .header("authorization", &config.authorization)
        .timeout(SMS_TIMEOUT)
        .json(&request)
        .send()
        .await
        .map_err(|err| NotifyError::Transport(err.to_string()))?;

    let status = response.status();
    let body: Fast2SmsResponse = response
        .json()
        .await
        .map_err(|err| NotifyError::Transport(format!("unreadable SMS response ({status}): {err}")))?;

    if !status.is_success() || !body.accepted {
        return Err(NotifyError::Rejected(format!("{status}: {}", body.message)));
    }
    Ok(SmsDelivery::Sent)
}
