use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};

use super::{escape_html, LeadSummary, NotifyError};
use crate::config::TelegramConfig;
use crate::leads::export::format_currency;

const NOT_SPECIFIED: &str = "Not specified";
const IST_OFFSET_SECONDS: i32 = 5 * 3600 + 30 * 60;

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

fn india_standard_time() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECONDS).unwrap_or_else(|| Utc.fix())
}

/// HTML-formatted new-lead message in the bot's chat.
pub fn format_lead_message(
    lead: &LeadSummary,
    received_at: DateTime<Utc>,
    admin_panel_url: Option<&str>,
) -> String {
    let city = if lead.city.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        escape_html(&lead.city)
    };
    let loan = lead
        .loan_amount
        .map(format_currency)
        .unwrap_or_else(|| NOT_SPECIFIED.to_string());
    let time = received_at
        .with_timezone(&india_standard_time())
        .format("%d %b %Y, %I:%M %p");

    let mut message = format!(
        "🆕 <b>NEW LEAD RECEIVED!</b>\n\n\
         <b>Name:</b> {}\n\
         <b>Email:</b> {}\n\
         <b>Phone:</b> {}\n\
         <b>City:</b> {city}\n\
         <b>Loan Amount:</b> {loan}\n\
         <b>Time:</b> {time}",
        escape_html(&lead.name),
        escape_html(&lead.email),
        escape_html(&lead.phone),
    );
    if let Some(url) = admin_panel_url {
        message.push_str(&format!("\n\n<b>Admin Panel: {}</b>", escape_html(url)));
    }
    message
}

pub async fn send_lead_message(
    client: &reqwest::Client,
    config: &TelegramConfig,
    admin_panel_url: Option<&str>,
    lead: &LeadSummary,
) -> Result<(), NotifyError> {
    let url = format!(
        "{}/bot{}/sendMessage",
        config.api_base.trim_end_matches('/'),
        config.bot_token
    );
    let request = SendMessageRequest {
        chat_id: &config.chat_id,
        text: format_lead_message(lead, Utc::now(), admin_panel_url),
        parse_mode: "HTML",
        disable_web_page_preview: true,
    };

    let response = client
        .post(url)
        .json(&request)
        .send()
        .await
        .map_err(|err| NotifyError::Transport(err.without_url().to_string()))?;

    let status = response.status();
    let body: TelegramResponse = response
        .json()
        .await
        .map_err(|err| NotifyError::Transport(format!("unreadable bot response ({status}): {err}")))?;

    if !body.ok {
        return Err(NotifyError::Rejected(
            body.description.unwrap_or_else(|| status.to_string()),
        ));
    }
    Ok(())
}
