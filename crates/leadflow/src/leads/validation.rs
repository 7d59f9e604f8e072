//! Syntax checks and normalization for untrusted lead submissions.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::domain::{NewLead, DEFAULT_SOURCE};

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9\s().-]{7,}$").expect("valid phone pattern"));

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_PATTERN.is_match(value)
}

pub fn is_valid_phone(value: &str) -> bool {
    PHONE_PATTERN.is_match(value)
}

/// Interpret a loosely typed loan amount. Anything that is not a finite,
/// non-negative number collapses to `None`.
pub fn coerce_loan_amount(value: Option<&Value>) -> Option<f64> {
    let amount = match value? {
        Value::Number(number) => number.as_f64()?,
        Value::String(text) => {
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            text.parse::<f64>().ok()?
        }
        _ => return None,
    };

    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

/// First failing rule of a submission, checked in name, email, phone order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LeadValidationError {
    #[error("Name is required and must be at least 2 characters")]
    Name,
    #[error("Valid email is required")]
    Email,
    #[error("Valid phone is required")]
    Phone,
}

/// Raw intake payload. Fields keep their JSON shape until validation.
#[derive(Debug, Clone, Default)]
pub struct LeadSubmission {
    fields: Map<String, Value>,
}

impl LeadSubmission {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    /// Bodies that are not a JSON object are treated as an empty submission.
    pub fn from_json_bytes(body: &[u8]) -> Self {
        serde_json::from_slice::<Value>(body)
            .map(Self::from_value)
            .unwrap_or_default()
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str).map(str::trim)
    }

    pub fn validate(&self) -> Result<NewLead, LeadValidationError> {
        let name = self
            .text("name")
            .filter(|name| name.chars().count() >= 2)
            .ok_or(LeadValidationError::Name)?;
        let email = self
            .text("email")
            .filter(|email| is_valid_email(email))
            .ok_or(LeadValidationError::Email)?;
        let phone = self
            .text("phone")
            .filter(|phone| is_valid_phone(phone))
            .ok_or(LeadValidationError::Phone)?;

        let source = self
            .text("source")
            .filter(|source| !source.is_empty())
            .unwrap_or(DEFAULT_SOURCE);

        Ok(NewLead {
            name: name.to_string(),
            email: email.to_lowercase(),
            phone: phone.to_string(),
            city: self.text("city").unwrap_or_default().to_string(),
            loan_amount: coerce_loan_amount(self.fields.get("loanAmount")),
            source: source.to_string(),
        })
    }
}
