use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static SLUG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("valid slug pattern"));

static FIELD_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid field name pattern"));

/// Input widget rendered for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Email,
    Tel,
    Number,
    Textarea,
    Select,
}

impl FieldKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Email => "email",
            FieldKind::Tel => "tel",
            FieldKind::Number => "number",
            FieldKind::Textarea => "textarea",
            FieldKind::Select => "select",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FieldKind,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Stored form as served to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub fields: Vec<FormField>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

/// Admin-supplied form, used both by the create endpoint and the bulk import.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormDefinition {
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FormField>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl FormDefinition {
    pub fn validate(&self) -> Result<(), FormValidationError> {
        if !SLUG_PATTERN.is_match(&self.slug) {
            return Err(FormValidationError::Slug(self.slug.clone()));
        }
        validate_content(&self.name, &self.fields)
    }

    pub fn into_schema(self, now: DateTime<Utc>) -> FormSchema {
        FormSchema {
            id: Uuid::new_v4(),
            name: self.name.trim().to_string(),
            slug: self.slug,
            description: self.description.trim().to_string(),
            fields: self.fields,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Editable part of a form. The slug is fixed once created.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FormUpdate {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FormField>,
}

impl FormUpdate {
    pub fn validate(&self) -> Result<(), FormValidationError> {
        validate_content(&self.name, &self.fields)
    }

    pub fn apply(self, schema: &mut FormSchema, at: DateTime<Utc>) {
        schema.name = self.name.trim().to_string();
        schema.description = self.description.trim().to_string();
        schema.fields = self.fields;
        schema.updated_at = at;
    }
}

impl From<&FormDefinition> for FormUpdate {
    fn from(definition: &FormDefinition) -> Self {
        Self {
            name: definition.name.clone(),
            description: definition.description.clone(),
            fields: definition.fields.clone(),
        }
    }
}

fn validate_content(name: &str, fields: &[FormField]) -> Result<(), FormValidationError> {
    if name.trim().is_empty() {
        return Err(FormValidationError::Name);
    }
    if fields.is_empty() {
        return Err(FormValidationError::NoFields);
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        if !FIELD_NAME_PATTERN.is_match(&field.name) {
            return Err(FormValidationError::FieldName(field.name.clone()));
        }
        if !seen.insert(field.name.as_str()) {
            return Err(FormValidationError::DuplicateField(field.name.clone()));
        }
        if field.label.trim().is_empty() {
            return Err(FormValidationError::FieldLabel(field.name.clone()));
        }
        if field.kind == FieldKind::Select {
            let has_options = field
                .options
                .as_ref()
                .is_some_and(|options| options.iter().any(|option| !option.trim().is_empty()));
            if !has_options {
                return Err(FormValidationError::MissingOptions(field.name.clone()));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormValidationError {
    #[error("Form name is required")]
    Name,
    #[error("Invalid slug '{0}': use lower-case letters, digits and single dashes")]
    Slug(String),
    #[error("A form needs at least one field")]
    NoFields,
    #[error("Invalid field name '{0}'")]
    FieldName(String),
    #[error("Duplicate field name '{0}'")]
    DuplicateField(String),
    #[error("Field '{0}' needs a label")]
    FieldLabel(String),
    #[error("Select field '{0}' needs at least one option")]
    MissingOptions(String),
}
