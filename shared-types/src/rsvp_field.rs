use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::guest::RsvpData;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, TS, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RsvpFieldType {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Select,
    Radio,
    Checkbox,
    Toggle,
    Date,
    Time,
    Datetime,
    File,
    Rating,
    Address,
}

impl RsvpFieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RsvpFieldType::Text => "text",
            RsvpFieldType::Textarea => "textarea",
            RsvpFieldType::Email => "email",
            RsvpFieldType::Phone => "phone",
            RsvpFieldType::Number => "number",
            RsvpFieldType::Select => "select",
            RsvpFieldType::Radio => "radio",
            RsvpFieldType::Checkbox => "checkbox",
            RsvpFieldType::Toggle => "toggle",
            RsvpFieldType::Date => "date",
            RsvpFieldType::Time => "time",
            RsvpFieldType::Datetime => "datetime",
            RsvpFieldType::File => "file",
            RsvpFieldType::Rating => "rating",
            RsvpFieldType::Address => "address",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_value(Value::String(raw.trim().to_lowercase())).ok()
    }

    /// Types whose answers must come from `field_options`.
    pub fn requires_options(&self) -> bool {
        matches!(
            self,
            RsvpFieldType::Select | RsvpFieldType::Radio | RsvpFieldType::Checkbox
        )
    }
}

impl std::fmt::Display for RsvpFieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One host-defined question on the detailed RSVP form.
#[derive(Debug, Clone, Serialize, Deserialize, TS, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RsvpFieldDef {
    pub id: i64,
    pub field_name: String,
    pub field_label: String,
    pub field_type: RsvpFieldType,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub field_options: Vec<String>,
    pub placeholder_text: Option<String>,
    #[serde(default)]
    pub display_order: i64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FieldValidationError {
    #[error("Field '{0}' needs at least one option")]
    MissingOptions(String),
    #[error("Field '{0}' is required")]
    MissingAnswer(String),
    #[error("'{value}' is not an option of field '{field}'")]
    UnknownOption { field: String, value: String },
}

impl RsvpFieldDef {
    /// Checks the definition itself, as saved by the host.
    pub fn validate(&self) -> Result<(), FieldValidationError> {
        if self.field_type.requires_options() && self.field_options.is_empty() {
            return Err(FieldValidationError::MissingOptions(self.field_name.clone()));
        }
        Ok(())
    }

    /// Checks the guest's answer to this field.
    pub fn check_answer(&self, answer: Option<&Value>) -> Result<(), FieldValidationError> {
        let answer = answer.filter(|v| !is_blank(v));
        let Some(answer) = answer else {
            if self.is_required {
                return Err(FieldValidationError::MissingAnswer(self.field_name.clone()));
            }
            return Ok(());
        };

        if !matches!(self.field_type, RsvpFieldType::Select | RsvpFieldType::Radio)
            || self.field_options.is_empty()
        {
            return Ok(());
        }

        match answer {
            Value::String(s) if self.field_options.iter().any(|o| o == s) => Ok(()),
            other => Err(FieldValidationError::UnknownOption {
                field: self.field_name.clone(),
                value: match other {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                },
            }),
        }
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Validates a submitted answer set against the ordered field definitions.
pub fn validate_answers(fields: &[RsvpFieldDef], answers: &RsvpData) -> Result<(), FieldValidationError> {
    for field in fields {
        field.check_answer(answers.get(&field.field_name))?;
    }
    Ok(())
}

/// Field definitions in form order.
pub fn sort_fields(fields: &mut [RsvpFieldDef]) {
    fields.sort_by(|a, b| a.display_order.cmp(&b.display_order).then(a.id.cmp(&b.id)));
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct RsvpFieldsResponse {
    pub fields: Vec<RsvpFieldDef>,
}
