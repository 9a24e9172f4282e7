//! Form definitions produced by a source's `preForm`.
//!
//! A form is an ordered list of fields. Every field has an id (the key its
//! value is submitted under), a label and a type; choice-style fields carry
//! the options the user can pick from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Kind of input a form field renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FormFieldType {
    /// Single choice from a dropdown.
    Select,
    /// Free text input.
    Input,
    /// Single choice from radio buttons.
    Radio,
    /// Multiple choice from checkboxes.
    Check,
}

impl FormFieldType {
    /// Whether the field offers a fixed set of options.
    pub fn has_options(self) -> bool {
        !matches!(self, FormFieldType::Input)
    }
}

/// An option offered by a choice field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormFieldOption {
    /// Text shown to the user.
    pub description: String,
    /// Value submitted when the option is picked.
    pub value: Value,
}

/// One field of a source configuration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Key the submitted value is stored under.
    pub id: String,

    /// Field label.
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FormFieldType,

    /// Options for choice fields; absent for `INPUT`.
    #[serde(default, alias = "options", skip_serializing_if = "Vec::is_empty")]
    pub field: Vec<FormFieldOption>,
}

/// Error type for form validation failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("Missing required field '{field}' in form field #{index}")]
    MissingRequired { index: usize, field: &'static str },

    #[error("Form field '{id}' of type {field_type:?} requires at least one option")]
    MissingOptions { id: String, field_type: FormFieldType },

    #[error("Form field '{0}' of type INPUT cannot carry options")]
    UnexpectedOptions(String),

    #[error("Duplicate form field id '{0}'")]
    DuplicateId(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

/// Parse and validate the raw value a `preForm` resolved with.
pub fn parse_form(value: Value) -> Result<Vec<FormField>, FormError> {
    let fields: Vec<FormField> =
        serde_json::from_value(value).map_err(|e| FormError::Deserialization(e.to_string()))?;
    validate_form(&fields)?;
    Ok(fields)
}

/// Validate a list of form fields.
pub fn validate_form(fields: &[FormField]) -> Result<(), FormError> {
    let mut seen = std::collections::HashSet::new();

    for (index, field) in fields.iter().enumerate() {
        if field.id.is_empty() {
            return Err(FormError::MissingRequired { index, field: "id" });
        }
        if field.name.is_empty() {
            return Err(FormError::MissingRequired { index, field: "name" });
        }
        if field.field_type.has_options() && field.field.is_empty() {
            return Err(FormError::MissingOptions {
                id: field.id.clone(),
                field_type: field.field_type,
            });
        }
        if !field.field_type.has_options() && !field.field.is_empty() {
            return Err(FormError::UnexpectedOptions(field.id.clone()));
        }
        if !seen.insert(field.id.as_str()) {
            return Err(FormError::DuplicateId(field.id.clone()));
        }
    }

    Ok(())
}
