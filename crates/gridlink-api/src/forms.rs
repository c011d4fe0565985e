//! Two-step command form dialogue.
//!
//! Each operation first returns a request form describing its fields;
//! the client posts the filled values back and receives a result form
//! (plus, for history, the rendered `data` element).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormType {
    Form,
    Result,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormField {
    pub var: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Form {
    #[serde(rename = "type")]
    pub form_type: FormType,
    pub title: String,
    pub fields: Vec<FormField>,
}

impl Form {
    pub fn request(title: &str) -> Self {
        Form {
            form_type: FormType::Form,
            title: title.to_string(),
            fields: Vec::new(),
        }
    }

    pub fn result(title: &str, label: &str) -> Self {
        let mut form = Form {
            form_type: FormType::Result,
            title: title.to_string(),
            fields: Vec::new(),
        };
        form.fields.push(FormField {
            var: "result".to_string(),
            field_type: "fixed".to_string(),
            label: label.to_string(),
            required: false,
            value: Some("Success".to_string()),
            desc: None,
        });
        form
    }

    pub fn add_field(
        mut self,
        var: &str,
        label: &str,
        required: bool,
        value: Option<String>,
        desc: Option<&str>,
    ) -> Self {
        self.fields.push(FormField {
            var: var.to_string(),
            field_type: "text-single".to_string(),
            label: label.to_string(),
            required,
            value,
            desc: desc.map(str::to_string),
        });
        self
    }
}

/// The filled form posted on the second step.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FormSubmission {
    pub values: HashMap<String, String>,
}

impl FormSubmission {
    pub fn required(&self, var: &str) -> Result<&str, ApiError> {
        self.values
            .get(var)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ApiError::BadRequest(format!("missing required field {var}")))
    }

    pub fn optional(&self, var: &str) -> Option<&str> {
        self.values
            .get(var)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Payload of a completed command: the result form and, when the
/// operation produces one, the rendered `data` element.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub form: Form,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl CommandResult {
    pub fn form_only(form: Form) -> Self {
        CommandResult { form, data: None }
    }

    pub fn with_data(form: Form, data: String) -> Self {
        CommandResult {
            form,
            data: Some(data),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_fields_are_enforced() {
        let mut submission = FormSubmission::default();
        assert!(submission.required("identifier").is_err());

        submission
            .values
            .insert("identifier".to_string(), String::new());
        assert!(submission.required("identifier").is_err());

        submission
            .values
            .insert("identifier".to_string(), "urn:dev:prm:00000000000000".to_string());
        assert_eq!(
            submission.required("identifier").unwrap(),
            "urn:dev:prm:00000000000000"
        );
    }

    #[test]
    fn result_form_reports_success() {
        let form = Form::result("Subscribe", "Subscribe to urn:dev:prm:00000000000000");
        assert_eq!(form.form_type, FormType::Result);
        assert_eq!(form.fields[0].value.as_deref(), Some("Success"));
    }
}
