//! Per-app payload validation.
//!
//! Each dashboard (app key) has its own notion of a minimally valid
//! payload. The sync core treats payloads as opaque JSON otherwise, so
//! validation is injected as data: a list of required fields, checked
//! when a local edit is accepted and when a remote record is sanitized.

use crate::error::{Error, Result};
use serde_json::Value;

/// Validation rules for one app's record payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSchema {
    /// App key this schema belongs to
    pub app_key: String,
    /// Fields that must be present; string values must also be
    /// non-empty after trimming
    pub required: Vec<String>,
}

impl AppSchema {
    /// Create a schema requiring the named fields.
    pub fn new(app_key: impl Into<String>, required: &[&str]) -> Self {
        Self {
            app_key: app_key.into(),
            required: required.iter().map(|field| field.to_string()).collect(),
        }
    }

    /// Schema with no required fields.
    pub fn permissive(app_key: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            required: Vec::new(),
        }
    }

    /// Client onboarding board.
    pub fn onboarding() -> Self {
        Self::new("onboarding", &["name", "company", "product", "owner"])
    }

    /// Project management board.
    pub fn project_management() -> Self {
        Self::new("project-management", &["name"])
    }

    /// Sprint tracking board.
    pub fn sprints() -> Self {
        Self::new("sprints", &["name", "startDate", "endDate"])
    }

    /// Validate a payload against this schema.
    ///
    /// The payload must be a JSON object; each required field must be
    /// present and non-null, and required string fields must be
    /// non-empty after trimming.
    pub fn validate(&self, payload: &Value) -> Result<()> {
        let obj = payload
            .as_object()
            .ok_or_else(|| Error::InvalidPayload("payload must be an object".into()))?;

        for field in &self.required {
            match obj.get(field) {
                None | Some(Value::Null) => {
                    return Err(Error::MissingRequiredField(field.clone()));
                }
                Some(Value::String(s)) if s.trim().is_empty() => {
                    return Err(Error::MissingRequiredField(field.clone()));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Sanitize a remote payload: validate it and trim whitespace from
    /// required string fields. Returns the cleaned payload.
    pub fn sanitize(&self, payload: &Value) -> Result<Value> {
        self.validate(payload)?;

        let mut cleaned = payload.clone();
        if let Some(obj) = cleaned.as_object_mut() {
            for field in &self.required {
                if let Some(Value::String(s)) = obj.get_mut(field) {
                    let trimmed = s.trim();
                    if trimmed.len() != s.len() {
                        *s = trimmed.to_string();
                    }
                }
            }
        }

        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn validate_accepts_complete_payload() {
        let schema = AppSchema::onboarding();
        let payload = json!({
            "name": "Dana",
            "company": "Acme",
            "product": "Starter",
            "owner": "sam",
            "notes": [],
        });

        assert!(schema.validate(&payload).is_ok());
    }

    #[test]
    fn validate_rejects_missing_field() {
        let schema = AppSchema::onboarding();
        let payload = json!({"name": "Dana", "company": "Acme", "product": "Starter"});

        let result = schema.validate(&payload);
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "owner"));
    }

    #[test]
    fn validate_rejects_blank_string_field() {
        let schema = AppSchema::project_management();

        let result = schema.validate(&json!({"name": "   "}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "name"));

        let result = schema.validate(&json!({"name": null}));
        assert!(matches!(result, Err(Error::MissingRequiredField(f)) if f == "name"));
    }

    #[test]
    fn validate_rejects_non_object_payload() {
        let schema = AppSchema::permissive("notes");

        assert!(matches!(
            schema.validate(&json!([1, 2, 3])),
            Err(Error::InvalidPayload(_))
        ));
        assert!(matches!(
            schema.validate(&json!(null)),
            Err(Error::InvalidPayload(_))
        ));
    }

    #[test]
    fn non_string_required_values_count_as_present() {
        let schema = AppSchema::new("custom", &["count"]);
        assert!(schema.validate(&json!({"count": 0})).is_ok());
        assert!(schema.validate(&json!({"count": false})).is_ok());
    }

    #[test]
    fn sanitize_trims_required_strings() {
        let schema = AppSchema::project_management();
        let cleaned = schema
            .sanitize(&json!({"name": "  Apollo  ", "client": " Orbit "}))
            .unwrap();

        assert_eq!(cleaned["name"], "Apollo");
        // Only required fields are touched.
        assert_eq!(cleaned["client"], " Orbit ");
    }

    #[test]
    fn permissive_schema_accepts_any_object() {
        let schema = AppSchema::permissive("scratch");
        assert!(schema.validate(&json!({})).is_ok());
        assert!(schema.validate(&json!({"anything": [1, {"x": 2}]})).is_ok());
    }
}
