use serde_json::{Map, Value};

use crate::error::AppError;

/// Collects per-field messages; turns into a 400 when anything was added.
#[derive(Debug, Default)]
pub struct FieldErrors {
    errors: Map<String, Value>,
}

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        let entry = self
            .errors
            .entry(field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(Value::String(message.to_string()));
        }
    }

    pub fn require_text(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "This field may not be blank.");
        }
    }

    pub fn require_non_negative(&mut self, field: &str, value: f64) {
        if value < 0.0 {
            self.add(field, "Ensure this value is greater than or equal to 0.");
        }
    }

    pub fn require_percent(&mut self, field: &str, value: f64) {
        if !(0.0..=100.0).contains(&value) {
            self.add(field, "Ensure this value is between 0 and 100.");
        }
    }

    pub fn require_min_len(&mut self, field: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.add(
                field,
                &format!("Ensure this field has at least {min} characters."),
            );
        }
    }

    pub fn require_email(&mut self, field: &str, value: &str) {
        let valid = value
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
            .unwrap_or(false);
        if !valid {
            self.add(field, "Enter a valid email address.");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<(), AppError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(AppError::Validation {
            message: "Validation error".to_string(),
            errors: self.errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_input_passes() {
        let mut errors = FieldErrors::default();
        errors.require_text("name", "Tower A");
        errors.require_percent("progress", 100.0);
        errors.require_email("email", "site@builder.io");
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn messages_accumulate_per_field() {
        let mut errors = FieldErrors::default();
        errors.require_min_len("password", "abc", 6);
        errors.add("password", "Passwords do not match.");
        errors.require_email("email", "not-an-email");

        match errors.into_result() {
            Err(AppError::Validation { errors, .. }) => {
                assert_eq!(errors["password"].as_array().unwrap().len(), 2);
                assert!(errors.contains_key("email"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
