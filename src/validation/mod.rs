//! Input validation shared by every form.
//!
//! Each `validate_*` function checks a single field and returns the message to
//! show next to it. Form-level checks collect those messages into a
//! [`FieldErrors`] map, which either finishes cleanly or becomes a
//! [`ClientError::Validation`] before any request is built.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ClientError;

lazy_static! {
    /// Loose email shape: something@something.tld
    static ref EMAIL_REGEX: Regex = Regex::new(r"^\S+@\S+\.\S+$").unwrap();

    /// Exactly ten digits
    static ref PHONE_REGEX: Regex = Regex::new(r"^\d{10}$").unwrap();

    static ref DIGIT_REGEX: Regex = Regex::new(r"\d").unwrap();

    static ref UPPERCASE_REGEX: Regex = Regex::new(r"[A-Z]").unwrap();
}

/// Minimum password length accepted at signup
pub const MIN_PASSWORD_LEN: usize = 8;

/// Field name to message, one message per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FieldErrors {
    errors: BTreeMap<String, String>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for a field. The first message for a field wins.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) -> &mut Self {
        self.errors
            .entry(field.into())
            .or_insert_with(|| message.into());
        self
    }

    /// Record the error from a field validator, if any.
    pub fn check(&mut self, field: &str, result: Result<(), String>) -> &mut Self {
        if let Err(message) = result {
            self.add(field, message);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors.get(field).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.errors.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// One-line description suitable for a banner.
    pub fn summary(&self) -> String {
        match self.errors.len() {
            0 => "Validation failed".to_string(),
            1 => self
                .errors
                .values()
                .next()
                .cloned()
                .unwrap_or_else(|| "Validation failed".to_string()),
            n => format!("Validation failed for {} fields", n),
        }
    }

    /// Return Ok(()) if no errors, or the collected errors as a `ClientError`
    pub fn finish(self) -> Result<(), ClientError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Validate that a text field is not blank
pub fn validate_required(value: &str, label: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate an optional email address (empty is allowed)
pub fn validate_optional_email(email: &Option<String>) -> Result<(), String> {
    match email {
        Some(e) if !e.trim().is_empty() => validate_email(e),
        _ => Ok(()),
    }
}

/// Validate a new account password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }

    if !DIGIT_REGEX.is_match(password) {
        return Err("Password must contain a number".to_string());
    }

    if !UPPERCASE_REGEX.is_match(password) {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    Ok(())
}

/// Validate a ten-digit phone number
pub fn validate_phone(phone: &str) -> Result<(), String> {
    let phone = phone.trim();
    if phone.is_empty() {
        return Err("Phone number is required".to_string());
    }

    if !PHONE_REGEX.is_match(phone) {
        return Err("Phone number must be 10 digits".to_string());
    }

    Ok(())
}

/// Validate a free-text coordinate. Empty is allowed (location unknown).
pub fn validate_coordinate(value: &str, min: f64, max: f64, label: &str) -> Result<(), String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }

    let parsed: f64 = value
        .parse()
        .map_err(|_| format!("{} must be a number", label))?;

    if !parsed.is_finite() || parsed < min || parsed > max {
        return Err(format!("{} must be between {} and {}", label, min, max));
    }

    Ok(())
}

pub fn validate_latitude(value: &str) -> Result<(), String> {
    validate_coordinate(value, -90.0, 90.0, "Latitude")
}

pub fn validate_longitude(value: &str) -> Result<(), String> {
    validate_coordinate(value, -180.0, 180.0, "Longitude")
}

/// A coordinate as entered, trimmed. Empty maps to `None`.
pub fn coordinate_text(value: &str) -> Option<String> {
    Some(value.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
