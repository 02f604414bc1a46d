//! Input validation for account requests.
//!
//! Item fields are validated by the lifecycle engine. This module covers
//! registration only.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::RegisterRequest;
use crate::engine::{FieldErrors, FieldErrorsBuilder};

lazy_static! {
    /// Usernames: 3-32 characters of letters, digits, `_` and `-`
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]{3,32}$").unwrap();

    /// Loose email shape: something@domain.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username must be 3-32 characters of letters, digits, '_' or '-'".to_string(),
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Check every registration field, collecting all failures
pub fn validate_registration(req: &RegisterRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrorsBuilder::new();

    if let Err(e) = validate_username(req.username.trim()) {
        errors.add("username", e);
    }
    if let Err(e) = validate_email(req.email.trim()) {
        errors.add("email", e);
    }
    if let Err(e) = validate_password(&req.password) {
        errors.add("password", e);
    }

    errors.into_result()
}
