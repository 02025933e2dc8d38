use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::error::AppError;

/// One field-level violation, `path` addressing the offending field.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: &str, message: &str) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Password strength rules: length plus one of each character class.
fn password_errors(path: &str, password: &str, out: &mut Vec<FieldError>) {
    if password.len() < 8 {
        out.push(FieldError::new(
            path,
            "Password must be at least 8 characters long",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        out.push(FieldError::new(
            path,
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        out.push(FieldError::new(
            path,
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        out.push(FieldError::new(
            path,
            "Password must contain at least one number",
        ));
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        out.push(FieldError::new(
            path,
            "Password must contain at least one special character",
        ));
    }
}

pub fn validate_register(name: &str, email: &str, password: &str) -> Result<(), AppError> {
    let mut errors = Vec::new();
    if name.trim().is_empty() {
        errors.push(FieldError::new("name", "Name must not be empty"));
    }
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "Invalid email"));
    }
    password_errors("password", password, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}

pub fn validate_login(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::Validation(vec![FieldError::new(
            "email",
            "Invalid email",
        )]))
    }
}

pub fn validate_password_update(
    new_password: &str,
    confirm_password: &str,
    verification_code: &str,
) -> Result<(), AppError> {
    let mut errors = Vec::new();
    password_errors("new_password", new_password, &mut errors);
    if new_password != confirm_password {
        errors.push(FieldError::new(
            "confirm_password",
            "Confirm password must be equal to new password",
        ));
    }
    if verification_code.len() != 6 || !verification_code.chars().all(|c| c.is_ascii_digit()) {
        errors.push(FieldError::new(
            "verification_code",
            "Code must be 6 digits long",
        ));
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
