//! Input validation for API requests.
//!
//! Each validator returns `Err(message)` suitable for a field-level entry.
//! To collect several of them into one response, use the
//! `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::scheduling;

lazy_static! {
    /// Pragmatic email shape check: local part, @, dotted domain
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Optional leading +, digits with single spaces or dashes between groups
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9]+([ -]?[0-9]+)*$"
    ).unwrap();

    static ref OTP_CODE_REGEX: Regex = Regex::new(r"^[0-9]{6}$").unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.trim().is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate password strength: at least 8 characters with a letter and a digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }

    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }

    if trimmed.chars().count() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }

    Ok(())
}

/// Validate a phone number. Empty is allowed: phone is optional on accounts.
pub fn validate_phone(phone: &str) -> Result<(), String> {
    if phone.is_empty() {
        return Ok(());
    }

    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) || !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number".to_string());
    }

    Ok(())
}

/// Validate a six-digit sign-in code
pub fn validate_otp_code(code: &str) -> Result<(), String> {
    if !OTP_CODE_REGEX.is_match(code) {
        return Err("Code must be 6 digits".to_string());
    }
    Ok(())
}

/// Validate a `YYYY-MM-DD` date
pub fn validate_date(date: &str) -> Result<(), String> {
    if date.is_empty() {
        return Err("Date is required".to_string());
    }

    scheduling::parse_date(date)
        .map(|_| ())
        .map_err(|_| "Invalid date. Expected YYYY-MM-DD".to_string())
}

/// Validate that a time is one of the bookable slots
pub fn validate_slot(time: &str) -> Result<(), String> {
    if !scheduling::is_template_slot(time) {
        return Err(format!(
            "Invalid time. Must be one of: {}",
            scheduling::SLOT_TEMPLATE.join(", ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("patient@demo.com").is_ok());
        assert!(validate_email("first.last+tag@clinic.co.in").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user@@demo.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("demo1234").is_ok());
        assert!(validate_password("correct horse 9").is_ok());

        assert!(validate_password("abc123").is_err()); // too short
        assert!(validate_password("abcdefghij").is_err()); // no digit
        assert!(validate_password("1234567890").is_err()); // no letter
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Rahul Sharma").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("").is_ok());
        assert!(validate_phone("+91-9876543210").is_ok());
        assert!(validate_phone("+91 98765 43210").is_ok());
        assert!(validate_phone("9876543210").is_ok());

        assert!(validate_phone("12345").is_err()); // too few digits
        assert!(validate_phone("call me").is_err());
        assert!(validate_phone("+91--98765").is_err());
    }

    #[test]
    fn test_validate_otp_code() {
        assert!(validate_otp_code("042917").is_ok());
        assert!(validate_otp_code("42917").is_err());
        assert!(validate_otp_code("abcdef").is_err());
    }

    #[test]
    fn test_validate_date_and_slot() {
        assert!(validate_date("2024-01-20").is_ok());
        assert!(validate_date("").is_err());
        assert!(validate_date("2024-13-01").is_err());
        assert!(validate_date("2024-1-5").is_err());

        assert!(validate_slot("09:00").is_ok());
        assert!(validate_slot("16:30").is_ok());
        assert!(validate_slot("12:00").is_err());
        assert!(validate_slot("9:00").is_err());
    }
}
