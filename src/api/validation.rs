//! Input validation for requests built on the client side.
//!
//! Validation failures never reach the network. Each check returns
//! `Result<(), String>` so it can be fed to
//! [`crate::error::ValidationErrorBuilder::check`].

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use crate::client::MIN_PASSWORD_LENGTH;

lazy_static! {
    /// Letters, digits and @ . + - _ (1-150 chars)
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[\w.@+-]{1,150}$").unwrap();

    /// Pragmatic email shape check; the server has the final word
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();
}

/// Longest title accepted for tenders and portfolio items
pub const MAX_TITLE_LENGTH: usize = 200;

pub fn validate_required(label: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    validate_required("Username", username)?;
    if !USERNAME_REGEX.is_match(username) {
        return Err(
            "Username may only contain letters, digits and @/./+/-/_ (max 150 characters)"
                .to_string(),
        );
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    validate_required("Email", email)?;
    if email.len() > 254 || !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err("Password cannot be entirely numeric".to_string());
    }
    Ok(())
}

pub fn validate_title(title: &str) -> Result<(), String> {
    validate_required("Title", title)?;
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(format!(
            "Title is too long (max {} characters)",
            MAX_TITLE_LENGTH
        ));
    }
    Ok(())
}

/// Money amounts must be finite and strictly positive.
pub fn validate_amount(label: &str, amount: f64) -> Result<(), String> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(format!("{} must be greater than zero", label));
    }
    Ok(())
}

pub fn validate_budget_range(min: f64, max: f64) -> Result<(), String> {
    if min > max {
        return Err("Minimum budget cannot exceed maximum budget".to_string());
    }
    Ok(())
}

/// Deadlines may be today but not in the past.
pub fn validate_deadline(deadline: NaiveDate, today: NaiveDate) -> Result<(), String> {
    if deadline < today {
        return Err("Deadline cannot be in the past".to_string());
    }
    Ok(())
}

pub fn validate_rating(rating: u8) -> Result<(), String> {
    if !(1..=5).contains(&rating) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username("a.lice+tenders@x").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("vendor@example.com").is_ok());
        assert!(validate_email("first.last+bids@mail.example.org").is_ok());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("a@b").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("correct horse").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password("12345678901").is_err());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_validate_budget() {
        assert!(validate_budget_range(100.0, 100.0).is_ok());
        assert!(validate_budget_range(100.0, 500.0).is_ok());
        assert!(validate_budget_range(500.0, 100.0).is_err());
        assert!(validate_amount("Amount", 0.0).is_err());
        assert!(validate_amount("Amount", f64::NAN).is_err());
        assert!(validate_amount("Amount", 0.01).is_ok());
    }

    #[test]
    fn test_validate_deadline() {
        let today = date("2026-10-16");
        assert!(validate_deadline(date("2026-10-16"), today).is_ok());
        assert!(validate_deadline(date("2026-12-01"), today).is_ok());
        assert!(validate_deadline(date("2026-10-15"), today).is_err());
    }

    #[test]
    fn test_validate_rating_and_title() {
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(5).is_ok());
        assert!(validate_rating(6).is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"t".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }
}
