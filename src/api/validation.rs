//! Input validation for API requests.
//!
//! Request bodies are deserialized into typed structs at the boundary; these
//! functions apply the field-level constraints on top.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Reasonable email shape; real validation happens when mail is sent
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();

    /// Phone numbers: digits with optional +, spaces, dashes and parens
    static ref PHONE_REGEX: Regex = Regex::new(r"^\+?[0-9()\s-]{6,20}$").unwrap();
}

pub fn validate_email(email: &str) -> Result<(), String> {
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

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    if name.len() > 100 {
        return Err("Name is too long (max 100 characters)".to_string());
    }
    Ok(())
}

pub fn validate_phone(phone: &str) -> Result<(), String> {
    // Optional field, empty is fine
    if phone.is_empty() {
        return Ok(());
    }
    if !PHONE_REGEX.is_match(phone) {
        return Err("Invalid phone number format".to_string());
    }
    Ok(())
}

pub fn validate_brand(brand: &str) -> Result<(), String> {
    if brand.trim().is_empty() {
        return Err("Brand is required".to_string());
    }
    if brand.len() > 60 {
        return Err("Brand is too long (max 60 characters)".to_string());
    }
    Ok(())
}

pub fn validate_model(model: &str) -> Result<(), String> {
    if model.trim().is_empty() {
        return Err("Model is required".to_string());
    }
    if model.len() > 60 {
        return Err("Model is too long (max 60 characters)".to_string());
    }
    Ok(())
}

pub fn validate_year(year: i64) -> Result<(), String> {
    let current = chrono::Utc::now().format("%Y").to_string().parse::<i64>().unwrap_or(2100);
    if year < 1900 || year > current + 1 {
        return Err(format!("Year must be between 1900 and {}", current + 1));
    }
    Ok(())
}

pub fn validate_price(price: i64) -> Result<(), String> {
    if price <= 0 {
        return Err("Price must be greater than zero".to_string());
    }
    Ok(())
}

pub fn validate_mileage(mileage: i64) -> Result<(), String> {
    if mileage < 0 {
        return Err("Mileage cannot be negative".to_string());
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.len() > 5000 {
        return Err("Description is too long (max 5000 characters)".to_string());
    }
    Ok(())
}
