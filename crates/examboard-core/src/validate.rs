//! Custom field validators used by the `#[validate(custom(..))]` attributes on
//! input types.

use std::borrow::Cow;

use validator::ValidationError;

fn failure(code: &'static str, message: &'static str) -> ValidationError {
  ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// Self-registration keys: 9 to 12 digits, optionally followed by `V`.
pub fn registration_key(value: &str) -> Result<(), ValidationError> {
  let trimmed = value.trim();
  let digits = trimmed
    .strip_suffix(['V', 'v'])
    .unwrap_or(trimmed);

  if (9..=12).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
    Ok(())
  } else {
    Err(failure("nic_format", "Invalid NIC format"))
  }
}

pub fn username(value: &str) -> Result<(), ValidationError> {
  if !value.is_empty()
    && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
  {
    Ok(())
  } else {
    Err(failure(
      "username_format",
      "Only letters, numbers and underscores allowed",
    ))
  }
}

pub fn phone_number(value: &str) -> Result<(), ValidationError> {
  if value.len() == 10 && value.chars().all(|c| c.is_ascii_digit()) {
    Ok(())
  } else {
    Err(failure("phone_format", "Phone number must be 10 digits"))
  }
}

pub fn strong_password(value: &str) -> Result<(), ValidationError> {
  if !value.chars().any(|c| c.is_ascii_uppercase()) {
    return Err(failure(
      "password_uppercase",
      "Must contain at least one uppercase letter",
    ));
  }
  if !value.chars().any(|c| c.is_ascii_digit()) {
    return Err(failure("password_digit", "Must contain at least one number"));
  }
  Ok(())
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    Err(failure("blank", "Must not be blank"))
  } else {
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn registration_key_accepts_digits_with_optional_suffix() {
    assert!(registration_key("123456789").is_ok());
    assert!(registration_key("123456789V").is_ok());
    assert!(registration_key("123456789v").is_ok());
    assert!(registration_key("200012345678").is_ok());
  }

  #[test]
  fn registration_key_rejects_other_shapes() {
    assert!(registration_key("12345678").is_err());
    assert!(registration_key("1234567890123").is_err());
    assert!(registration_key("T100").is_err());
    assert!(registration_key("12345678X9").is_err());
  }

  #[test]
  fn username_charset() {
    assert!(username("john_doe42").is_ok());
    assert!(username("john doe").is_err());
    assert!(username("jöhn").is_err());
  }

  #[test]
  fn phone_must_be_ten_digits() {
    assert!(phone_number("0771234567").is_ok());
    assert!(phone_number("077123456").is_err());
    assert!(phone_number("07712345a7").is_err());
  }

  #[test]
  fn password_needs_upper_and_digit() {
    assert!(strong_password("Password1").is_ok());
    assert!(strong_password("password1").is_err());
    assert!(strong_password("Password").is_err());
  }
}
