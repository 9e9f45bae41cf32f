//! Field checks for the signup form. Each check reports validity together with the
//! message shown next to the field.

use serde::{Deserialize, Serialize};

use crate::entities::Registration;
use crate::error::{validation_error, Error};

const PASSWORD_SYMBOLS: &str = "!@#$%^&*";

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub message: &'static str,
}

impl Validation {
    fn new(is_valid: bool, valid: &'static str, invalid: &'static str) -> Self {
        Self {
            is_valid,
            message: if is_valid { valid } else { invalid },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

pub fn validate_name(name: &str) -> Validation {
    Validation::new(
        name.trim().chars().count() >= 2,
        "✓ Valid name",
        "Name is too short",
    )
}

/// `local@domain.tld`, no whitespace and a single `@`.
pub fn validate_email(email: &str) -> Validation {
    let is_valid = match email.split_once('@') {
        Some((local, domain)) => {
            let clean = |part: &str| !part.is_empty() && !part.contains(|c: char| c == '@' || c.is_whitespace());

            clean(local)
                && clean(domain)
                && domain
                    .char_indices()
                    .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
        }
        None => false,
    };

    Validation::new(is_valid, "✓ Valid email", "Invalid email format")
}

/// Optional leading `+`, then at least ten digits, spaces or dashes.
pub fn validate_phone(phone: &str) -> Validation {
    let rest = phone.strip_prefix('+').unwrap_or(phone);

    let is_valid = rest.chars().count() >= 10
        && rest
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_whitespace() || c == '-');

    Validation::new(is_valid, "✓ Valid phone number", "Invalid phone number")
}

pub fn validate_password(password: &str) -> (Validation, PasswordStrength) {
    let has = |f: fn(&char) -> bool| password.chars().any(|c| f(&c));
    let length = password.chars().count();

    let strong = has(char::is_ascii_lowercase)
        && has(char::is_ascii_uppercase)
        && has(char::is_ascii_digit)
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
        && length >= 8;
    let medium = has(char::is_ascii_alphabetic) && has(char::is_ascii_digit) && length >= 6;

    let (is_valid, message, strength) = if strong {
        (true, "✓ Strong password", PasswordStrength::Strong)
    } else if medium {
        (true, "Password is moderate", PasswordStrength::Medium)
    } else if length >= 6 {
        (true, "Password is weak", PasswordStrength::Weak)
    } else {
        (false, "Password is too weak", PasswordStrength::Weak)
    };

    (Validation { is_valid, message }, strength)
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub full_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone_number: String,
}

impl SignupForm {
    /// All fields must pass and the confirmation must match before anything is sent.
    pub fn validate(&self) -> Result<Registration, Error> {
        let all_valid = validate_name(&self.full_name).is_valid
            && validate_email(&self.email).is_valid
            && validate_phone(&self.phone_number).is_valid
            && validate_password(&self.password).0.is_valid;

        if !all_valid {
            return Err(validation_error("Please fill all fields correctly"));
        }

        if self.password != self.confirm_password {
            return Err(validation_error("Passwords do not match"));
        }

        Ok(Registration {
            name: self.full_name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            phone_number: self.phone_number.clone(),
        })
    }
}

#[test]
fn email_test() {
    assert!(validate_email("rider@ridesharex.com").is_valid);
    assert!(validate_email("a@b.co.uk").is_valid);

    for email in ["rider", "rider@host", "@host.com", "rider@.com", "rider@host.", "ri der@host.com", "a@b@c.com"] {
        let check = validate_email(email);
        assert!(!check.is_valid, "{}", email);
        assert_eq!(check.message, "Invalid email format");
    }
}

#[test]
fn phone_test() {
    assert!(validate_phone("+880 1711-000000").is_valid);
    assert!(validate_phone("01711000000").is_valid);
    assert!(!validate_phone("+12345").is_valid);
    assert!(!validate_phone("0171100000x").is_valid);
    assert!(!validate_phone("++01711000000").is_valid);
}

#[test]
fn name_test() {
    assert!(validate_name("Al").is_valid);
    assert_eq!(validate_name("  A  ").message, "Name is too short");
}

#[test]
fn password_strength_test() {
    let cases = [
        ("Secr3t!pass", true, PasswordStrength::Strong, "✓ Strong password"),
        ("secret1", true, PasswordStrength::Medium, "Password is moderate"),
        ("secret", true, PasswordStrength::Weak, "Password is weak"),
        ("abc1", false, PasswordStrength::Weak, "Password is too weak"),
    ];

    for (password, is_valid, strength, message) in cases {
        let (check, actual) = validate_password(password);
        assert_eq!(check.is_valid, is_valid, "{}", password);
        assert_eq!(actual, strength, "{}", password);
        assert_eq!(check.message, message);
    }
}

#[test]
fn signup_form_test() {
    let mut form = SignupForm {
        full_name: "Nadia Rahman".into(),
        email: "nadia@example.com".into(),
        password: "Secr3t!pass".into(),
        confirm_password: "Secr3t!pass".into(),
        phone_number: "+8801711000000".into(),
    };

    let registration = form.validate().unwrap();
    assert_eq!(registration.name, "Nadia Rahman");
    assert_eq!(registration.phone_number, "+8801711000000");

    form.confirm_password = "different1".into();
    assert_eq!(form.validate().unwrap_err().message, "Passwords do not match");

    form.email = "nadia".into();
    let err = form.validate().unwrap_err();
    assert!(err.is_invalid_input_error());
    assert_eq!(err.message, "Please fill all fields correctly");
}
