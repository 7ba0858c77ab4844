//! Shared contact form schema.
//!
//! The gateway and the `contact-submit` client run the same checks, so a
//! payload the client accepts is never bounced by the server for shape.

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::models::SubmissionPayload;

pub const NAME_MIN_CHARS: usize = 2;
pub const MESSAGE_MIN_CHARS: usize = 10;
pub const MESSAGE_MAX_CHARS: usize = 500;

lazy_static! {
    static ref EMAIL_FORMAT: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$"
    )
    .unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every schema violation found in one payload, in field order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().map(|e| e.field)
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        f.write_str(&joined)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_FORMAT.is_match(email.trim())
}

pub fn validate(payload: &SubmissionPayload) -> Result<(), ValidationErrors> {
    let mut errors = Vec::new();

    if payload.name.trim().chars().count() < NAME_MIN_CHARS {
        errors.push(FieldError {
            field: "name",
            message: format!("Name must be at least {NAME_MIN_CHARS} characters"),
        });
    }

    if !is_valid_email(&payload.email) {
        errors.push(FieldError {
            field: "email",
            message: "Please enter a valid email address".to_string(),
        });
    }

    let message_chars = payload.message.trim().chars().count();
    if message_chars < MESSAGE_MIN_CHARS {
        errors.push(FieldError {
            field: "message",
            message: format!("Message must be at least {MESSAGE_MIN_CHARS} characters"),
        });
    } else if message_chars > MESSAGE_MAX_CHARS {
        errors.push(FieldError {
            field: "message",
            message: format!("Message must be at most {MESSAGE_MAX_CHARS} characters"),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(name: &str, email: &str, message: &str) -> SubmissionPayload {
        SubmissionPayload {
            name: name.to_string(),
            email: email.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn accepts_well_formed_payload() {
        let p = payload("Ada", "ada@example.com", "I would like to talk about a project.");
        assert!(validate(&p).is_ok());
    }

    #[test]
    fn short_message_is_rejected() {
        let err = validate(&payload("Al", "a@b.com", "short")).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["message"]);
        assert_eq!(err.to_string(), "Message must be at least 10 characters");
    }

    #[test]
    fn messages_are_joined_in_field_order() {
        let err = validate(&payload("A", "not-an-email", "tiny")).unwrap_err();
        assert_eq!(err.fields().collect::<Vec<_>>(), vec!["name", "email", "message"]);
        assert_eq!(
            err.to_string(),
            "Name must be at least 2 characters, Please enter a valid email address, \
             Message must be at least 10 characters"
        );
    }

    #[test]
    fn long_message_is_rejected() {
        let long = "x".repeat(MESSAGE_MAX_CHARS + 1);
        let err = validate(&payload("Ada", "ada@example.com", &long)).unwrap_err();
        assert_eq!(err.to_string(), "Message must be at most 500 characters");
    }

    #[test]
    fn email_format() {
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(!is_valid_email("missing-at.example.com"));
        assert!(!is_valid_email("no-tld@example"));
        assert!(!is_valid_email("two@@example.com"));
        assert!(!is_valid_email("spaces in@example.com"));
    }
}
