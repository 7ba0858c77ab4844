use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::security::ThreatKind;

// Contact form submission, as posted by the form
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub name: String,
    pub email: String,
    pub message: String,
}

// What the caller gets back: `{ success: true }` or `{ success: false, error }`
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SubmissionResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SubmissionResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

// Outcome of a security scan
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct SecurityReport {
    pub safe: bool,
    pub threats: Vec<ThreatKind>,
}

// Answer from a rate limiter check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_time: DateTime<Utc>,
}

// Result of handing a message to the email collaborator
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct EmailOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EmailOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}
