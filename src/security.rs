//! Heuristic payload screening.
//!
//! A fixed, ordered list of regex signatures for SQL injection and XSS
//! vectors, plus a special-character density check. This is pattern
//! matching, not parsing: it has false negatives and false positives and
//! is one gate among several, never a guarantee.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::SecurityReport;

/// Share of non-alphanumeric, non-whitespace characters above which input is flagged.
pub const SPECIAL_CHAR_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatKind {
    SqlKeyword,
    SqlTautology,
    SqlComment,
    ScriptTag,
    ScriptUrl,
    EventHandler,
    Eval,
    EmbeddedObject,
    SpecialCharDensity,
}

impl ThreatKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatKind::SqlKeyword => "sql_keyword",
            ThreatKind::SqlTautology => "sql_tautology",
            ThreatKind::SqlComment => "sql_comment",
            ThreatKind::ScriptTag => "script_tag",
            ThreatKind::ScriptUrl => "script_url",
            ThreatKind::EventHandler => "event_handler",
            ThreatKind::Eval => "eval",
            ThreatKind::EmbeddedObject => "embedded_object",
            ThreatKind::SpecialCharDensity => "special_char_density",
        }
    }
}

impl fmt::Display for ThreatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct Signature {
    pattern: Regex,
    threat: ThreatKind,
}

pub struct SecurityDetector {
    signatures: Vec<Signature>,
    density_threshold: f64,
}

impl Default for SecurityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityDetector {
    pub fn new() -> Self {
        Self {
            signatures: Self::build_signatures(),
            density_threshold: SPECIAL_CHAR_THRESHOLD,
        }
    }

    // Order matters: threats are reported in this order.
    fn build_signatures() -> Vec<Signature> {
        let table: [(&str, ThreatKind); 8] = [
            (
                r"(?i)\b(?:union\s+(?:all\s+)?select|drop\s+(?:table|database)|insert\s+into|delete\s+from|truncate\s+table|alter\s+table|update\s+\w+\s+set\s+\w+\s*=|exec(?:ute)?\s*\()",
                ThreatKind::SqlKeyword,
            ),
            (
                r#"(?i)(?:['"]\s*(?:or|and)\s+['"]?\w+['"]?\s*=\s*['"]?\w+|\bor\s+1\s*=\s*1\b)"#,
                ThreatKind::SqlTautology,
            ),
            (r#"['";]\s*(?:--|/\*)"#, ThreatKind::SqlComment),
            (r"(?i)<\s*script\b", ThreatKind::ScriptTag),
            (r"(?i)\b(?:javascript|vbscript)\s*:", ThreatKind::ScriptUrl),
            (r"(?i)\bon[a-z]+\s*=", ThreatKind::EventHandler),
            (r"(?i)\beval\s*\(", ThreatKind::Eval),
            (r"(?i)<\s*(?:iframe|object|embed)\b", ThreatKind::EmbeddedObject),
        ];

        table
            .into_iter()
            .map(|(pattern, threat)| Signature {
                pattern: Regex::new(pattern).unwrap(),
                threat,
            })
            .collect()
    }

    /// Run every signature and the density check.
    pub fn detect(&self, input: &str) -> SecurityReport {
        let mut threats = self.matched_signatures(input);
        if special_char_ratio(input) > self.density_threshold {
            threats.push(ThreatKind::SpecialCharDensity);
        }
        SecurityReport {
            safe: threats.is_empty(),
            threats,
        }
    }

    /// Signatures only. For short structured fields (email addresses)
    /// where punctuation density says nothing.
    pub fn detect_patterns(&self, input: &str) -> SecurityReport {
        let threats = self.matched_signatures(input);
        SecurityReport {
            safe: threats.is_empty(),
            threats,
        }
    }

    pub fn is_safe(&self, input: &str) -> bool {
        self.detect(input).safe
    }

    fn matched_signatures(&self, input: &str) -> Vec<ThreatKind> {
        self.signatures
            .iter()
            .filter(|sig| sig.pattern.is_match(input))
            .map(|sig| sig.threat)
            .collect()
    }
}

/// Fraction of characters that are neither alphanumeric nor whitespace.
pub fn special_char_ratio(input: &str) -> f64 {
    let (total, special) = input.chars().fold((0usize, 0usize), |(total, special), c| {
        let is_special = !c.is_alphanumeric() && !c.is_whitespace();
        (total + 1, special + usize::from(is_special))
    });
    if total == 0 {
        return 0.0;
    }
    special as f64 / total as f64
}
