//! Input normalisation for contact form fields.
//!
//! Every field is trimmed, stripped of control characters and clamped to a
//! field-specific length. Name and message are then HTML-escaped; email is
//! reduced to the characters RFC 5322 allows in an address and lower-cased.

use crate::models::SubmissionPayload;

pub const MAX_NAME_LEN: usize = 100;
/// RFC 5321 path limit.
pub const MAX_EMAIL_LEN: usize = 254;
pub const MAX_MESSAGE_LEN: usize = 5000;

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '/' => out.push_str("&#x2F;"),
            c => out.push(c),
        }
    }
    out
}

/// Trim, drop control characters (NUL included) and clamp to `max_chars`.
///
/// With `keep_newlines`, `\n` and `\t` survive; `\r` is always dropped so
/// CRLF input comes out as plain `\n`.
pub fn sanitize_text(input: &str, max_chars: usize, keep_newlines: bool) -> String {
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|&c| !c.is_control() || (keep_newlines && matches!(c, '\n' | '\t')))
        .take(max_chars)
        .collect();
    cleaned.trim().to_string()
}

pub fn sanitize_name(input: &str) -> String {
    escape_html(&sanitize_text(input, MAX_NAME_LEN, false))
}

pub fn sanitize_message(input: &str) -> String {
    escape_html(&sanitize_text(input, MAX_MESSAGE_LEN, true))
}

pub fn sanitize_email(input: &str) -> String {
    sanitize_text(input, MAX_EMAIL_LEN, false)
        .chars()
        .filter(|&c| is_email_char(c))
        .collect::<String>()
        .to_lowercase()
}

fn is_email_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "@.!#$%&'*+/=?^_`{|}~-".contains(c)
}

pub fn sanitize_payload(payload: &SubmissionPayload) -> SubmissionPayload {
    SubmissionPayload {
        name: sanitize_name(&payload.name),
        email: sanitize_email(&payload.email),
        message: sanitize_message(&payload.message),
    }
}
