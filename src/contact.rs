//! Contact submission orchestrator.
//!
//! Runs one submission through a fixed sequence of gates:
//!
//! ```text
//! Received -> SchemaValidated -> Sanitized -> SecurityChecked
//!          -> DuplicateChecked -> RateChecked -> Delegated -> Success
//! ```
//!
//! The first gate that fails ends the run with a [`SubmissionError`]. The
//! email collaborator is only reached once every gate has passed, and is
//! never retried. Whatever happens, callers get a well-formed result.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use chrono::Utc;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::duplicate::DuplicateGuard;
use crate::mailer::EmailSender;
use crate::metrics::{
    DUPLICATE_ENTRIES, REJECTIONS_TOTAL, SUBMISSION_LATENCY, SUBMISSIONS_TOTAL,
};
use crate::models::{SubmissionPayload, SubmissionResult};
use crate::rate_limit::{RateLimiter, StoreError, minutes_until_reset};
use crate::sanitize::sanitize_payload;
use crate::security::{SecurityDetector, ThreatKind};
use crate::validation::{ValidationErrors, validate};

const DELIVERY_FALLBACK: &str = "Failed to send message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStage {
    Received,
    SchemaValidated,
    Sanitized,
    SecurityChecked,
    DuplicateChecked,
    RateChecked,
    Delegated,
}

/// Why a submission stopped. `Display` is the text shown to the user.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("{0}")]
    Validation(ValidationErrors),

    // Threats are logged, never shown to the user.
    #[error("Invalid input detected")]
    Security(Vec<ThreatKind>),

    #[error("This message has already been submitted. Please wait before sending it again.")]
    Duplicate,

    #[error("Too many submissions. Please try again in {minutes} minutes.")]
    RateLimited { minutes: i64 },

    #[error("{0}")]
    Delivery(String),

    #[error("An unexpected error occurred. Please try again later.")]
    Internal {
        stage: SubmissionStage,
        detail: String,
    },
}

impl SubmissionError {
    /// Last stage the submission got through before failing.
    pub fn stage(&self) -> SubmissionStage {
        match self {
            SubmissionError::Validation(_) => SubmissionStage::Received,
            SubmissionError::Security(_) => SubmissionStage::Sanitized,
            SubmissionError::Duplicate => SubmissionStage::SecurityChecked,
            SubmissionError::RateLimited { .. } => SubmissionStage::DuplicateChecked,
            SubmissionError::Delivery(_) => SubmissionStage::Delegated,
            SubmissionError::Internal { stage, .. } => *stage,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            SubmissionError::Validation(_) => "validation",
            SubmissionError::Security(_) => "security",
            SubmissionError::Duplicate => "duplicate",
            SubmissionError::RateLimited { .. } => "rate_limited",
            SubmissionError::Delivery(_) => "delivery",
            SubmissionError::Internal { .. } => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SubmissionError::Validation(_) | SubmissionError::Security(_) => {
                StatusCode::BAD_REQUEST
            }
            SubmissionError::Duplicate => StatusCode::CONFLICT,
            SubmissionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            SubmissionError::Delivery(_) => StatusCode::BAD_GATEWAY,
            SubmissionError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Store errors only surface from the rate check.
impl From<StoreError> for SubmissionError {
    fn from(e: StoreError) -> Self {
        SubmissionError::Internal {
            stage: SubmissionStage::DuplicateChecked,
            detail: e.to_string(),
        }
    }
}

pub struct ContactService {
    detector: SecurityDetector,
    duplicates: DuplicateGuard,
    limiter: RateLimiter,
    mailer: Arc<dyn EmailSender>,
    send_timeout: Duration,
}

impl ContactService {
    pub fn new(
        duplicates: DuplicateGuard,
        limiter: RateLimiter,
        mailer: Arc<dyn EmailSender>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            detector: SecurityDetector::new(),
            duplicates,
            limiter,
            mailer,
            send_timeout,
        }
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn duplicates(&self) -> &DuplicateGuard {
        &self.duplicates
    }

    /// Run a submission and flatten the outcome into the caller-facing result.
    pub async fn submit(&self, payload: SubmissionPayload, client_id: &str) -> SubmissionResult {
        match self.process(payload, client_id).await {
            Ok(()) => SubmissionResult::ok(),
            Err(e) => SubmissionResult::failed(e.to_string()),
        }
    }

    pub async fn process(
        &self,
        payload: SubmissionPayload,
        client_id: &str,
    ) -> Result<(), SubmissionError> {
        let start_time = Instant::now();
        SUBMISSIONS_TOTAL.inc();

        let result = self.run(payload, client_id).await;

        SUBMISSION_LATENCY.observe(start_time.elapsed().as_secs_f64());
        DUPLICATE_ENTRIES.set(self.duplicates.len() as i64);

        match &result {
            Ok(()) => info!("contact submission delivered"),
            Err(e) => {
                REJECTIONS_TOTAL.with_label_values(&[e.reason()]).inc();
                match e {
                    SubmissionError::Internal { detail, .. } => {
                        error!(stage = ?e.stage(), %detail, "contact submission failed")
                    }
                    SubmissionError::Security(threats) => {
                        warn!(stage = ?e.stage(), ?threats, "contact submission rejected")
                    }
                    _ => warn!(stage = ?e.stage(), reason = e.reason(), "contact submission rejected"),
                }
            }
        }
        result
    }

    async fn run(&self, payload: SubmissionPayload, client_id: &str) -> Result<(), SubmissionError> {
        let now = Utc::now();

        validate(&payload).map_err(SubmissionError::Validation)?;
        debug!(stage = ?SubmissionStage::SchemaValidated, "schema ok");

        let clean = sanitize_payload(&payload);

        // Scan the submitted text: escaping would hide the markup we look for.
        let threats = self.scan(&payload);
        if !threats.is_empty() {
            return Err(SubmissionError::Security(threats));
        }

        if self.duplicates.is_duplicate_at(&clean.message, now) {
            return Err(SubmissionError::Duplicate);
        }

        let decision = self.limiter.check_at(client_id, now)?;
        if !decision.allowed {
            return Err(SubmissionError::RateLimited {
                minutes: minutes_until_reset(decision.reset_time, now),
            });
        }
        debug!(remaining = decision.remaining, "rate check ok");

        self.delegate(clean).await
    }

    fn scan(&self, payload: &SubmissionPayload) -> Vec<ThreatKind> {
        let mut threats = self.detector.detect(&payload.name).threats;
        threats.extend(self.detector.detect_patterns(&payload.email).threats);
        threats.extend(self.detector.detect(&payload.message).threats);
        threats.sort();
        threats.dedup();
        threats
    }

    // Own task plus timeout: a panic or hang in the collaborator must still
    // end in a result.
    async fn delegate(&self, payload: SubmissionPayload) -> Result<(), SubmissionError> {
        let mailer = Arc::clone(&self.mailer);
        let mut task = tokio::spawn(async move { mailer.send(&payload).await });

        match timeout(self.send_timeout, &mut task).await {
            Ok(Ok(outcome)) if outcome.success => Ok(()),
            Ok(Ok(outcome)) => Err(SubmissionError::Delivery(
                outcome.error.unwrap_or_else(|| DELIVERY_FALLBACK.to_string()),
            )),
            Ok(Err(join_err)) => Err(SubmissionError::Internal {
                stage: SubmissionStage::Delegated,
                detail: format!("email task failed: {join_err}"),
            }),
            Err(_) => {
                task.abort();
                Err(SubmissionError::Internal {
                    stage: SubmissionStage::Delegated,
                    detail: format!("email send timed out after {:?}", self.send_timeout),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EmailOutcome;
    use async_trait::async_trait;
    use chrono::TimeDelta;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<SubmissionPayload>>,
    }

    #[async_trait]
    impl EmailSender for RecordingMailer {
        async fn send(&self, payload: &SubmissionPayload) -> EmailOutcome {
            self.sent.lock().unwrap().push(payload.clone());
            EmailOutcome::sent()
        }
    }

    struct FailingMailer(Option<&'static str>);

    #[async_trait]
    impl EmailSender for FailingMailer {
        async fn send(&self, _: &SubmissionPayload) -> EmailOutcome {
            EmailOutcome {
                success: false,
                error: self.0.map(str::to_string),
            }
        }
    }

    struct HangingMailer;

    #[async_trait]
    impl EmailSender for HangingMailer {
        async fn send(&self, _: &SubmissionPayload) -> EmailOutcome {
            std::future::pending::<()>().await;
            EmailOutcome::sent()
        }
    }

    struct PanickingMailer;

    #[async_trait]
    impl EmailSender for PanickingMailer {
        async fn send(&self, _: &SubmissionPayload) -> EmailOutcome {
            panic!("provider client blew up");
        }
    }

    fn service_with(mailer: Arc<dyn EmailSender>) -> ContactService {
        ContactService::new(
            DuplicateGuard::new(TimeDelta::seconds(60)),
            RateLimiter::contact_form(),
            mailer,
            Duration::from_millis(200),
        )
    }

    fn payload(message: &str) -> SubmissionPayload {
        SubmissionPayload {
            name: "Ada Lovelace".to_string(),
            email: "Ada@Example.com".to_string(),
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn valid_submission_is_delivered_sanitized() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service_with(mailer.clone());

        let result = service
            .submit(payload("Hello, I'd like to discuss a project."), "client")
            .await;
        assert_eq!(result, SubmissionResult::ok());

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].email, "ada@example.com");
        assert_eq!(sent[0].message, "Hello, I&#x27;d like to discuss a project.");
    }

    #[tokio::test]
    async fn schema_failure_touches_no_state() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service_with(mailer.clone());

        let short = SubmissionPayload {
            name: "Al".to_string(),
            email: "a@b.com".to_string(),
            message: "short".to_string(),
        };
        let err = service.process(short, "client").await.unwrap_err();
        assert!(matches!(err, SubmissionError::Validation(_)));
        assert_eq!(err.to_string(), "Message must be at least 10 characters");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        assert!(service.duplicates().is_empty());
        assert_eq!(service.limiter().tracked(), 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn malicious_input_gets_generic_message() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service_with(mailer.clone());

        let err = service
            .process(payload("<script>alert(1)</script> hello"), "client")
            .await
            .unwrap_err();
        assert!(matches!(&err, SubmissionError::Security(t) if t.contains(&ThreatKind::ScriptTag)));
        assert_eq!(err.to_string(), "Invalid input detected");
        assert_eq!(service.limiter().tracked(), 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fourth_submission_in_an_hour_is_rate_limited() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service_with(mailer.clone());

        for i in 1..=3 {
            let result = service
                .submit(payload(&format!("Project enquiry number {i}, please reply.")), "client")
                .await;
            assert!(result.success, "submission {i}: {result:?}");
        }

        let err = service
            .process(payload("Project enquiry number 4, please reply."), "client")
            .await
            .unwrap_err();
        match err {
            SubmissionError::RateLimited { minutes } => assert!(minutes > 0 && minutes <= 60),
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert_eq!(mailer.sent.lock().unwrap().len(), 3);

        // a different client still gets through
        let other = service
            .submit(payload("Project enquiry from someone else."), "other-client")
            .await;
        assert!(other.success);
    }

    #[tokio::test]
    async fn identical_message_within_window_is_duplicate() {
        let mailer = Arc::new(RecordingMailer::default());
        let service = service_with(mailer.clone());
        let body = "Hello, I'd like to discuss a project.";

        assert!(service.submit(payload(body), "client").await.success);
        let err = service.process(payload(body), "client").await.unwrap_err();
        assert!(matches!(err, SubmissionError::Duplicate));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);

        let decision = service.limiter().check("client").unwrap();
        assert!(decision.allowed, "rate limit was not the reason");
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delivery_failure_surfaces_collaborator_error() {
        let service = service_with(Arc::new(FailingMailer(Some("mailbox full"))));
        let result = service
            .submit(payload("Hello, I'd like to discuss a project."), "client")
            .await;
        assert_eq!(result, SubmissionResult::failed("mailbox full"));

        let service = service_with(Arc::new(FailingMailer(None)));
        let result = service
            .submit(payload("Hello, I'd like to discuss a project."), "client")
            .await;
        assert_eq!(result, SubmissionResult::failed(DELIVERY_FALLBACK));
    }

    #[tokio::test]
    async fn hung_collaborator_times_out_as_internal_error() {
        let service = service_with(Arc::new(HangingMailer));
        let err = service
            .process(payload("Hello, I'd like to discuss a project."), "client")
            .await
            .unwrap_err();
        assert!(matches!(err, SubmissionError::Internal { .. }));
        assert_eq!(err.stage(), SubmissionStage::Delegated);
        assert_eq!(
            err.to_string(),
            "An unexpected error occurred. Please try again later."
        );
    }

    #[tokio::test]
    async fn panicking_collaborator_is_contained() {
        let service = service_with(Arc::new(PanickingMailer));
        let result = service
            .submit(payload("Hello, I'd like to discuss a project."), "client")
            .await;
        assert_eq!(
            result,
            SubmissionResult::failed("An unexpected error occurred. Please try again later.")
        );
    }

    #[test]
    fn errors_report_stage_and_status() {
        let err = SubmissionError::RateLimited { minutes: 12 };
        assert_eq!(err.to_string(), "Too many submissions. Please try again in 12 minutes.");
        assert_eq!(err.stage(), SubmissionStage::DuplicateChecked);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.reason(), "rate_limited");

        let err = SubmissionError::from(StoreError::Poisoned);
        assert_eq!(err.stage(), SubmissionStage::DuplicateChecked);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.reason(), "internal");
    }
}
