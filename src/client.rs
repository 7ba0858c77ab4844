//! Form-side submitter used by `contact-submit`.
//!
//! Mirrors what the site's contact form does before it ever talks to the
//! gateway: run the shared schema, then consult a persisted per-form rate
//! limit so reloading the page (or re-running the tool) does not reset it.

use chrono::Utc;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{SubmissionPayload, SubmissionResult};
use crate::rate_limit::{
    CONTACT_FORM_KEY, FileStore, RateLimitStore, RateLimiter, StoreError, minutes_until_reset,
};
use crate::validation::validate;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not reach the contact gateway: {0}")]
    Http(#[from] reqwest::Error),

    #[error("contact gateway answered {status} without a result body")]
    UnexpectedResponse { status: StatusCode },
}

pub struct ContactClient<S = FileStore> {
    http: reqwest::Client,
    endpoint: String,
    limiter: RateLimiter<S>,
}

impl<S: RateLimitStore> ContactClient<S> {
    pub fn new(http: reqwest::Client, endpoint: impl Into<String>, limiter: RateLimiter<S>) -> Self {
        Self {
            http,
            endpoint: endpoint.into(),
            limiter,
        }
    }

    pub fn limiter(&self) -> &RateLimiter<S> {
        &self.limiter
    }

    /// Validate locally, spend one slot of the form's limit, then post.
    /// Local rejections come back as failed results, like server ones.
    pub async fn submit(&self, payload: &SubmissionPayload) -> Result<SubmissionResult, ClientError> {
        if let Err(errors) = validate(payload) {
            return Ok(SubmissionResult::failed(errors.to_string()));
        }

        let now = Utc::now();
        let decision = self.limiter.check_at(CONTACT_FORM_KEY, now)?;
        if !decision.allowed {
            let minutes = minutes_until_reset(decision.reset_time, now);
            warn!(minutes, "contact form limit reached locally");
            return Ok(SubmissionResult::failed(format!(
                "Too many submissions. Please try again in {minutes} minutes."
            )));
        }
        debug!(remaining = decision.remaining, "posting contact form");

        let res = self.http.post(&self.endpoint).json(payload).send().await?;
        let status = res.status();
        match res.json::<SubmissionResult>().await {
            Ok(result) => Ok(result),
            Err(_) => Err(ClientError::UnexpectedResponse { status }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(message: &str) -> SubmissionPayload {
        SubmissionPayload {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            message: message.to_string(),
        }
    }

    fn client(server: &MockServer, state: &std::path::Path) -> ContactClient {
        let store = FileStore::open(state).unwrap();
        ContactClient::new(
            reqwest::Client::new(),
            format!("{}/api/contact", server.uri()),
            RateLimiter::with_store(store, 3, TimeDelta::hours(1)),
        )
    }

    #[tokio::test]
    async fn fourth_submission_is_stopped_before_the_network() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contact"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(3)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let state = dir.path().join("form.json");
        let form = client(&server, &state);

        for i in 1..=3 {
            let result = form.submit(&payload(&format!("Enquiry number {i} about work"))).await.unwrap();
            assert!(result.success);
        }

        // a fresh client on the same state file inherits the window
        let reloaded = client(&server, &state);
        let result = reloaded.submit(&payload("Enquiry number 4 about work")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("Too many submissions"));
    }

    #[tokio::test]
    async fn invalid_payload_never_spends_the_limit() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let form = client(&server, &dir.path().join("form.json"));

        let result = form.submit(&payload("short")).await.unwrap();
        assert_eq!(
            result,
            SubmissionResult::failed("Message must be at least 10 characters")
        );
        assert!(form.limiter().store().is_empty());
    }

    #[tokio::test]
    async fn server_rejections_are_passed_through() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "success": false,
                "error": "This message has already been submitted. Please wait before sending it again.",
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let form = client(&server, &dir.path().join("form.json"));
        let result = form.submit(&payload("Hello, I'd like to discuss a project.")).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("already been submitted"));
    }

    #[tokio::test]
    async fn non_json_reply_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let form = client(&server, &dir.path().join("form.json"));
        let err = form
            .submit(&payload("Hello, I'd like to discuss a project."))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedResponse { status } if status == StatusCode::BAD_GATEWAY));
    }
}
