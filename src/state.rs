use std::sync::Arc;

use crate::config::Args;
use crate::contact::ContactService;
use crate::duplicate::DuplicateGuard;
use crate::mailer::{EmailSender, HttpMailer, LogMailer};
use crate::rate_limit::RateLimiter;

// app's shared state
pub struct AppState {
    pub contact: ContactService,
    pub api_limiter: RateLimiter,
}

impl AppState {
    /// Build state from CLI args, picking the HTTP mailer when a provider URL is set.
    pub fn from_args(args: &Args) -> Self {
        let mailer: Arc<dyn EmailSender> = match &args.mail_api_url {
            Some(url) => Arc::new(HttpMailer::new(
                reqwest::Client::new(),
                url.clone(),
                args.mail_api_key.clone(),
                args.mail_from.clone(),
                args.mail_to.clone(),
            )),
            None => Arc::new(LogMailer),
        };
        Self::with_mailer(args, mailer)
    }

    pub fn with_mailer(args: &Args, mailer: Arc<dyn EmailSender>) -> Self {
        let contact = ContactService::new(
            DuplicateGuard::new(args.duplicate_window()),
            RateLimiter::in_memory(args.contact_limit, args.contact_window()),
            mailer,
            args.send_timeout(),
        );
        Self {
            contact,
            api_limiter: RateLimiter::in_memory(args.api_limit, args.api_window()),
        }
    }

    /// Live rate limit windows across both limiters.
    pub fn tracked_windows(&self) -> usize {
        self.contact.limiter().tracked() + self.api_limiter.tracked()
    }
}
