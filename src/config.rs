use std::time::Duration;

use chrono::TimeDelta;
use clap::Parser;

// CLI argument structure; every flag can also come from a CONTACT_* env var
#[derive(Parser, Debug, Clone)]
#[command(name = "contact-gateway")]
#[command(about = "Contact form submission gateway")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "CONTACT_PORT", default_value_t = 8080)]
    pub port: u16,

    // Contact submissions allowed per client per window
    #[arg(long, env = "CONTACT_LIMIT", default_value_t = 3)]
    pub contact_limit: u32,

    // Contact rate limit window in seconds
    #[arg(long, env = "CONTACT_WINDOW", default_value_t = 3600)]
    pub contact_window: u64,

    // Generic API requests allowed per client per window
    #[arg(long, env = "CONTACT_API_LIMIT", default_value_t = 30)]
    pub api_limit: u32,

    // API rate limit window in seconds
    #[arg(long, env = "CONTACT_API_WINDOW", default_value_t = 60)]
    pub api_window: u64,

    // Identical messages inside this many seconds are duplicates
    #[arg(long, env = "CONTACT_DUPLICATE_WINDOW", default_value_t = 60)]
    pub duplicate_window: u64,

    // How often expired rate limit windows are swept, in seconds
    #[arg(long, env = "CONTACT_SWEEP_INTERVAL", default_value_t = 60)]
    pub sweep_interval: u64,

    // Give up on the email provider after this many seconds
    #[arg(long, env = "CONTACT_SEND_TIMEOUT", default_value_t = 10)]
    pub send_timeout: u64,

    // Email provider send endpoint; messages are only logged when unset
    #[arg(long, env = "CONTACT_MAIL_API_URL")]
    pub mail_api_url: Option<String>,

    #[arg(long, env = "CONTACT_MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    #[arg(long, env = "CONTACT_MAIL_FROM", default_value = "contact@localhost")]
    pub mail_from: String,

    #[arg(long, env = "CONTACT_MAIL_TO", default_value = "owner@localhost")]
    pub mail_to: String,
}

impl Args {
    pub fn contact_window(&self) -> TimeDelta {
        seconds(self.contact_window)
    }

    pub fn api_window(&self) -> TimeDelta {
        seconds(self.api_window)
    }

    pub fn duplicate_window(&self) -> TimeDelta {
        seconds(self.duplicate_window)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout.max(1))
    }
}

fn seconds(secs: u64) -> TimeDelta {
    TimeDelta::try_seconds(i64::try_from(secs).unwrap_or(i64::MAX)).unwrap_or(TimeDelta::MAX)
}
