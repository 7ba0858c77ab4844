use std::path::PathBuf;

use anyhow::Context;
use chrono::TimeDelta;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use contact_gateway::client::ContactClient;
use contact_gateway::models::SubmissionPayload;
use contact_gateway::rate_limit::{CONTACT_LIMIT, FileStore, RateLimiter};

// Submit the contact form from the command line
#[derive(Parser, Debug)]
#[command(name = "contact-submit")]
#[command(about = "Send a contact form submission to a contact gateway")]
struct Args {
    // Gateway contact endpoint
    #[arg(long, env = "CONTACT_ENDPOINT", default_value = "http://localhost:8080/api/contact")]
    endpoint: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    #[arg(long)]
    message: String,

    // Where the form's rate limit state is kept between runs
    #[arg(long, default_value = ".contact-submit-state.json")]
    state_file: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = Args::parse();

    let store = FileStore::open(&args.state_file)
        .with_context(|| format!("opening {}", args.state_file.display()))?;
    let limiter = RateLimiter::with_store(store, CONTACT_LIMIT, TimeDelta::hours(1));
    let client = ContactClient::new(reqwest::Client::new(), args.endpoint, limiter);

    let payload = SubmissionPayload {
        name: args.name,
        email: args.email,
        message: args.message,
    };
    let result = client.submit(&payload).await?;

    if result.success {
        println!("Message sent. Thanks for getting in touch!");
        Ok(())
    } else {
        anyhow::bail!(result.error.unwrap_or_else(|| "submission failed".to_string()))
    }
}
