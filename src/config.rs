use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::task::KeyMode;

const DEFAULT_JOB_TIMEOUT_SECS: u64 = 900;
const DEFAULT_ERROR_DISPLAY_CAP: usize = 256;

/// Deployment configuration. Every secret is required at startup; a missing
/// value is a configuration error and the process refuses to serve.
#[derive(Debug, Clone)]
pub struct Config {
    pub auth_domain: String,
    pub auth_audience: String,
    pub transcription_api_key: String,
    pub llm_api_key: String,
    pub email_api_key: String,
    pub email_from: String,
    pub pipeline_url: String,
    pub key_mode: KeyMode,
    pub job_timeout: Duration,
    pub error_display_cap: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let key_mode = match optional("ADOC_KEY_MODE") {
            Some(raw) => raw.parse::<KeyMode>().map_err(|e| anyhow!(e))?,
            None => KeyMode::default(),
        };

        let job_timeout_secs = match optional("ADOC_JOB_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .map_err(|_| anyhow!("ADOC_JOB_TIMEOUT_SECS must be a number of seconds"))?,
            None => DEFAULT_JOB_TIMEOUT_SECS,
        };

        let error_display_cap = match optional("ADOC_ERROR_DISPLAY_CAP") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|_| anyhow!("ADOC_ERROR_DISPLAY_CAP must be a number of characters"))?,
            None => DEFAULT_ERROR_DISPLAY_CAP,
        };

        Ok(Self {
            auth_domain: required("ADOC_AUTH_DOMAIN")?,
            auth_audience: required("ADOC_AUTH_AUDIENCE")?,
            transcription_api_key: required("ADOC_TRANSCRIPTION_API_KEY")?,
            llm_api_key: required("ADOC_LLM_API_KEY")?,
            email_api_key: required("ADOC_EMAIL_API_KEY")?,
            email_from: required("ADOC_EMAIL_FROM")?,
            pipeline_url: required("ADOC_PIPELINE_URL")?,
            key_mode,
            job_timeout: Duration::from_secs(job_timeout_secs),
            error_display_cap,
        })
    }
}

fn required(name: &str) -> Result<String> {
    optional(name).ok_or_else(|| anyhow!("missing required environment variable {}", name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .or_else(|| dotenv::var(name).ok())
        .filter(|v| !v.is_empty())
}
