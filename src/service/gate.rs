use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::peripherals::http_client;
use super::retry::RetryPolicy;
use crate::constants::API_NAME;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    Open,
    Close,
}

impl GateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateAction::Open => "open",
            GateAction::Close => "close",
        }
    }
}

impl fmt::Display for GateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends open/close commands to the gate controller.
///
/// Every failure (non-200, timeout, refused connection) is retried the same
/// way until the policy runs out. The caller only ever sees a boolean.
#[derive(Debug, Clone)]
pub struct GateDispatcher {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl GateDispatcher {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        policy: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn send(&self, action: GateAction) -> bool {
        let url = format!("{}/gate", self.base_url);
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            let result = self
                .client
                .get(&url)
                .query(&[("action", action.as_str())])
                .send()
                .await;

            match result {
                Ok(resp) if resp.status() == StatusCode::OK => {
                    tracing::info!(
                        "{} Gate command sent: {} (attempt {}/{})",
                        API_NAME,
                        action,
                        attempt,
                        max_attempts
                    );
                    return true;
                }
                Ok(resp) => {
                    tracing::warn!(
                        "{} Gate command failed: HTTP {} (attempt {}/{})",
                        API_NAME,
                        resp.status().as_u16(),
                        attempt,
                        max_attempts
                    );
                }
                Err(e) if e.is_timeout() => {
                    tracing::warn!(
                        "{} Gate command timeout (attempt {}/{})",
                        API_NAME,
                        attempt,
                        max_attempts
                    );
                }
                Err(e) if e.is_connect() => {
                    tracing::warn!(
                        "{} Gate connection error (attempt {}/{}): {}",
                        API_NAME,
                        attempt,
                        max_attempts,
                        e
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "{} Gate command error (attempt {}/{}): {}",
                        API_NAME,
                        attempt,
                        max_attempts,
                        e
                    );
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.policy.delay_after(attempt)).await;
            }
        }

        tracing::error!(
            "{} Gate command '{}' failed after {} attempts",
            API_NAME,
            action,
            max_attempts
        );
        false
    }
}
