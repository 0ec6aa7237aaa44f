use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::{RenderError, RetrievalError};
use crate::render::RenderSession;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub gate_timeout: Duration,
    pub marker_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            gate_timeout: Duration::from_secs(10),
            marker_timeout: Duration::from_secs(15),
        }
    }
}

/// Sleep before attempt `attempt + 1`, where `attempt` is 1-based.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// Drives one render session through gated, marker-checked page loads.
pub struct Retriever<S> {
    session: S,
    policy: RetryPolicy,
    unlocked: bool,
}

impl<S: RenderSession> Retriever<S> {
    pub fn new(session: S, policy: RetryPolicy) -> Self {
        Retriever { session, policy, unlocked: false }
    }

    pub fn into_session(self) -> S {
        self.session
    }

    /// Load `url` until the artifact link shows up, retrying with backoff.
    ///
    /// The gate is clicked on every attempt until the first successful fetch
    /// of the session; after that only the marker wait runs.
    pub async fn fetch_ready(&mut self, url: &str) -> Result<String, RetrievalError> {
        let max = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            info!(url, attempt, max_attempts = max, "Loading page");
            match self.attempt(url).await {
                Ok(markup) => {
                    if !self.unlocked {
                        self.unlocked = true;
                        info!("Session unlocked");
                    }
                    info!(url, attempt, "Artifact link present, page ready");
                    return Ok(markup);
                }
                Err(e) if attempt < max => {
                    let delay = backoff_delay(self.policy.backoff_base, attempt);
                    warn!(
                        url,
                        attempt,
                        max_attempts = max,
                        error = %e,
                        "Attempt failed, retrying in {:.1}s",
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(url, attempts = max, error = %e, "Max retries reached, giving up on URL");
                    return Err(RetrievalError::Exhausted {
                        url: url.to_string(),
                        attempts: max,
                        last: e,
                    });
                }
            }
        }
    }

    async fn attempt(&mut self, url: &str) -> Result<String, RenderError> {
        self.session.navigate(url).await?;
        if !self.unlocked {
            self.session.unlock(self.policy.gate_timeout).await?;
        }
        self.session.wait_for_marker(self.policy.marker_timeout).await?;
        self.session.page_source().await
    }
}
