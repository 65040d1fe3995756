//! Retry-with-backoff decorator for the send-message port
//!
//! The runner never retries a failed node. Hosts that want delivery retries
//! wrap their channel client in `RetryingSender`; the whole retried call still
//! sits under the runner's per-call timeout.

use async_trait::async_trait;
use leadflow_core::{MessageSender, PortError, RetryConfig};
use tracing::{debug, warn};

pub struct RetryingSender<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: MessageSender> RetryingSender<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MessageSender> MessageSender for RetryingSender<S> {
    async fn send(&self, channel_id: &str, address: &str, text: &str) -> Result<(), PortError> {
        let mut attempt = 0;
        loop {
            match self.inner.send(channel_id, address, text).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt + 1 < self.config.max_attempts => {
                    let delay = self.config.delay_for(attempt);
                    warn!(
                        "Send on {} failed (attempt {}/{}): {}; retrying in {:?}",
                        channel_id,
                        attempt + 1,
                        self.config.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!("Send on {} giving up after {} attempt(s)", channel_id, attempt + 1);
                    return Err(e);
                }
            }
        }
    }
}
