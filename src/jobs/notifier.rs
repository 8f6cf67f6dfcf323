/*!
 * Delivery of final job outcomes to caller-supplied callback URLs.
 *
 * Delivery is best-effort: failures are logged and never change job state.
 */

use async_trait::async_trait;
use log::{error, info, warn};
use reqwest::Client;
use std::fmt::Debug;
use std::time::Duration;

use super::models::CallbackPayload;

/// Sink for final job outcomes
#[async_trait]
pub trait JobNotifier: Send + Sync + Debug {
    /// Deliver `payload` to `url`; returns whether the receiver accepted it
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> bool;
}

/// Posts the payload as JSON over HTTP
#[derive(Debug, Clone)]
pub struct CallbackNotifier {
    client: Client,
}

impl CallbackNotifier {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl JobNotifier for CallbackNotifier {
    async fn notify(&self, url: &str, payload: &CallbackPayload) -> bool {
        if let Err(e) = url::Url::parse(url) {
            warn!("Skipping callback for job {}: invalid URL {}: {}", payload.session_id, url, e);
            return false;
        }

        info!("Sending callback for job {} to {}", payload.session_id, url);
        match self.client.post(url).json(payload).send().await {
            Ok(response) => {
                let status = response.status();
                info!("Callback sent to {}: {}", url, status);
                status.is_success()
            }
            Err(e) => {
                error!("Callback failed for job {}: {}", payload.session_id, e);
                false
            }
        }
    }
}
