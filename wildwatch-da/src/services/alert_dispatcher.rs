//! Alert fan-out
//!
//! Sends the same warning to every recipient concurrently, waits for every
//! delivery to settle and aggregates the results into a [`DispatchOutcome`].
//! A failed delivery never stops the others.

use crate::models::DispatchOutcome;
use crate::services::messaging_gateway::{DeliveryError, MessagingGateway};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// Rejected before any delivery was attempted
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub struct AlertDispatcher {
    gateway: Arc<dyn MessagingGateway>,
    delivery_timeout: Option<Duration>,
}

impl AlertDispatcher {
    pub fn new(gateway: Arc<dyn MessagingGateway>) -> Self {
        Self {
            gateway,
            delivery_timeout: None,
        }
    }

    /// Bound each delivery; an expired delivery counts as failed
    pub fn with_delivery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Check a dispatch request without contacting the gateway
    pub fn validate(message: &str, recipients: &[String]) -> Result<(), DispatchError> {
        if recipients.is_empty() {
            return Err(DispatchError::InvalidInput(
                "recipient list is empty".to_string(),
            ));
        }
        if message.trim().is_empty() {
            return Err(DispatchError::InvalidInput("message is blank".to_string()));
        }

        let mut seen = HashSet::new();
        for recipient in recipients {
            if recipient.trim().is_empty() {
                return Err(DispatchError::InvalidInput(
                    "recipient identifier is blank".to_string(),
                ));
            }
            if !seen.insert(recipient.as_str()) {
                return Err(DispatchError::InvalidInput(format!(
                    "duplicate recipient: {}",
                    recipient
                )));
            }
        }
        Ok(())
    }

    /// Deliver `message` to every recipient exactly once
    pub async fn dispatch(
        &self,
        message: &str,
        recipients: &[String],
    ) -> Result<DispatchOutcome, DispatchError> {
        Self::validate(message, recipients)?;

        info!(
            recipients = recipients.len(),
            gateway = self.gateway.name(),
            "Dispatching alert"
        );

        let deliveries = recipients.iter().map(|recipient| {
            let gateway = Arc::clone(&self.gateway);
            let timeout = self.delivery_timeout;
            async move {
                let result = match timeout {
                    Some(limit) => tokio::time::timeout(limit, gateway.send(recipient, message))
                        .await
                        .unwrap_or_else(|_| Err(DeliveryError::Timeout(limit.as_millis() as u64))),
                    None => gateway.send(recipient, message).await,
                };

                match &result {
                    Ok(()) => debug!(recipient = %recipient, "Alert delivered"),
                    Err(e) => warn!(recipient = %recipient, error = %e, "Alert delivery failed"),
                }

                (recipient.clone(), result.map_err(|e| e.to_string()))
            }
        });

        let results = join_all(deliveries).await;
        let outcome = DispatchOutcome::from_results(message, recipients.to_vec(), results);

        info!(
            succeeded = outcome.succeeded_count(),
            failed = outcome.failed_count(),
            overall_success = outcome.overall_success,
            "Alert dispatch complete"
        );

        Ok(outcome)
    }
}
