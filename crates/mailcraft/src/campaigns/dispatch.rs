use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::campaigns::domain::{CampaignId, CustomerId};
use crate::config::DispatchConfig;

/// One recipient's fully-composed message, ready for the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMessage {
    /// Unique per `(campaign, customer)`; the provider deduplicates on it, so
    /// a worker retry can never double-send.
    pub idempotency_key: String,
    pub from: String,
    pub reply_to: Option<String>,
    pub to: String,
    pub subject: String,
    pub preheader: String,
    pub html: String,
    pub text: String,
}

/// Receipt returned by a successful provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub provider_message_id: String,
}

/// External delivery-provider "send message" contract.
pub trait MailProvider: Send + Sync {
    fn send(&self, message: &OutgoingMessage) -> Result<ProviderReceipt, ProviderSendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderSendError {
    /// Worth retrying: timeouts, throttling, 5xx responses.
    #[error("transient provider failure: {0}")]
    Transient(String),
    /// Permanent rejection of this message; retrying cannot help.
    #[error("provider rejected the message: {0}")]
    Rejected(String),
    /// Authentication/configuration failure affecting every recipient.
    #[error("provider authentication failed: {0}")]
    Auth(String),
}

/// Result of one recipient's dispatch attempt sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Delivered { provider_message_id: String },
    /// This recipient is done for: bounded retries exhausted or a permanent
    /// rejection. Never escalates to the campaign.
    Exhausted { error: String },
    /// Campaign-wide failure; the orchestrator stops dispatching entirely.
    Aborted { error: String },
}

/// Drives the provider call for a single recipient with bounded
/// retry-with-backoff. Contacts have no ordering dependency on one another.
pub struct ContactDispatcher {
    provider: Arc<dyn MailProvider>,
    max_attempts: u32,
    retry_base: Duration,
}

impl ContactDispatcher {
    pub fn new(provider: Arc<dyn MailProvider>, config: &DispatchConfig) -> Self {
        Self {
            provider,
            max_attempts: config.max_send_attempts.max(1),
            retry_base: config.retry_base,
        }
    }

    pub fn idempotency_key(campaign: &CampaignId, customer: &CustomerId) -> String {
        format!("{}:{}", campaign.0, customer.0)
    }

    pub fn dispatch(&self, message: &OutgoingMessage) -> DispatchOutcome {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.provider.send(message) {
                Ok(receipt) => {
                    return DispatchOutcome::Delivered {
                        provider_message_id: receipt.provider_message_id,
                    }
                }
                Err(ProviderSendError::Auth(error)) => {
                    return DispatchOutcome::Aborted { error };
                }
                Err(ProviderSendError::Rejected(error)) => {
                    return DispatchOutcome::Exhausted { error };
                }
                Err(ProviderSendError::Transient(error)) => {
                    if attempt >= self.max_attempts {
                        return DispatchOutcome::Exhausted { error };
                    }
                    warn!(
                        to = %message.to,
                        attempt,
                        %error,
                        "transient provider failure, retrying"
                    );
                    // Clamp the exponent: a large configured attempt budget
                    // must saturate the backoff, not overflow the shift.
                    let backoff = self.retry_base.saturating_mul(1 << (attempt - 1).min(31));
                    if !backoff.is_zero() {
                        std::thread::sleep(backoff);
                    }
                }
            }
        }
    }
}
