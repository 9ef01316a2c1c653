use shared_types::{origin_of, OutboundMessage};
use std::time::Duration;

/// Hard ceiling on sends per delivery, whatever the configured schedule says.
pub const MAX_DELIVERY_ATTEMPTS: usize = 3;
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Wildcard target, only used while the template origin is unknown.
pub const ANY_ORIGIN: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("Template frame is not available yet")]
    FrameUnavailable,
    #[error("Frame listener has been detached")]
    Detached,
}

/// Outbound half of the host ↔ template channel.
pub trait FrameChannel: Send + Sync {
    fn post_message(&self, message: &OutboundMessage, target_origin: &str) -> Result<(), ChannelError>;
}

/// Exact origin of the template deployment, or `*` if it cannot be resolved.
pub fn resolve_target_origin(template_base_url: &str) -> String {
    origin_of(template_base_url).unwrap_or_else(|| ANY_ORIGIN.to_string())
}

/// Bounded resend schedule: one send per delay, each delay waited before
/// its send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    delays: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(delays: Vec<Duration>) -> Self {
        let mut delays: Vec<Duration> = delays
            .into_iter()
            .take(MAX_DELIVERY_ATTEMPTS)
            .map(|d| d.min(MAX_DELAY))
            .collect();
        if delays.is_empty() {
            delays.push(Duration::ZERO);
        }
        Self { delays }
    }

    pub fn from_delays_ms(delays_ms: &[u64]) -> Self {
        Self::new(delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect())
    }

    pub fn immediate() -> Self {
        Self::new(vec![Duration::ZERO])
    }

    pub fn max_attempts(&self) -> usize {
        self.delays.len()
    }

    pub fn delays(&self) -> &[Duration] {
        &self.delays
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_delays_ms(&[0, 500, 1500])
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends `message` once per scheduled attempt. Failures are logged and do
/// not stop the schedule; a detached listener does.
pub async fn deliver_with_retry(
    channel: &dyn FrameChannel,
    message: &OutboundMessage,
    target_origin: &str,
    policy: &RetryPolicy,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();

    for (attempt, delay) in policy.delays().iter().enumerate() {
        if !delay.is_zero() {
            tokio::time::sleep(*delay).await;
        }

        match channel.post_message(message, target_origin) {
            Ok(()) => {
                report.sent += 1;
                tracing::debug!(
                    "Sent {} to {} (attempt {}/{})",
                    message.type_name(),
                    target_origin,
                    attempt + 1,
                    policy.max_attempts()
                );
            }
            Err(ChannelError::Detached) => {
                report.failed += 1;
                tracing::info!("Frame detached, stopping delivery of {}", message.type_name());
                break;
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    "Delivery attempt {}/{} of {} failed: {}",
                    attempt + 1,
                    policy.max_attempts(),
                    message.type_name(),
                    e
                );
            }
        }
    }

    report
}
