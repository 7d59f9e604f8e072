use futures::future::BoxFuture;

use super::SubscriptionPayload;

/// Delivery failure for a single subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushDeliveryError {
    /// The push service reported the endpoint as gone (404/410).
    #[error("subscription endpoint is gone")]
    Gone,
    #[error("subscription payload is unusable: {0}")]
    InvalidSubscription(String),
    #[error("push delivery failed: {0}")]
    Failed(String),
}

impl PushDeliveryError {
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone)
    }
}

/// Transport that encrypts and posts one payload to one subscription.
pub trait PushGateway: Send + Sync {
    fn deliver<'a>(
        &'a self,
        subscription: &'a SubscriptionPayload,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), PushDeliveryError>>;
}
