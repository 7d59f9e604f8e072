use futures::future::BoxFuture;
use tracing::debug;
use web_push::{
    ContentEncoding, IsahcWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo,
    VapidSignature, VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
    URL_SAFE_NO_PAD,
};

use super::gateway::{PushDeliveryError, PushGateway};
use super::SubscriptionPayload;
use crate::config::PushConfig;

/// Web Push transport signing every request with the configured VAPID key.
pub struct WebPushGateway {
    client: IsahcWebPushClient,
    signer: PartialVapidSignatureBuilder,
    subject: String,
}

impl WebPushGateway {
    /// Fails when the private key is not a base64url P-256 scalar, so a bad
    /// key disables the channel at startup instead of on every lead.
    pub fn new(config: &PushConfig) -> Result<Self, PushDeliveryError> {
        let signer = signer_from_base64(&config.vapid_private_key)?;
        let client = IsahcWebPushClient::new().map_err(|err| PushDeliveryError::Failed(err.to_string()))?;
        Ok(Self {
            client,
            signer,
            subject: format!("mailto:{}", config.contact_email),
        })
    }

    async fn send(
        &self,
        subscription: &SubscriptionPayload,
        payload: &[u8],
    ) -> Result<(), PushDeliveryError> {
        let info = SubscriptionInfo::new(
            subscription.endpoint.as_str(),
            subscription.p256dh.as_str(),
            subscription.auth.as_str(),
        );
        let signature = sign(&self.signer, &self.subject, &info)?;

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload);
        builder.set_vapid_signature(signature);
        let message = builder.build().map_err(classify)?;

        self.client.send(message).await.map_err(classify)?;
        debug!(endpoint = %subscription.endpoint, "push delivered");
        Ok(())
    }
}

impl PushGateway for WebPushGateway {
    fn deliver<'a>(
        &'a self,
        subscription: &'a SubscriptionPayload,
        payload: &'a [u8],
    ) -> BoxFuture<'a, Result<(), PushDeliveryError>> {
        Box::pin(self.send(subscription, payload))
    }
}

fn signer_from_base64(private_key: &str) -> Result<PartialVapidSignatureBuilder, PushDeliveryError> {
    VapidSignatureBuilder::from_base64_no_sub(private_key.trim(), URL_SAFE_NO_PAD).map_err(|err| {
        PushDeliveryError::Failed(format!("VAPID_PRIVATE_KEY is not a usable key: {err}"))
    })
}

fn sign(
    signer: &PartialVapidSignatureBuilder,
    subject: &str,
    info: &SubscriptionInfo,
) -> Result<VapidSignature, PushDeliveryError> {
    let mut builder = signer.clone().add_sub_info(info);
    builder.add_claim("sub", subject);
    builder.build().map_err(classify)
}

fn classify(err: WebPushError) -> PushDeliveryError {
    match err {
        WebPushError::EndpointNotValid | WebPushError::EndpointNotFound => PushDeliveryError::Gone,
        WebPushError::InvalidCryptoKeys
        | WebPushError::MissingCryptoKeys
        | WebPushError::InvalidUri => PushDeliveryError::InvalidSubscription(err.to_string()),
        other => PushDeliveryError::Failed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIVATE_KEY: &str = "IQ9Ur0ykXoHS9gzfYX0aBjy9lvdrjx_PFUXmie9YRcY";

    fn browser_subscription(endpoint: &str) -> SubscriptionInfo {
        SubscriptionInfo::new(
            endpoint,
            "BLMbF9ffKBiWQLCKvTHb6LO8Nb6dcUh6TItC455vu2kElga6PQvUmaFyCdykxY2nOSSL3yKgfbmFLRTUaGv4yV8",
            "xS03Fi5ErfTNH_l9WHE9Ig",
        )
    }

    #[test]
    fn signs_for_subscription_with_known_key() {
        let signer = signer_from_base64(PRIVATE_KEY).expect("key decodes");
        let info = browser_subscription("https://updates.push.services.mozilla.com/wpush/v1/abc");

        let signature = sign(&signer, "mailto:ops@example.com", &info).expect("signature builds");

        assert!(!signature.auth_t.is_empty());
        assert_eq!(signature.auth_k, signer.get_public_key());
        assert_eq!(signature.auth_k.len(), 65);
    }

    #[test]
    fn padded_or_garbage_keys_are_rejected() {
        assert!(signer_from_base64(&format!("  {PRIVATE_KEY}\n")).is_ok());
        assert!(matches!(
            signer_from_base64("not a key"),
            Err(PushDeliveryError::Failed(message)) if message.contains("VAPID_PRIVATE_KEY")
        ));
    }

    #[test]
    fn missing_and_expired_endpoints_are_gone() {
        assert_eq!(classify(WebPushError::EndpointNotValid), PushDeliveryError::Gone);
        assert_eq!(classify(WebPushError::EndpointNotFound), PushDeliveryError::Gone);
    }

    #[test]
    fn bad_keys_and_uris_mark_the_subscription_unusable() {
        for err in [
            WebPushError::InvalidCryptoKeys,
            WebPushError::MissingCryptoKeys,
            WebPushError::InvalidUri,
        ] {
            assert!(matches!(classify(err), PushDeliveryError::InvalidSubscription(_)));
        }
    }

    #[test]
    fn transient_failures_keep_the_subscription() {
        for err in [
            WebPushError::Unauthorized,
            WebPushError::ServerError(None),
            WebPushError::PayloadTooLarge,
            WebPushError::Other("timeout".to_string()),
        ] {
            let classified = classify(err);
            assert!(matches!(classified, PushDeliveryError::Failed(_)));
            assert!(!classified.is_gone());
        }
    }
}
