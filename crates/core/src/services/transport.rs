//! Web Push transport client.
//!
//! Wraps the `web-push` crate behind the [`PushTransport`] trait so the
//! delivery service can fan out without caring how a payload reaches a
//! push service, and so tests can run without network access. Transport
//! errors never cross this boundary as `Err`; every attempt resolves to
//! a [`SendOutcome`].

use async_trait::async_trait;
use web_push::{
    ContentEncoding, IsahcWebPushClient, PartialVapidSignatureBuilder, SubscriptionInfo,
    URL_SAFE_NO_PAD, VapidSignatureBuilder, WebPushClient, WebPushError, WebPushMessageBuilder,
};

use oddhay_common::{AppError, AppResult, PushConfig};
use oddhay_db::entities::push_subscription;

/// Seconds a push service may hold an undelivered message.
const MESSAGE_TTL_SECS: u32 = 86400;

/// Configuration for VAPID (Voluntary Application Server Identification).
#[derive(Debug, Clone)]
pub struct VapidConfig {
    /// Public key (base64 URL-safe encoded)
    pub public_key: String,
    /// Private key (base64 URL-safe encoded)
    pub private_key: String,
    /// Subject (typically a mailto: or https: URL)
    pub subject: String,
}

impl From<&PushConfig> for VapidConfig {
    fn from(config: &PushConfig) -> Self {
        Self {
            public_key: config.vapid_public_key.clone(),
            private_key: config.vapid_private_key.clone(),
            subject: config.vapid_subject.clone(),
        }
    }
}

/// Terminal outcome of one per-endpoint delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The push service accepted the message.
    Delivered,
    /// Delivery failed but the endpoint may recover (network error,
    /// server 5xx, oversized payload). The subscription stays active.
    Transient(String),
    /// The push service reported the endpoint gone (HTTP 404/410).
    /// The subscription must be deactivated.
    Permanent(String),
}

impl SendOutcome {
    /// Whether the attempt succeeded.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether the endpoint is known dead.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }
}

/// Trait for delivering an encrypted payload to one push endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Attempt delivery of `payload` to the subscription's endpoint.
    async fn deliver(&self, subscription: &push_subscription::Model, payload: &str) -> SendOutcome;
}

/// VAPID-signed Web Push transport.
#[derive(Clone)]
pub struct WebPushTransport {
    client: IsahcWebPushClient,
    signer: PartialVapidSignatureBuilder,
    subject: String,
}

impl WebPushTransport {
    /// Build a transport from VAPID credentials.
    ///
    /// The private key is parsed once here; an invalid key is a
    /// configuration error surfaced at startup, not at send time.
    pub fn new(config: &VapidConfig) -> AppResult<Self> {
        let signer =
            VapidSignatureBuilder::from_base64_no_sub(&config.private_key, URL_SAFE_NO_PAD)
                .map_err(|e| AppError::Config(format!("Invalid VAPID private key: {e}")))?;

        let client = IsahcWebPushClient::new()
            .map_err(|e| AppError::Config(format!("Failed to build Web Push client: {e}")))?;

        Ok(Self {
            client,
            signer,
            subject: config.subject.clone(),
        })
    }

    fn classify(err: &WebPushError) -> SendOutcome {
        match err {
            WebPushError::EndpointNotFound | WebPushError::EndpointNotValid => {
                SendOutcome::Permanent(err.to_string())
            }
            _ => SendOutcome::Transient(err.to_string()),
        }
    }
}

#[async_trait]
impl PushTransport for WebPushTransport {
    async fn deliver(&self, subscription: &push_subscription::Model, payload: &str) -> SendOutcome {
        let info = SubscriptionInfo::new(
            subscription.endpoint.clone(),
            subscription.p256dh.clone(),
            subscription.auth.clone(),
        );

        let mut sig_builder = self.signer.clone().add_sub_info(&info);
        sig_builder.add_claim("sub", self.subject.clone());
        let signature = match sig_builder.build() {
            Ok(signature) => signature,
            Err(e) => return SendOutcome::Transient(format!("VAPID signing failed: {e}")),
        };

        let mut builder = WebPushMessageBuilder::new(&info);
        builder.set_payload(ContentEncoding::Aes128Gcm, payload.as_bytes());
        builder.set_vapid_signature(signature);
        builder.set_ttl(MESSAGE_TTL_SECS);

        let message = match builder.build() {
            Ok(message) => message,
            Err(e) => return Self::classify(&e),
        };

        match self.client.send(message).await {
            Ok(()) => SendOutcome::Delivered,
            Err(e) => {
                tracing::debug!(
                    endpoint = %subscription.endpoint,
                    error = %e,
                    "Web push delivery attempt failed"
                );
                Self::classify(&e)
            }
        }
    }
}
