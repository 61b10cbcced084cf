//! Clients for the systems checkout talks to.
//!
//! - `notifications` - Customer notifications (webhook or log)
//! - `gateway` - Payment gateway charge intents
//! - `signature` - HMAC verification of gateway callbacks

pub mod gateway;
pub mod notifications;
pub mod signature;

pub use gateway::{
    ChargeIntent, ChargeRequest, GatewayError, HttpGateway, OfflineGateway, PaymentGateway,
};
pub use notifications::{
    DeliveredCredential, LogNotifier, Notification, Notifier, NotifyError, WebhookNotifier,
    dispatch,
};
pub use signature::{CallbackVerifier, SIGNATURE_HEADER, SignatureError, TIMESTAMP_HEADER};
