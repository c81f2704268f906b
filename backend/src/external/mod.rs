//! External API integrations

pub mod email;

pub use email::{EmailClient, SaleNotificationLine, SaleNotificationPayload};
