//! Outbound email client
//!
//! Posts JSON messages to an HTTP mail delivery API configured under
//! `email` in the application config.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::EmailConfig;

/// Mail API client
#[derive(Clone)]
pub struct EmailClient {
    http_client: Client,
    api_endpoint: String,
    api_key: String,
    from_address: String,
}

/// Everything the sale notification email shows
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleNotificationPayload {
    pub recipients: Vec<String>,
    pub ticket: String,
    pub seller_name: String,
    pub channel: String,
    pub payment_type: String,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<SaleNotificationLine>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleNotificationLine {
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

/// Request body accepted by the mail API
#[derive(Debug, Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a [String],
    subject: String,
    text: String,
}

impl EmailClient {
    /// Create a client from the email config section
    pub fn new(config: &EmailConfig) -> Self {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            http_client,
            api_endpoint: config.api_endpoint.clone(),
            api_key: config.api_key.clone(),
            from_address: config.from_address.clone(),
        }
    }

    /// Send the new-sale email, returning whether the API accepted it
    pub async fn send_sale_notification(&self, payload: &SaleNotificationPayload) -> bool {
        if payload.recipients.is_empty() {
            return false;
        }

        let request = MailRequest {
            from: &self.from_address,
            to: &payload.recipients,
            subject: sale_subject(payload),
            text: sale_body(payload),
        };

        let result = self
            .http_client
            .post(&self.api_endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                tracing::warn!(ticket = %payload.ticket, status = %response.status(), "Mail API rejected sale notification");
                false
            }
            Err(e) => {
                tracing::warn!(ticket = %payload.ticket, "Mail API request failed: {}", e);
                false
            }
        }
    }
}

fn sale_subject(payload: &SaleNotificationPayload) -> String {
    format!("Nueva salida {} - total {}", payload.ticket, payload.total)
}

fn sale_body(payload: &SaleNotificationPayload) -> String {
    let mut body = format!(
        "Ticket: {}\nVendedor: {}\nTipo de salida: {}\nTipo de venta: {}\nFecha: {}\n\n",
        payload.ticket,
        payload.seller_name,
        payload.channel,
        payload.payment_type,
        payload.created_at.format("%Y-%m-%d %H:%M")
    );
    for line in &payload.lines {
        body.push_str(&format!(
            "- {} x{} @ {} = {}\n",
            line.product_name, line.quantity, line.unit_price, line.subtotal
        ));
    }
    body.push_str(&format!("\nTotal: {}\n", payload.total));
    body
}
