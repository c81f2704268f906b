//! Notification service
//!
//! Tells administrators about new sales by email. Delivery runs in a spawned
//! task after the sale has committed; failures are logged and never reach
//! the caller.

use sqlx::PgPool;

use crate::error::AppResult;
use crate::external::{EmailClient, SaleNotificationLine, SaleNotificationPayload};
use crate::models::{roles, Sale};

/// Notification service for sale alerts
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    email_client: Option<EmailClient>,
}

impl NotificationService {
    /// Create a new NotificationService instance
    pub fn new(db: PgPool, email_client: Option<EmailClient>) -> Self {
        Self { db, email_client }
    }

    /// Fire-and-forget email about a committed sale
    pub fn notify_sale(&self, sale: &Sale) {
        let Some(client) = self.email_client.clone() else {
            tracing::debug!(ticket = %sale.ticket, "Email not configured, skipping sale notification");
            return;
        };

        let service = self.clone();
        let payload = sale_payload(sale, Vec::new());
        let ticket = sale.ticket.clone();

        tokio::spawn(async move {
            match service.deliver(&client, payload).await {
                Ok(true) => tracing::info!(ticket = %ticket, "Sale notification sent"),
                Ok(false) => tracing::warn!(ticket = %ticket, "Sale notification was not delivered"),
                Err(e) => tracing::error!(ticket = %ticket, "Failed to send sale notification: {}", e),
            }
        });
    }

    async fn deliver(&self, client: &EmailClient, mut payload: SaleNotificationPayload) -> AppResult<bool> {
        payload.recipients = self.admin_recipients().await?;
        if payload.recipients.is_empty() {
            tracing::warn!(ticket = %payload.ticket, "No active administrators to notify");
            return Ok(false);
        }
        Ok(client.send_sale_notification(&payload).await)
    }

    /// Email addresses of all active administrators
    pub async fn admin_recipients(&self) -> AppResult<Vec<String>> {
        let emails = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.email
            FROM usuarios u
            JOIN roles r ON r.id = u.rol_id
            WHERE u.activo AND LOWER(r.nombre) = $1
            ORDER BY u.email
            "#,
        )
        .bind(roles::ADMIN)
        .fetch_all(&self.db)
        .await?;

        Ok(emails)
    }
}

/// Build the email payload for a sale
pub fn sale_payload(sale: &Sale, recipients: Vec<String>) -> SaleNotificationPayload {
    SaleNotificationPayload {
        recipients,
        ticket: sale.ticket.clone(),
        seller_name: sale.seller_name.clone().unwrap_or_else(|| sale.seller_id.to_string()),
        channel: sale.channel.as_str().to_string(),
        payment_type: sale.payment_type.as_str().to_string(),
        total: sale.total,
        created_at: sale.created_at,
        lines: sale
            .detalles
            .iter()
            .map(|line| SaleNotificationLine {
                product_name: line.product_name.clone(),
                quantity: line.cantidad,
                unit_price: line.precio_unitario,
                subtotal: line.subtotal,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PaymentType, SaleChannel, SaleLine};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_sale_payload_falls_back_to_seller_id() {
        let seller = Uuid::new_v4();
        let sale = Sale {
            id: Uuid::new_v4(),
            ticket: "TK-20240601120000-0001".into(),
            seller_id: seller,
            seller_name: None,
            channel: SaleChannel::Tienda,
            payment_type: PaymentType::Credito,
            estado: "Pendiente".into(),
            fecha_entrega: None,
            total: Decimal::from(20),
            created_at: Utc::now(),
            detalles: vec![SaleLine {
                id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                product_name: "Filtro".into(),
                cantidad: 2,
                precio_unitario: Decimal::from(10),
                subtotal: Decimal::from(20),
            }],
        };

        let payload = sale_payload(&sale, vec![]);
        assert_eq!(payload.seller_name, seller.to_string());
        assert_eq!(payload.channel, "tienda");
        assert_eq!(payload.payment_type, "credito");
        assert_eq!(payload.lines.len(), 1);
    }
}
