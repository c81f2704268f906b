//! Stock ledger: the only code path that writes `productos.stock_actual`
//!
//! Every function takes the caller's open transaction. A product row must be
//! locked with [`lock_product`] or [`lock_products`] before its stock is
//! changed with [`record_change`], which writes the new stock and the matching
//! movement row together.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    MovementPurpose, MovementRow, Product, ProductRow, StockChange, StockMovement, PRODUCT_COLUMNS,
};

/// Describes the business event behind a stock change
#[derive(Debug, Clone)]
pub struct MovementEntry {
    pub purpose: MovementPurpose,
    pub user_id: Option<Uuid>,
    pub observation: String,
    pub pedido_id: Option<Uuid>,
    pub salida_id: Option<Uuid>,
}

impl MovementEntry {
    pub fn new(purpose: MovementPurpose, user_id: Uuid, observation: impl Into<String>) -> Self {
        Self {
            purpose,
            user_id: Some(user_id),
            observation: observation.into(),
            pedido_id: None,
            salida_id: None,
        }
    }

    pub fn for_pedido(mut self, pedido_id: Uuid) -> Self {
        self.pedido_id = Some(pedido_id);
        self
    }

    pub fn for_salida(mut self, salida_id: Uuid) -> Self {
        self.salida_id = Some(salida_id);
        self
    }
}

/// The receipt movement currently standing for a pedido
#[derive(Debug, Clone, Copy, sqlx::FromRow)]
pub struct ReceiptRecord {
    pub producto_id: Uuid,
    pub cantidad: i32,
}

/// Lock one product row for the rest of the transaction
pub async fn lock_product(conn: &mut PgConnection, product_id: Uuid) -> AppResult<Option<Product>> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {} FROM productos WHERE id = $1 FOR UPDATE",
        PRODUCT_COLUMNS
    ))
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(Product::from))
}

/// Lock several product rows in ascending id order
///
/// Ids that do not resolve are simply absent from the result.
pub async fn lock_products(conn: &mut PgConnection, product_ids: &[Uuid]) -> AppResult<Vec<Product>> {
    let mut ids = product_ids.to_vec();
    ids.sort();
    ids.dedup();

    let rows = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {} FROM productos WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        PRODUCT_COLUMNS
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Product::from).collect())
}

/// Apply a validated change to a locked product and append its movement
pub async fn record_change(
    conn: &mut PgConnection,
    product_id: Uuid,
    change: StockChange,
    entry: MovementEntry,
) -> AppResult<StockMovement> {
    if change.quantity() == 0 {
        return Err(AppError::Internal(format!(
            "Refusing to record an empty stock change for product {}",
            product_id
        )));
    }

    let updated = sqlx::query(
        r#"
        UPDATE productos
        SET stock_actual = $2, ultima_fecha_movimiento = NOW()
        WHERE id = $1 AND stock_actual = $3
        "#,
    )
    .bind(product_id)
    .bind(change.new)
    .bind(change.previous)
    .execute(&mut *conn)
    .await?;

    if updated.rows_affected() != 1 {
        return Err(AppError::Internal(format!(
            "Stock of product {} changed while locked",
            product_id
        )));
    }

    let row = sqlx::query_as::<_, MovementRow>(
        r#"
        WITH inserted AS (
            INSERT INTO movimientos_inv (
                producto_id, tipo, motivo, cantidad, stock_anterior, stock_nuevo,
                usuario_id, observacion, pedido_id, salida_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
        )
        SELECT i.id, i.producto_id, p.nombre AS producto_nombre, i.tipo, i.motivo, i.cantidad,
               i.stock_anterior, i.stock_nuevo, i.usuario_id, i.observacion, i.pedido_id,
               i.salida_id, i.created_at
        FROM inserted i
        JOIN productos p ON p.id = i.producto_id
        "#,
    )
    .bind(product_id)
    .bind(entry.purpose.kind().as_str())
    .bind(entry.purpose.as_str())
    .bind(change.quantity())
    .bind(change.previous)
    .bind(change.new)
    .bind(entry.user_id)
    .bind(&entry.observation)
    .bind(entry.pedido_id)
    .bind(entry.salida_id)
    .fetch_one(&mut *conn)
    .await?;

    tracing::debug!(
        product_id = %product_id,
        purpose = entry.purpose.as_str(),
        previous = change.previous,
        new = change.new,
        "Stock movement recorded"
    );

    StockMovement::try_from(row)
}

/// True when the pedido's latest ledger entry is an unreverted receipt
pub async fn receipt_applied(conn: &mut PgConnection, pedido_id: Uuid) -> AppResult<bool> {
    let latest = sqlx::query_scalar::<_, String>(
        r#"
        SELECT motivo FROM movimientos_inv
        WHERE pedido_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(pedido_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(latest.as_deref() == Some(MovementPurpose::PedidoRecibido.as_str()))
}

/// The most recent receipt recorded for a pedido
pub async fn last_receipt(conn: &mut PgConnection, pedido_id: Uuid) -> AppResult<Option<ReceiptRecord>> {
    let record = sqlx::query_as::<_, ReceiptRecord>(
        r#"
        SELECT producto_id, cantidad FROM movimientos_inv
        WHERE pedido_id = $1 AND motivo = $2
        ORDER BY created_at DESC, id DESC
        LIMIT 1
        "#,
    )
    .bind(pedido_id)
    .bind(MovementPurpose::PedidoRecibido.as_str())
    .fetch_optional(&mut *conn)
    .await?;

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_entry_links() {
        let user = Uuid::new_v4();
        let pedido = Uuid::new_v4();
        let entry = MovementEntry::new(MovementPurpose::PedidoRecibido, user, "Pedido recibido").for_pedido(pedido);
        assert_eq!(entry.pedido_id, Some(pedido));
        assert_eq!(entry.salida_id, None);
        assert_eq!(entry.user_id, Some(user));
    }
}
