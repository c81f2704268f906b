//! Purchase order (pedido) service
//!
//! Orders move between admin-configured states. Entering a received state
//! adds the requested quantity to stock, leaving it takes the received
//! quantity back out. Both happen in the same transaction as the state change.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{FromRow, PgConnection, PgPool};
use uuid::Uuid;
use validator::Validate;

use shared::validation::validate_cost_price;

use crate::error::{AppError, AppResult};
use crate::models::{
    active_state_names, derive_product_name, initial_stock_maximum, pick_default_state,
    plan_transition, receipt_observation, reversal_observation, LedgerAction, ModelRow,
    MovementPurpose, OrderChanges, OrderSnapshot, Product, PurchaseOrder, PurchaseOrderRow,
    StatusOption, StatusRow, StockChange, TransitionPlan,
};
use crate::services::ledger::{self, MovementEntry, ReceiptRecord};

/// Purchase order service
#[derive(Clone)]
pub struct PurchaseOrderService {
    db: PgPool,
}

/// Input for creating a pedido
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePurchaseOrderInput {
    #[validate(required(message = "supplierId is required"))]
    pub supplier_id: Option<Uuid>,
    #[validate(
        required(message = "cantidadSolicitada is required"),
        range(min = 1, message = "Requested quantity must be greater than zero")
    )]
    pub cantidad_solicitada: Option<i32>,
    #[validate(required(message = "productTypeId is required"))]
    pub product_type_id: Option<Uuid>,
    #[validate(required(message = "brandId is required"))]
    pub brand_id: Option<Uuid>,
    #[validate(required(message = "modelId is required"))]
    pub model_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    pub fecha_esperada: Option<NaiveDate>,
    pub cost_price: Option<Decimal>,
}

/// Input for updating a pedido, every field optional
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePurchaseOrderInput {
    pub estado: Option<String>,
    pub cantidad_solicitada: Option<i32>,
    pub fecha_esperada: Option<NaiveDate>,
    pub fecha_recibido: Option<NaiveDate>,
    pub cost_price: Option<Decimal>,
}

/// Filters for listing pedidos
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseOrderFilter {
    pub estado: Option<String>,
    pub supplier_id: Option<Uuid>,
}

/// What an order knows about its product, used to resolve or create it
#[derive(Debug, Clone, FromRow)]
pub struct OrderProductRef {
    pub id: Uuid,
    pub suplidor_id: Uuid,
    pub producto_id: Option<Uuid>,
    pub tipo_producto_id: Option<Uuid>,
    pub marca_id: Option<Uuid>,
    pub modelo_id: Option<Uuid>,
    pub nombre_producto: Option<String>,
}

/// Pedido row read under lock for an update
#[derive(Debug, Clone, FromRow)]
struct LockedOrderRow {
    id: Uuid,
    suplidor_id: Uuid,
    producto_id: Option<Uuid>,
    tipo_producto_id: Option<Uuid>,
    marca_id: Option<Uuid>,
    modelo_id: Option<Uuid>,
    nombre_producto: Option<String>,
    cantidad_solicitada: i32,
    fecha_recibido: Option<NaiveDate>,
    estado: String,
}

impl LockedOrderRow {
    fn product_ref(&self) -> OrderProductRef {
        OrderProductRef {
            id: self.id,
            suplidor_id: self.suplidor_id,
            producto_id: self.producto_id,
            tipo_producto_id: self.tipo_producto_id,
            marca_id: self.marca_id,
            modelo_id: self.modelo_id,
            nombre_producto: self.nombre_producto.clone(),
        }
    }
}

/// Held until commit, so concurrent creates for one supplier run the
/// duplicate check one after the other
const LOCK_SUPPLIER: &str = "SELECT id FROM suplidores WHERE id = $1 FOR NO KEY UPDATE";

const ORDER_VIEW: &str = r#"
    SELECT ps.id, ps.suplidor_id, s.nombre AS suplidor_nombre, ps.producto_id,
           COALESCE(p.nombre, ps.nombre_producto) AS producto_nombre,
           ps.tipo_producto_id, ps.marca_id, ma.nombre AS marca_nombre,
           ps.modelo_id, mo.nombre AS modelo_nombre,
           ps.cantidad_solicitada, ps.fecha_esperada, ps.fecha_recibido, ps.estado,
           ps.usuario_id, ps.precio_costo, ps.created_at
    FROM pedidos_suplidores ps
    JOIN suplidores s ON s.id = ps.suplidor_id
    LEFT JOIN productos p ON p.id = ps.producto_id
    LEFT JOIN marcas ma ON ma.id = ps.marca_id
    LEFT JOIN modelos mo ON mo.id = ps.modelo_id
"#;

impl PurchaseOrderService {
    /// Create a new PurchaseOrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a pedido in the default state
    pub async fn create(&self, user_id: Uuid, input: CreatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        input.validate()?;
        validate_cost_price(input.cost_price).map_err(|m| AppError::field("costPrice", m))?;

        // Presence is guaranteed by validate()
        let (Some(supplier_id), Some(quantity), Some(type_id), Some(brand_id), Some(model_id)) = (
            input.supplier_id,
            input.cantidad_solicitada,
            input.product_type_id,
            input.brand_id,
            input.model_id,
        ) else {
            return Err(AppError::validation("Missing required pedido fields"));
        };

        let mut tx = self.db.begin().await?;

        let supplier = sqlx::query_scalar::<_, Uuid>(LOCK_SUPPLIER)
            .bind(supplier_id)
            .fetch_optional(&mut *tx)
            .await?;
        if supplier.is_none() {
            return Err(AppError::field("supplierId", "Supplier does not exist"));
        }

        let states = load_states(&mut tx).await?;
        let default_state = pick_default_state(&states)
            .map(|s| s.name.clone())
            .ok_or_else(|| AppError::validation("No active default pedido state is configured"))?;

        let model = sqlx::query_as::<_, ModelRow>(
            r#"
            SELECT mo.id, mo.nombre, mo.marca_id, ma.nombre AS marca_nombre, mo.tipo_producto_id
            FROM modelos mo
            JOIN marcas ma ON ma.id = mo.marca_id
            WHERE mo.id = $1
            "#,
        )
        .bind(model_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::field("modelId", "Model does not exist"))?;

        if !model.to_model().belongs_to(brand_id, type_id) {
            return Err(AppError::field(
                "modelId",
                "Model does not belong to the given brand and product type",
            ));
        }

        let product_id = match input.product_id {
            Some(id) => {
                let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM productos WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;
                if !exists {
                    return Err(AppError::field("productId", "Product does not exist"));
                }
                Some(id)
            }
            None => find_classified_product(&mut tx, type_id, brand_id, model_id).await?,
        };

        let descriptor = product_id
            .is_none()
            .then(|| derive_product_name(Some(&model.marca_nombre), Some(&model.nombre)));

        let duplicate = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM pedidos_suplidores
                WHERE suplidor_id = $1
                  AND cantidad_solicitada = $2
                  AND fecha_esperada IS NOT DISTINCT FROM $3
                  AND estado = $4
                  AND producto_id IS NOT DISTINCT FROM $5
                  AND tipo_producto_id IS NOT DISTINCT FROM $6
                  AND marca_id IS NOT DISTINCT FROM $7
                  AND modelo_id IS NOT DISTINCT FROM $8
            )
            "#,
        )
        .bind(supplier_id)
        .bind(quantity)
        .bind(input.fecha_esperada)
        .bind(&default_state)
        .bind(product_id)
        .bind(type_id)
        .bind(brand_id)
        .bind(model_id)
        .fetch_one(&mut *tx)
        .await?;

        if duplicate {
            return Err(AppError::Conflict(
                "An identical pending pedido already exists for this supplier".to_string(),
            ));
        }

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO pedidos_suplidores (
                suplidor_id, producto_id, tipo_producto_id, marca_id, modelo_id, nombre_producto,
                cantidad_solicitada, fecha_esperada, estado, usuario_id, precio_costo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#,
        )
        .bind(supplier_id)
        .bind(product_id)
        .bind(type_id)
        .bind(brand_id)
        .bind(model_id)
        .bind(&descriptor)
        .bind(quantity)
        .bind(input.fecha_esperada)
        .bind(&default_state)
        .bind(user_id)
        .bind(input.cost_price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(pedido_id = %order_id, supplier_id = %supplier_id, quantity, "Pedido created");

        self.get(order_id).await
    }

    /// Update a pedido, applying or reverting stock when it enters or leaves
    /// a received state
    pub async fn update(
        &self,
        user_id: Uuid,
        order_id: Uuid,
        input: UpdatePurchaseOrderInput,
    ) -> AppResult<PurchaseOrder> {
        validate_cost_price(input.cost_price).map_err(|m| AppError::field("costPrice", m))?;

        let mut tx = self.db.begin().await?;

        let order = sqlx::query_as::<_, LockedOrderRow>(
            r#"
            SELECT id, suplidor_id, producto_id, tipo_producto_id, marca_id, modelo_id,
                   nombre_producto, cantidad_solicitada, fecha_recibido, estado
            FROM pedidos_suplidores
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found("Pedido"))?;

        let states = load_states(&mut tx).await?;
        let active = active_state_names(&states);

        let changes = OrderChanges {
            state: input.estado.clone(),
            quantity: input.cantidad_solicitada,
            received_date: input.fecha_recibido,
        };

        let applied = apply_transition(&mut *tx, user_id, &order, &changes, &active, Utc::now().date_naive()).await?;
        let plan = applied.plan;
        let linked_product = applied.product_id;

        sqlx::query(
            r#"
            UPDATE pedidos_suplidores
            SET estado = $2,
                cantidad_solicitada = $3,
                fecha_esperada = COALESCE($4, fecha_esperada),
                fecha_recibido = $5,
                precio_costo = COALESCE($6, precio_costo),
                producto_id = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order.id)
        .bind(&plan.state)
        .bind(plan.quantity)
        .bind(input.fecha_esperada)
        .bind(plan.received_date)
        .bind(input.cost_price)
        .bind(linked_product)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(
            pedido_id = %order.id,
            from = %order.estado,
            to = %plan.state,
            action = ?plan.action,
            "Pedido updated"
        );

        self.get(order.id).await
    }

    /// Find the product an order refers to, creating it on first receipt
    ///
    /// Reuses the linked product, then any product with the same type, brand
    /// and model. Otherwise inserts an empty product sized to the order.
    pub async fn resolve_or_create_product_for_order(
        conn: &mut PgConnection,
        order: &OrderProductRef,
        quantity: i32,
    ) -> AppResult<Uuid> {
        if let Some(product_id) = order.producto_id {
            return Ok(product_id);
        }

        if let (Some(type_id), Some(brand_id), Some(model_id)) =
            (order.tipo_producto_id, order.marca_id, order.modelo_id)
        {
            if let Some(existing) = find_classified_product(conn, type_id, brand_id, model_id).await? {
                return Ok(existing);
            }
        }

        let name = match order.nombre_producto.as_deref().map(str::trim) {
            Some(stored) if !stored.is_empty() => stored.to_string(),
            _ => {
                let brand = match order.marca_id {
                    Some(id) => sqlx::query_scalar::<_, String>("SELECT nombre FROM marcas WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *conn)
                        .await?,
                    None => None,
                };
                let model = match order.modelo_id {
                    Some(id) => sqlx::query_scalar::<_, String>("SELECT nombre FROM modelos WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&mut *conn)
                        .await?,
                    None => None,
                };
                derive_product_name(brand.as_deref(), model.as_deref())
            }
        };

        let product_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO productos (
                nombre, precio_tienda, precio_ruta, stock_actual, stock_minimo, stock_maximo,
                disponible, suplidor_id, tipo_producto_id, marca_id, modelo_id
            )
            VALUES ($1, 0, 0, 0, 0, $2, TRUE, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&name)
        .bind(initial_stock_maximum(quantity))
        .bind(order.suplidor_id)
        .bind(order.tipo_producto_id)
        .bind(order.marca_id)
        .bind(order.modelo_id)
        .fetch_one(&mut *conn)
        .await?;

        tracing::info!(pedido_id = %order.id, product_id = %product_id, name = %name, "Product created for pedido");

        Ok(product_id)
    }

    /// Get a pedido by id
    pub async fn get(&self, order_id: Uuid) -> AppResult<PurchaseOrder> {
        let row = sqlx::query_as::<_, PurchaseOrderRow>(&format!("{} WHERE ps.id = $1", ORDER_VIEW))
            .bind(order_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::not_found("Pedido"))?;

        Ok(row.into())
    }

    /// List pedidos, newest first
    pub async fn list(&self, filter: PurchaseOrderFilter) -> AppResult<Vec<PurchaseOrder>> {
        let estado = filter.estado.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        let rows = sqlx::query_as::<_, PurchaseOrderRow>(&format!(
            r#"{}
            WHERE ($1::text IS NULL OR LOWER(ps.estado) = LOWER($1))
              AND ($2::uuid IS NULL OR ps.suplidor_id = $2)
            ORDER BY ps.created_at DESC
            "#,
            ORDER_VIEW
        ))
        .bind(estado)
        .bind(filter.supplier_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(PurchaseOrder::from).collect())
    }
}

/// Stock operations a pedido transition needs from its transaction
#[axum::async_trait]
pub trait OrderLedger: Send {
    async fn receipt_applied(&mut self, pedido_id: Uuid) -> AppResult<bool>;

    async fn last_receipt(&mut self, pedido_id: Uuid) -> AppResult<Option<ReceiptRecord>>;

    /// Product a receipt goes into, created when nothing matches
    async fn receiving_product(&mut self, order: &OrderProductRef, quantity: i32) -> AppResult<Uuid>;

    async fn lock_product(&mut self, product_id: Uuid) -> AppResult<Option<Product>>;

    async fn record_change(&mut self, product_id: Uuid, change: StockChange, entry: MovementEntry) -> AppResult<()>;
}

#[axum::async_trait]
impl OrderLedger for PgConnection {
    async fn receipt_applied(&mut self, pedido_id: Uuid) -> AppResult<bool> {
        ledger::receipt_applied(self, pedido_id).await
    }

    async fn last_receipt(&mut self, pedido_id: Uuid) -> AppResult<Option<ReceiptRecord>> {
        ledger::last_receipt(self, pedido_id).await
    }

    async fn receiving_product(&mut self, order: &OrderProductRef, quantity: i32) -> AppResult<Uuid> {
        PurchaseOrderService::resolve_or_create_product_for_order(self, order, quantity).await
    }

    async fn lock_product(&mut self, product_id: Uuid) -> AppResult<Option<Product>> {
        ledger::lock_product(self, product_id).await
    }

    async fn record_change(&mut self, product_id: Uuid, change: StockChange, entry: MovementEntry) -> AppResult<()> {
        ledger::record_change(self, product_id, change, entry).await.map(|_| ())
    }
}

/// A planned transition and the product its receipt went into
#[derive(Debug)]
struct AppliedTransition {
    plan: TransitionPlan,
    product_id: Option<Uuid>,
}

/// Plan a pedido update and write its stock effect, if any
async fn apply_transition<L: OrderLedger + ?Sized>(
    ledger: &mut L,
    user_id: Uuid,
    order: &LockedOrderRow,
    changes: &OrderChanges,
    active_states: &[String],
    today: NaiveDate,
) -> AppResult<AppliedTransition> {
    let snapshot = OrderSnapshot {
        state: order.estado.clone(),
        quantity: order.cantidad_solicitada,
        received_date: order.fecha_recibido,
        receipt_on_ledger: ledger.receipt_applied(order.id).await?,
    };

    let plan = plan_transition(&snapshot, changes, active_states, today)?;
    let mut product_id = order.producto_id;

    match plan.action {
        LedgerAction::Apply => {
            let receiving = ledger.receiving_product(&order.product_ref(), plan.quantity).await?;
            let product = ledger
                .lock_product(receiving)
                .await?
                .ok_or_else(|| AppError::not_found("Producto"))?;

            let change = StockChange::increase(product.stock_actual, plan.quantity, product.stock_maximo)?;
            let entry = MovementEntry::new(MovementPurpose::PedidoRecibido, user_id, receipt_observation(order.id))
                .for_pedido(order.id);
            ledger.record_change(receiving, change, entry).await?;

            product_id = Some(receiving);
        }
        LedgerAction::Revert => {
            let receipt = ledger.last_receipt(order.id).await?.ok_or_else(|| {
                AppError::Internal(format!("Pedido {} has no receipt movement to revert", order.id))
            })?;
            let product = ledger
                .lock_product(receipt.producto_id)
                .await?
                .ok_or_else(|| AppError::not_found("Producto"))?;

            let change = StockChange::decrease(product.stock_actual, receipt.cantidad).map_err(|_| {
                AppError::InsufficientStock(format!(
                    "Cannot revert pedido: '{}' has {} units but {} were received",
                    product.name, product.stock_actual, receipt.cantidad
                ))
            })?;
            let entry = MovementEntry::new(MovementPurpose::PedidoRevertido, user_id, reversal_observation(order.id))
                .for_pedido(order.id);
            ledger.record_change(product.id, change, entry).await?;
        }
        LedgerAction::Nothing => {}
    }

    Ok(AppliedTransition { plan, product_id })
}

async fn load_states(conn: &mut PgConnection) -> AppResult<Vec<StatusOption>> {
    let rows = sqlx::query_as::<_, StatusRow>(
        "SELECT id, nombre, activo, es_default FROM estados_pedido ORDER BY orden, nombre",
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(StatusOption::from).collect())
}

async fn find_classified_product(
    conn: &mut PgConnection,
    type_id: Uuid,
    brand_id: Uuid,
    model_id: Uuid,
) -> AppResult<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM productos
        WHERE tipo_producto_id = $1 AND marca_id = $2 AND modelo_id = $3
        ORDER BY created_at
        LIMIT 1
        "#,
    )
    .bind(type_id)
    .bind(brand_id)
    .bind(model_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_input_requires_fields() {
        let input: CreatePurchaseOrderInput = serde_json::from_str(r#"{"cantidadSolicitada": 5}"#).unwrap();
        let err: AppError = input.validate().unwrap_err().into();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[test]
    fn test_create_input_rejects_zero_quantity() {
        let input: CreatePurchaseOrderInput = serde_json::from_value(serde_json::json!({
            "supplierId": Uuid::new_v4(),
            "cantidadSolicitada": 0,
            "productTypeId": Uuid::new_v4(),
            "brandId": Uuid::new_v4(),
            "modelId": Uuid::new_v4(),
        }))
        .unwrap();
        match AppError::from(input.validate().unwrap_err()) {
            AppError::Validation { field, .. } => assert_eq!(field, "cantidad_solicitada"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_create_serializes_on_supplier_row() {
        assert!(LOCK_SUPPLIER.contains("FROM suplidores"));
        assert!(LOCK_SUPPLIER.ends_with("FOR NO KEY UPDATE"));
    }

    #[test]
    fn test_update_input_accepts_partial_body() {
        let input: UpdatePurchaseOrderInput = serde_json::from_str(r#"{"estado": "Recibido"}"#).unwrap();
        assert_eq!(input.estado.as_deref(), Some("Recibido"));
        assert!(input.cantidad_solicitada.is_none());
    }
}
