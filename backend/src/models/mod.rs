//! Database models for the Inventory Management backend
//!
//! Re-exports models from the shared crate and adds the typed row structs
//! read at the persistence boundary. Rows are converted into shared models
//! before they leave the service layer.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;
use uuid::Uuid;

pub use shared::models::*;

use crate::error::{AppError, AppResult};

/// Row of `productos`
#[derive(Debug, Clone, FromRow)]
pub struct ProductRow {
    pub id: Uuid,
    pub nombre: String,
    pub descripcion: Option<String>,
    pub precio_tienda: Decimal,
    pub precio_ruta: Decimal,
    pub stock_actual: i32,
    pub stock_minimo: i32,
    pub stock_maximo: i32,
    pub disponible: bool,
    pub motivo_no_disponible: Option<String>,
    pub suplidor_id: Option<Uuid>,
    pub tipo_producto_id: Option<Uuid>,
    pub marca_id: Option<Uuid>,
    pub modelo_id: Option<Uuid>,
    pub ultima_fecha_movimiento: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Column list matching [`ProductRow`]
pub const PRODUCT_COLUMNS: &str = "id, nombre, descripcion, precio_tienda, precio_ruta, stock_actual, \
     stock_minimo, stock_maximo, disponible, motivo_no_disponible, suplidor_id, tipo_producto_id, \
     marca_id, modelo_id, ultima_fecha_movimiento, created_at";

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.nombre,
            description: row.descripcion,
            store_price: row.precio_tienda,
            route_price: row.precio_ruta,
            stock_actual: row.stock_actual,
            stock_minimo: row.stock_minimo,
            stock_maximo: row.stock_maximo,
            available: row.disponible,
            unavailable_reason: row.motivo_no_disponible,
            supplier_id: row.suplidor_id,
            product_type_id: row.tipo_producto_id,
            brand_id: row.marca_id,
            model_id: row.modelo_id,
            ultima_fecha_movimiento: row.ultima_fecha_movimiento,
            created_at: row.created_at,
        }
    }
}

/// Row of `movimientos_inv` joined with the product name
#[derive(Debug, Clone, FromRow)]
pub struct MovementRow {
    pub id: Uuid,
    pub producto_id: Uuid,
    pub producto_nombre: Option<String>,
    pub tipo: String,
    pub motivo: String,
    pub cantidad: i32,
    pub stock_anterior: i32,
    pub stock_nuevo: i32,
    pub usuario_id: Option<Uuid>,
    pub observacion: Option<String>,
    pub pedido_id: Option<Uuid>,
    pub salida_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        let kind = MovementKind::parse(&row.tipo)
            .ok_or_else(|| AppError::Internal(format!("Unknown movement kind '{}'", row.tipo)))?;
        let purpose = MovementPurpose::parse(&row.motivo)
            .ok_or_else(|| AppError::Internal(format!("Unknown movement purpose '{}'", row.motivo)))?;

        Ok(StockMovement {
            id: row.id,
            product_id: row.producto_id,
            product_name: row.producto_nombre,
            kind,
            purpose,
            quantity: row.cantidad,
            stock_anterior: row.stock_anterior,
            stock_nuevo: row.stock_nuevo,
            user_id: row.usuario_id,
            observation: row.observacion,
            pedido_id: row.pedido_id,
            salida_id: row.salida_id,
            created_at: row.created_at,
        })
    }
}

/// Row of the pedido read view
#[derive(Debug, Clone, FromRow)]
pub struct PurchaseOrderRow {
    pub id: Uuid,
    pub suplidor_id: Uuid,
    pub suplidor_nombre: Option<String>,
    pub producto_id: Option<Uuid>,
    pub producto_nombre: Option<String>,
    pub tipo_producto_id: Option<Uuid>,
    pub marca_id: Option<Uuid>,
    pub marca_nombre: Option<String>,
    pub modelo_id: Option<Uuid>,
    pub modelo_nombre: Option<String>,
    pub cantidad_solicitada: i32,
    pub fecha_esperada: Option<NaiveDate>,
    pub fecha_recibido: Option<NaiveDate>,
    pub estado: String,
    pub usuario_id: Option<Uuid>,
    pub precio_costo: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl From<PurchaseOrderRow> for PurchaseOrder {
    fn from(row: PurchaseOrderRow) -> Self {
        let status = OrderStatus::classify(&row.estado);
        PurchaseOrder {
            id: row.id,
            supplier_id: row.suplidor_id,
            supplier_name: row.suplidor_nombre,
            product_id: row.producto_id,
            product_name: row.producto_nombre,
            product_type_id: row.tipo_producto_id,
            brand_id: row.marca_id,
            model_id: row.modelo_id,
            brand_name: row.marca_nombre,
            model_name: row.modelo_nombre,
            cantidad_solicitada: row.cantidad_solicitada,
            fecha_esperada: row.fecha_esperada,
            fecha_recibido: row.fecha_recibido,
            estado: row.estado,
            status,
            requested_by: row.usuario_id,
            cost_price: row.precio_costo,
            created_at: row.created_at,
        }
    }
}

/// Header row of the salida read view
#[derive(Debug, Clone, FromRow)]
pub struct SaleRow {
    pub id: Uuid,
    pub ticket: String,
    pub vendedor_id: Uuid,
    pub vendedor_nombre: Option<String>,
    pub tipo_salida: String,
    pub tipo_venta: String,
    pub estado: String,
    pub fecha_entrega: Option<NaiveDate>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl SaleRow {
    pub fn into_sale(self, detalles: Vec<SaleLine>) -> AppResult<Sale> {
        let channel = SaleChannel::parse(&self.tipo_salida)
            .ok_or_else(|| AppError::Internal(format!("Unknown sale channel '{}'", self.tipo_salida)))?;
        let payment_type = PaymentType::parse(&self.tipo_venta)
            .ok_or_else(|| AppError::Internal(format!("Unknown payment type '{}'", self.tipo_venta)))?;

        Ok(Sale {
            id: self.id,
            ticket: self.ticket,
            seller_id: self.vendedor_id,
            seller_name: self.vendedor_nombre,
            channel,
            payment_type,
            estado: self.estado,
            fecha_entrega: self.fecha_entrega,
            total: self.total,
            created_at: self.created_at,
            detalles,
        })
    }
}

/// Row of `detalle_salidas` joined with the product name
#[derive(Debug, Clone, FromRow)]
pub struct SaleLineRow {
    pub id: Uuid,
    pub salida_id: Uuid,
    pub producto_id: Uuid,
    pub producto_nombre: String,
    pub cantidad: i32,
    pub precio_unitario: Decimal,
    pub subtotal: Decimal,
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        SaleLine {
            id: row.id,
            product_id: row.producto_id,
            product_name: row.producto_nombre,
            cantidad: row.cantidad,
            precio_unitario: row.precio_unitario,
            subtotal: row.subtotal,
        }
    }
}

/// Row of `estados_pedido` or `estados_salida`
#[derive(Debug, Clone, FromRow)]
pub struct StatusRow {
    pub id: Uuid,
    pub nombre: String,
    pub activo: bool,
    pub es_default: bool,
}

impl From<StatusRow> for StatusOption {
    fn from(row: StatusRow) -> Self {
        StatusOption {
            id: row.id,
            name: row.nombre,
            active: row.activo,
            es_default: row.es_default,
        }
    }
}

/// Row of `modelos` joined with its brand name
#[derive(Debug, Clone, FromRow)]
pub struct ModelRow {
    pub id: Uuid,
    pub nombre: String,
    pub marca_id: Uuid,
    pub marca_nombre: String,
    pub tipo_producto_id: Uuid,
}

impl ModelRow {
    pub fn to_model(&self) -> Model {
        Model {
            id: self.id,
            name: self.nombre.clone(),
            brand_id: self.marca_id,
            product_type_id: self.tipo_producto_id,
        }
    }
}
