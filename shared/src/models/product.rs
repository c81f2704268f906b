//! Product models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::SaleChannel;

/// Name given to products created before brand and model are known
pub const PENDING_PRODUCT_NAME: &str = "Producto pendiente";

/// A stocked product
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "descripcion")]
    pub description: Option<String>,
    #[serde(rename = "precioTienda")]
    pub store_price: Decimal,
    #[serde(rename = "precioRuta")]
    pub route_price: Decimal,
    pub stock_actual: i32,
    pub stock_minimo: i32,
    /// Capacity ceiling, 0 means unbounded
    pub stock_maximo: i32,
    #[serde(rename = "disponible")]
    pub available: bool,
    #[serde(rename = "motivoNoDisponible")]
    pub unavailable_reason: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub product_type_id: Option<Uuid>,
    pub brand_id: Option<Uuid>,
    pub model_id: Option<Uuid>,
    pub ultima_fecha_movimiento: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Default unit price for the given sale channel
    pub fn channel_price(&self, channel: SaleChannel) -> Decimal {
        match channel {
            SaleChannel::Ruta => self.route_price,
            SaleChannel::Tienda => self.store_price,
        }
    }
}

/// Display name for a product identified only by brand and model
pub fn derive_product_name(brand: Option<&str>, model: Option<&str>) -> String {
    let parts: Vec<&str> = [brand, model]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if parts.is_empty() {
        PENDING_PRODUCT_NAME.to_string()
    } else {
        parts.join(" ")
    }
}

/// Starting capacity for a product created on purchase-order receipt
pub fn initial_stock_maximum(requested_quantity: i32) -> i32 {
    requested_quantity.max(1)
}
