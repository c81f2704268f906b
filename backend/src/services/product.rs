//! Product read service

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Product, ProductRow, PRODUCT_COLUMNS};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Query string filters for listing products
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    /// Case-insensitive name fragment
    pub search: Option<String>,
    pub disponible: Option<bool>,
    pub supplier_id: Option<Uuid>,
}

impl ProductService {
    /// Create a new ProductService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// List products by name
    pub async fn list(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let search = filter
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {} FROM productos
            WHERE ($1::text IS NULL OR nombre ILIKE $1)
              AND ($2::bool IS NULL OR disponible = $2)
              AND ($3::uuid IS NULL OR suplidor_id = $3)
            ORDER BY nombre
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(search)
        .bind(filter.disponible)
        .bind(filter.supplier_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Get a product by id
    pub async fn get(&self, product_id: Uuid) -> AppResult<Product> {
        sqlx::query_as::<_, ProductRow>(&format!("SELECT {} FROM productos WHERE id = $1", PRODUCT_COLUMNS))
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .map(Product::from)
            .ok_or_else(|| AppError::not_found("Producto"))
    }

    /// Products at or below their reorder threshold, emptiest first
    pub async fn low_stock(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            SELECT {} FROM productos
            WHERE stock_actual <= stock_minimo
            ORDER BY stock_actual, nombre
            "#,
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }
}
