//! HTTP request handlers

pub mod health;
pub mod movement;
pub mod product;
pub mod purchase_order;
pub mod report;
pub mod sale;

pub use health::health_check;
pub use movement::{create_adjustment, list_movements};
pub use product::{get_product, list_low_stock, list_products};
pub use purchase_order::{create_purchase_order, get_purchase_order, list_purchase_orders, update_purchase_order};
pub use report::sales_report;
pub use sale::{create_sale, get_sale, list_sales, update_sale};
