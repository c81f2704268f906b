//! Catalog models: suppliers, product classification and workflow states

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A supplier goods are ordered from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "telefono")]
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(rename = "activo")]
    pub active: bool,
}

/// Product type, e.g. "Lavadora"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductType {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brand {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
}

/// A model always belongs to one brand and one product type
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    pub brand_id: Uuid,
    pub product_type_id: Uuid,
}

impl Model {
    pub fn belongs_to(&self, brand_id: Uuid, product_type_id: Uuid) -> bool {
        self.brand_id == brand_id && self.product_type_id == product_type_id
    }
}

/// An admin-configured workflow state for pedidos or salidas
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusOption {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "activo")]
    pub active: bool,
    pub es_default: bool,
}

/// The active state flagged as default, if any
pub fn pick_default_state(options: &[StatusOption]) -> Option<&StatusOption> {
    options.iter().find(|o| o.active && o.es_default)
}

/// Names of the active states in configured order
pub fn active_state_names(options: &[StatusOption]) -> Vec<String> {
    options
        .iter()
        .filter(|o| o.active)
        .map(|o| o.name.clone())
        .collect()
}
