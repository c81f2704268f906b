//! User and role models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role names understood by the authorization gate
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const WAREHOUSE: &str = "almacen";
    pub const SELLER: &str = "vendedor";
}

/// Minimal user view used for actors and notification recipients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "rol")]
    pub role: String,
}

/// Case-insensitive role membership
pub fn role_allowed(role: &str, allowed: &[&str]) -> bool {
    let role = role.trim();
    allowed.iter().any(|r| r.eq_ignore_ascii_case(role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_allowed() {
        assert!(role_allowed("Admin", &[roles::ADMIN]));
        assert!(role_allowed(" vendedor ", &[roles::ADMIN, roles::SELLER]));
        assert!(!role_allowed("almacen", &[roles::ADMIN, roles::SELLER]));
    }
}
