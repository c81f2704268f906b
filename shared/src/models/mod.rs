//! Domain models for the Inventory Management backend

mod catalog;
mod movement;
mod product;
mod purchase_order;
mod sale;
mod user;

pub use catalog::*;
pub use movement::*;
pub use product::*;
pub use purchase_order::*;
pub use sale::*;
pub use user::*;
