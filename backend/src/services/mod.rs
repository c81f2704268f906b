//! Business logic services for the Inventory Management backend

pub mod ledger;
pub mod movement;
pub mod notification;
pub mod product;
pub mod purchase_order;
pub mod report;
pub mod sale;

pub use movement::MovementService;
pub use notification::NotificationService;
pub use product::ProductService;
pub use purchase_order::PurchaseOrderService;
pub use report::ReportService;
pub use sale::SaleService;
