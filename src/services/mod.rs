// Checkout pipeline services
pub mod commerce;
pub mod payments;

pub use commerce::{CartService, ProductCatalogService, StockService};
pub use payments::PaymentService;
