/// Commerce services module - cart, pricing and stock logic
pub mod cart_service;
pub mod pricing_service;
pub mod product_catalog_service;
pub mod stock_service;

// Re-export services for convenience
pub use cart_service::{CartLine, CartService, CartSummary};
pub use pricing_service::{PriceCalculation, PriceTotals, PricingEngine};
pub use product_catalog_service::ProductCatalogService;
pub use stock_service::{Shortfall, StockService, StockVerdict};
