/// Commerce entities module
pub mod cart;
pub mod cart_item;
pub mod product;

// Re-export entities
pub use cart::{CartStatus, Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use product::{Entity as Product, Model as ProductModel};
