// core/src/model/mod.rs

//! The storefront's internal data shapes. Nothing here knows about the
//! snake_case rows the backend speaks; see `crate::boundary` for that.

pub mod cart_item;
pub mod money;
pub mod order;
pub mod product;
pub mod user;

pub use cart_item::CartItem;
pub use money::Money;
pub use order::{Order, OrderLine, OrderStatus, ShippingDetails, Transition};
pub use product::{Category, Product, ProductDraft, ProductPatch};
pub use user::{User, UserRole};
