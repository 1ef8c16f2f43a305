// core/src/boundary/mod.rs

//! Row shapes exchanged with the persistence backend (snake_case columns,
//! decimal major-unit amounts) and their conversions to and from the
//! storefront model. This is the only place that knows both shapes.

mod order;
mod product;
mod profile;

pub use order::{OrderItemRow, OrderRow, OrderStatusPatchRow, ShippingDetailsRow};
pub use product::{CategoryRow, NewCategoryRow, NewProductRow, ProductPatchRow, ProductRow};
pub use profile::ProfileRow;
