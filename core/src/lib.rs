// core/src/lib.rs

//! Storefront core for Ansar Tools: the cart, catalog, session and order
//! workflow that sit between the shopper and the managed backends.
//!
//!  - `flow`: a small async step pipeline with before/on/after hooks, optional
//!    steps and skip conditions. Checkout runs on it.
//!  - `session`, `catalog`, `cart`, `orders`: one store each, state behind a
//!    private lock, talking to the backends through the `gateway` traits.
//!  - `checkout`: the two-step checkout and its payment/persist pipeline.
//!  - `admin`: fulfilment and inventory operations behind the admin role.
//!  - `boundary`: the snake_case rows the backend speaks, and their conversions.
//!
//! A `Storefront` wires one of each together.

pub mod admin;
pub mod boundary;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod flow;
pub mod gateway;
pub mod model;
pub mod orders;
pub mod routes;
pub mod session;
pub mod storefront;

pub use crate::cart::CartStore;
pub use crate::catalog::{CatalogQuery, CatalogStore, SortOrder};
pub use crate::checkout::{CheckoutSession, CheckoutStep, CheckoutWorkflow, PlacedOrder};
pub use crate::config::StoreConfig;
pub use crate::error::{GatewayError, Result, StoreError};
pub use crate::flow::{ContextData, Pipeline, PipelineControl, PipelineResult};
pub use crate::orders::OrderBook;
pub use crate::routes::Route;
pub use crate::session::SessionManager;
pub use crate::storefront::{Backends, StartupReport, Storefront};
