// core/src/storefront.rs

//! Wires one instance of every store to the backends and owns the
//! background listeners. Built once at startup and passed around by reference.

use crate::admin::{AdminAuthWatch, AdminConsole};
use crate::cache::CacheStore;
use crate::cart::CartStore;
use crate::catalog::{Bootstrap, CatalogStore};
use crate::checkout::{CheckoutDeps, CheckoutSession, CheckoutWorkflow, PlacedOrder};
use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::gateway::{AuthProvider, PaymentGateway, PaymentMethod, PersistenceGateway};
use crate::model::{Order, User};
use crate::orders::OrderBook;
use crate::routes::{admin_redirect, checkout_redirect, Route};
use crate::session::SessionManager;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The external collaborators a storefront runs against.
#[derive(Clone)]
pub struct Backends {
  pub db: Arc<dyn PersistenceGateway>,
  pub auth: Arc<dyn AuthProvider>,
  pub payments: Arc<dyn PaymentGateway>,
  pub cache: Arc<dyn CacheStore>,
}

#[derive(Debug)]
pub struct StartupReport {
  pub user: Option<User>,
  /// Set when the catalog was served from cache; resolves once the backend refresh lands.
  pub catalog_revalidation: Option<JoinHandle<()>>,
  /// The message for the catalog's retry panel, if the first load failed.
  pub catalog_error: Option<String>,
  pub orders_loaded: bool,
}

pub struct Storefront {
  config: Arc<StoreConfig>,
  session: Arc<SessionManager>,
  catalog: Arc<CatalogStore>,
  cart: Arc<CartStore>,
  orders: Arc<OrderBook>,
  checkout: CheckoutWorkflow,
  admin: AdminConsole,
  listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl Storefront {
  pub fn new(config: StoreConfig, backends: Backends) -> Self {
    let config = Arc::new(config);
    let session = Arc::new(SessionManager::new(
      Arc::clone(&backends.auth),
      Arc::clone(&backends.db),
      &config,
    ));
    let catalog = Arc::new(CatalogStore::new(Arc::clone(&backends.db), Arc::clone(&backends.cache)));
    let cart = Arc::new(CartStore::restore(Arc::clone(&backends.cache)));
    let orders = Arc::new(OrderBook::new(Arc::clone(&backends.db)));
    let checkout = CheckoutWorkflow::new(CheckoutDeps {
      cart: Arc::clone(&cart),
      orders: Arc::clone(&orders),
      payments: backends.payments,
      config: Arc::clone(&config),
    });
    let admin = AdminConsole::new(Arc::clone(&session), Arc::clone(&orders), Arc::clone(&catalog));

    Self {
      config,
      session,
      catalog,
      cart,
      orders,
      checkout,
      admin,
      listeners: Mutex::new(Vec::new()),
    }
  }

  /// Resolves the session, loads the catalog and orders, and starts the change listeners.
  pub async fn start(&self) -> StartupReport {
    let user = self.session.init().await;
    {
      let mut listeners = self.listeners.lock();
      listeners.push(self.session.spawn_auth_listener());
      listeners.push(self.orders.spawn_change_listener());
    } // guard dropped

    let (catalog_revalidation, catalog_error) = match self.catalog.bootstrap().await {
      Ok(Bootstrap::FromCache { revalidation }) => (Some(revalidation), None),
      Ok(Bootstrap::Live) => (None, None),
      Err(e) => {
        error!(error = %e, "Catalog failed to load.");
        (None, Some(e.user_message()))
      }
    };

    let orders_loaded = match self.orders.refresh().await {
      Ok(()) => true,
      Err(e) => {
        warn!(error = %e, "Orders failed to load.");
        false
      }
    };

    info!(
      signed_in = user.is_some(),
      products = self.catalog.products().len(),
      cart_lines = self.cart.items().len(),
      "Storefront started."
    );
    StartupReport {
      user,
      catalog_revalidation,
      catalog_error,
      orders_loaded,
    }
  }

  /// Stops the background listeners.
  pub fn shutdown(&self) {
    for handle in self.listeners.lock().drain(..) {
      handle.abort();
    }
  }

  pub fn config(&self) -> &StoreConfig {
    &self.config
  }

  pub fn session(&self) -> &Arc<SessionManager> {
    &self.session
  }

  pub fn catalog(&self) -> &Arc<CatalogStore> {
    &self.catalog
  }

  pub fn cart(&self) -> &Arc<CartStore> {
    &self.cart
  }

  pub fn orders(&self) -> &Arc<OrderBook> {
    &self.orders
  }

  pub fn checkout(&self) -> &CheckoutWorkflow {
    &self.checkout
  }

  pub fn admin(&self) -> &AdminConsole {
    &self.admin
  }

  /// Opens a checkout session, or says where to go instead.
  pub fn enter_checkout(&self) -> std::result::Result<CheckoutSession, Route> {
    match checkout_redirect(
      self.cart.is_empty(),
      self.session.is_authenticated(),
      self.config.require_login_for_checkout,
    ) {
      Some(route) => Err(route),
      None => Ok(CheckoutSession::begin(self.session.user().as_ref())),
    }
  }

  /// Places the order for the current shopper, re-checking the checkout guards.
  pub async fn place_order(&self, session: &CheckoutSession, method: PaymentMethod) -> Result<PlacedOrder> {
    if let Some(route) = checkout_redirect(
      self.cart.is_empty(),
      self.session.is_authenticated(),
      self.config.require_login_for_checkout,
    ) {
      return Err(match route {
        Route::Cart => StoreError::Validation("Your cart is empty".to_string()),
        _ => StoreError::Auth("Please sign in to complete your purchase".to_string()),
      });
    }
    self.checkout.place_order(session, self.session.user(), method).await
  }

  /// Runs the admin-area gate, showing the troubleshooting hint if the session check is slow.
  pub async fn enter_admin(&self) -> std::result::Result<(), Route> {
    let watch = AdminAuthWatch::start(self.config.admin_auth_hint);
    let user = self.session.current_user().await;
    if watch.finish() {
      warn!("Admin session check finished after the troubleshooting hint was shown.");
    }
    let is_admin = user.as_ref().is_some_and(User::is_admin);
    match admin_redirect(user.is_some(), is_admin) {
      Some(route) => Err(route),
      None => Ok(()),
    }
  }

  /// Tracking lookup by order number.
  pub fn track(&self, order_number: &str) -> Option<Order> {
    self.orders.get_order_by_number(order_number)
  }
}

impl Drop for Storefront {
  fn drop(&mut self) {
    self.shutdown();
  }
}
