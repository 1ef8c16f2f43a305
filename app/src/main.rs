// app/src/main.rs

mod config;
mod errors;
mod pg_auth;
mod pg_gateway;
mod razorpay;
mod seed;
mod shell;

use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::pg_auth::PgAuthProvider;
use crate::pg_gateway::PgGateway;
use crate::razorpay::RazorpayGateway;
use crate::shell::Shell;

use std::sync::Arc;
use std::time::Duration;
use storefront::boundary::ProfileRow;
use storefront::cache::{CacheStore, FileCache, MemoryCache};
use storefront::gateway::{
  AuthProvider, Identity, LocalAuthProvider, MemoryBackend, MockPaymentGateway, PaymentGateway, PersistenceGateway,
};
use storefront::{Backends, Storefront};
use tokio::task::JoinHandle;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

/// Simulated time the hosted checkout takes to answer.
const PAYMENT_LATENCY: Duration = Duration::from_millis(1500);

/// The persistence backend the binary runs against.
enum Database {
  Postgres { gateway: Arc<PgGateway>, feed: JoinHandle<()> },
  Memory(Arc<MemoryBackend>),
}

impl Database {
  async fn open(config: &AppConfig) -> AppResult<Self> {
    let Some(url) = config.database_url.as_deref() else {
      tracing::warn!("DATABASE_URL not set; using the in-memory backend. Data is lost on exit.");
      return Ok(Database::Memory(Arc::new(MemoryBackend::new())));
    };
    let gateway = Arc::new(PgGateway::connect(url, &config.image_base_url).await?);
    gateway.apply_setup_script().await?;
    let feed = gateway.spawn_change_feed().await?;
    Ok(Database::Postgres { gateway, feed })
  }

  fn gateway(&self) -> Arc<dyn PersistenceGateway> {
    match self {
      Database::Postgres { gateway, .. } => Arc::clone(gateway) as Arc<dyn PersistenceGateway>,
      Database::Memory(memory) => Arc::clone(memory) as Arc<dyn PersistenceGateway>,
    }
  }

  /// Accounts live next to the data: the `users` table on Postgres, process
  /// memory otherwise. Either way a new account gets its profile row.
  fn auth(&self) -> Accounts {
    match self {
      Database::Postgres { gateway, .. } => Accounts::Postgres(Arc::new(PgAuthProvider::new(gateway.pool().clone()))),
      Database::Memory(memory) => {
        let auth = Arc::new(LocalAuthProvider::new());
        let memory = Arc::clone(memory);
        auth.set_signup_hook(Arc::new(move |identity: &Identity| memory.put_profile(profile_for(identity))));
        Accounts::Local(auth)
      }
    }
  }

  fn close(self) {
    if let Database::Postgres { feed, .. } = self {
      feed.abort();
    }
  }
}

enum Accounts {
  Postgres(Arc<PgAuthProvider>),
  Local(Arc<LocalAuthProvider>),
}

impl Accounts {
  /// Creates the admin account, or resets its password and role if the email exists.
  async fn ensure_admin(&self, email: &str, password: &str) -> AppResult<Identity> {
    let result = match self {
      Accounts::Postgres(auth) => auth.ensure_account(email, password, ADMIN_NAME, Some("ADMIN")).await,
      Accounts::Local(auth) => auth.register(email, password, ADMIN_NAME, Some("ADMIN")),
    };
    result.map_err(|e| AppError::Config(format!("Cannot create admin account {}: {}", email, e)))
  }

  fn provider(&self) -> Arc<dyn AuthProvider> {
    match self {
      Accounts::Postgres(auth) => Arc::clone(auth) as Arc<dyn AuthProvider>,
      Accounts::Local(auth) => Arc::clone(auth) as Arc<dyn AuthProvider>,
    }
  }
}

const ADMIN_NAME: &str = "Store Admin";

pub(crate) fn profile_for(identity: &Identity) -> ProfileRow {
  ProfileRow {
    id: identity.id.clone(),
    email: Some(identity.email.clone()),
    full_name: identity.user_metadata.name.clone(),
    role: identity
      .app_metadata
      .role
      .clone()
      .or_else(|| identity.user_metadata.role.clone()),
  }
}

fn open_payments(config: &AppConfig) -> AppResult<Arc<dyn PaymentGateway>> {
  match &config.razorpay {
    Some(settings) => {
      tracing::info!(key_id = %settings.key_id, "Using Razorpay for payments.");
      Ok(Arc::new(RazorpayGateway::new(settings.clone())?))
    }
    None => {
      tracing::warn!("RAZORPAY_KEY_ID not set; payments are simulated.");
      Ok(Arc::new(MockPaymentGateway::new(PAYMENT_LATENCY)))
    }
  }
}

fn open_cache(config: &AppConfig) -> AppResult<Arc<dyn CacheStore>> {
  match &config.store.cache_dir {
    Some(dir) => Ok(Arc::new(FileCache::open(dir)?)),
    None => Ok(Arc::new(MemoryCache::new())),
  }
}

#[tokio::main]
async fn main() -> AppResult<()> {
  // Logs go to stderr so the shell owns stdout.
  tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()) // Allow RUST_LOG override
    .with_span_events(FmtSpan::CLOSE)
    .with_writer(std::io::stderr)
    .init();

  tracing::info!("Starting Ansar Tools storefront...");

  let app_config = match AppConfig::from_env() {
    Ok(cfg) => cfg,
    Err(e) => {
      tracing::error!(error = %e, "Failed to load application configuration.");
      return Err(e);
    }
  };

  let database = Database::open(&app_config).await?;
  let db = database.gateway();

  if app_config.seed_db || matches!(database, Database::Memory(_)) {
    if let Err(e) = seed::seed_catalog(db.as_ref()).await {
      tracing::error!(error = %e, "Failed to seed database.");
    }
  }

  let accounts = database.auth();
  if let (Some(email), Some(password)) = (&app_config.admin_email, &app_config.admin_password) {
    let identity = accounts.ensure_admin(email, password).await?;
    tracing::info!(%email, user_id = %identity.id, "Admin account ready.");
  }

  let backends = Backends {
    db,
    auth: accounts.provider(),
    payments: open_payments(&app_config)?,
    cache: open_cache(&app_config)?,
  };
  let store = Storefront::new(app_config.store.clone(), backends);

  let report = store.start().await;
  if let Some(message) = &report.catalog_error {
    tracing::warn!(%message, "Catalog unavailable; 'setup-sql' prints the schema script.");
  }
  if let Some(user) = &report.user {
    tracing::info!(email = %user.email, "Session restored.");
  }

  let outcome = Shell::new(&store).run().await;

  store.shutdown();
  if let Some(revalidation) = report.catalog_revalidation {
    revalidation.abort();
  }
  database.close();
  tracing::info!("Storefront stopped.");
  outcome
}
