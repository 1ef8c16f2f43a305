// app/src/pg_gateway.rs

//! PostgreSQL persistence for the storefront, with the orders change feed
//! driven by `LISTEN orders_changed`.

use crate::errors::{gateway_error, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPool, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::HashMap;
use std::time::Duration;
use storefront::boundary::{
  CategoryRow, NewCategoryRow, NewProductRow, OrderItemRow, OrderRow, OrderStatusPatchRow, ProductPatchRow,
  ProductRow, ProfileRow, ShippingDetailsRow,
};
use storefront::diagnostics::SETUP_SQL;
use storefront::gateway::{ChangeEvent, ChangeKind, GatewayResult, PersistenceGateway};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const ORDERS_CHANNEL: &str = "orders_changed";

const PRODUCT_COLUMNS: &str = "id, name, description, price, currency, sku, stock::int8 AS stock, \
                               category, image_url, rating, created_at";

pub struct PgGateway {
  pool: PgPool,
  image_base_url: String,
  orders_feed: broadcast::Sender<ChangeEvent>,
}

impl PgGateway {
  pub async fn connect(database_url: &str, image_base_url: &str) -> Result<Self> {
    let pool = PgPool::connect(database_url).await?;
    info!("Successfully connected to the database.");
    let (orders_feed, _) = broadcast::channel(64);
    Ok(Self {
      pool,
      image_base_url: image_base_url.to_string(),
      orders_feed,
    })
  }

  /// Creates the tables, the change trigger and the storage table if missing.
  pub async fn apply_setup_script(&self) -> Result<()> {
    sqlx::raw_sql(SETUP_SQL).execute(&self.pool).await?;
    info!("Database schema ensured.");
    Ok(())
  }

  pub fn pool(&self) -> &PgPool {
    &self.pool
  }

  /// Forwards `orders_changed` notifications to `subscribe_orders` receivers.
  pub async fn spawn_change_feed(&self) -> Result<JoinHandle<()>> {
    let mut listener = PgListener::connect_with(&self.pool).await?;
    listener.listen(ORDERS_CHANNEL).await?;
    let feed = self.orders_feed.clone();
    info!(channel = ORDERS_CHANNEL, "Listening for order changes.");

    Ok(tokio::spawn(async move {
      loop {
        match listener.recv().await {
          Ok(notification) => {
            let kind = match notification.payload() {
              "INSERT" => ChangeKind::Insert,
              "DELETE" => ChangeKind::Delete,
              _ => ChangeKind::Update,
            };
            debug!(?kind, "Order change notification.");
            // No subscribers is fine.
            let _ = feed.send(ChangeEvent {
              table: "orders".to_string(),
              kind,
            });
          }
          Err(e) => {
            error!(error = %e, "Order change listener failed; retrying.");
            tokio::time::sleep(Duration::from_secs(1)).await;
          }
        }
      }
    }))
  }
}

fn product_from_row(row: &PgRow) -> std::result::Result<ProductRow, sqlx::Error> {
  Ok(ProductRow {
    id: row.try_get("id")?,
    name: row.try_get("name")?,
    description: row.try_get("description")?,
    price: row.try_get("price")?,
    currency: row.try_get("currency")?,
    sku: row.try_get("sku")?,
    stock: row.try_get("stock")?,
    category: row.try_get("category")?,
    image_url: row.try_get("image_url")?,
    rating: row.try_get("rating")?,
    created_at: row.try_get("created_at")?,
  })
}

fn category_from_row(row: &PgRow) -> std::result::Result<CategoryRow, sqlx::Error> {
  Ok(CategoryRow {
    id: row.try_get("id")?,
    name: row.try_get("name")?,
  })
}

fn order_from_row(row: &PgRow) -> std::result::Result<OrderRow, sqlx::Error> {
  let Json(shipping_details): Json<ShippingDetailsRow> = row.try_get("shipping_details")?;
  Ok(OrderRow {
    id: row.try_get("id")?,
    order_number: row.try_get("order_number")?,
    user_id: row.try_get("user_id")?,
    customer_email: row.try_get("customer_email")?,
    total_amount: row.try_get("total_amount")?,
    currency: row.try_get("currency")?,
    status: row.try_get("status")?,
    shipping_details,
    tracking_number: row.try_get("tracking_number")?,
    courier_name: row.try_get("courier_name")?,
    payment_id: row.try_get("payment_id")?,
    created_at: row.try_get("created_at")?,
    items: Vec::new(),
  })
}

fn order_item_from_row(row: &PgRow) -> std::result::Result<OrderItemRow, sqlx::Error> {
  Ok(OrderItemRow {
    order_id: row.try_get("order_id")?,
    product_id: row.try_get("product_id")?,
    name: row.try_get("name")?,
    quantity: row.try_get("quantity")?,
    unit_price: row.try_get("unit_price")?,
    image_url: row.try_get("image_url")?,
  })
}

fn profile_from_row(row: &PgRow) -> std::result::Result<ProfileRow, sqlx::Error> {
  Ok(ProfileRow {
    id: row.try_get("id")?,
    email: row.try_get("email")?,
    full_name: row.try_get("full_name")?,
    role: row.try_get("role")?,
  })
}

fn map_rows<T>(
  rows: Vec<PgRow>,
  f: impl Fn(&PgRow) -> std::result::Result<T, sqlx::Error>,
) -> GatewayResult<Vec<T>> {
  rows.iter().map(|row| f(row).map_err(gateway_error)).collect()
}

#[async_trait]
impl PersistenceGateway for PgGateway {
  async fn list_products(&self) -> GatewayResult<Vec<ProductRow>> {
    let rows = sqlx::query(&format!(
      "SELECT {} FROM products ORDER BY created_at DESC",
      PRODUCT_COLUMNS
    ))
    .fetch_all(&self.pool)
    .await
    .map_err(gateway_error)?;
    map_rows(rows, product_from_row)
  }

  #[instrument(skip(self, row), fields(name = %row.name), err(Display))]
  async fn insert_product(&self, row: NewProductRow) -> GatewayResult<()> {
    sqlx::query(
      "INSERT INTO products (name, description, price, currency, sku, stock, category, image_url, rating) \
       VALUES ($1, $2, $3, $4, $5, $6::int8, $7, $8, $9)",
    )
    .bind(&row.name)
    .bind(&row.description)
    .bind(row.price)
    .bind(&row.currency)
    .bind(&row.sku)
    .bind(row.stock)
    .bind(&row.category)
    .bind(&row.image_url)
    .bind(row.rating)
    .execute(&self.pool)
    .await
    .map_err(gateway_error)?;
    Ok(())
  }

  #[instrument(skip(self, patch), err(Display))]
  async fn update_product(&self, id: &str, patch: ProductPatchRow) -> GatewayResult<()> {
    // Absent fields keep their stored value.
    sqlx::query(
      "UPDATE products SET \
         name = COALESCE($2, name), \
         description = COALESCE($3, description), \
         price = COALESCE($4, price), \
         currency = COALESCE($5, currency), \
         sku = COALESCE($6, sku), \
         stock = COALESCE($7::int8::integer, stock), \
         category = COALESCE($8, category), \
         image_url = COALESCE($9, image_url) \
       WHERE id = $1",
    )
    .bind(id)
    .bind(&patch.name)
    .bind(&patch.description)
    .bind(patch.price)
    .bind(&patch.currency)
    .bind(&patch.sku)
    .bind(patch.stock)
    .bind(&patch.category)
    .bind(&patch.image_url)
    .execute(&self.pool)
    .await
    .map_err(gateway_error)?;
    Ok(())
  }

  #[instrument(skip(self), err(Display))]
  async fn delete_product(&self, id: &str) -> GatewayResult<Vec<ProductRow>> {
    let rows = sqlx::query(&format!("DELETE FROM products WHERE id = $1 RETURNING {}", PRODUCT_COLUMNS))
      .bind(id)
      .fetch_all(&self.pool)
      .await
      .map_err(gateway_error)?;
    map_rows(rows, product_from_row)
  }

  async fn list_categories(&self) -> GatewayResult<Vec<CategoryRow>> {
    let rows = sqlx::query("SELECT id, name FROM categories ORDER BY name ASC")
      .fetch_all(&self.pool)
      .await
      .map_err(gateway_error)?;
    map_rows(rows, category_from_row)
  }

  async fn insert_category(&self, row: NewCategoryRow) -> GatewayResult<()> {
    sqlx::query("INSERT INTO categories (name) VALUES ($1)")
      .bind(&row.name)
      .execute(&self.pool)
      .await
      .map_err(gateway_error)?;
    Ok(())
  }

  async fn delete_category(&self, id: &str) -> GatewayResult<Vec<CategoryRow>> {
    let rows = sqlx::query("DELETE FROM categories WHERE id = $1 RETURNING id, name")
      .bind(id)
      .fetch_all(&self.pool)
      .await
      .map_err(gateway_error)?;
    map_rows(rows, category_from_row)
  }

  async fn list_orders(&self) -> GatewayResult<Vec<OrderRow>> {
    let order_rows = sqlx::query(
      "SELECT id, order_number, user_id, customer_email, total_amount, currency, status, \
              shipping_details, tracking_number, courier_name, payment_id, created_at \
       FROM orders ORDER BY created_at DESC",
    )
    .fetch_all(&self.pool)
    .await
    .map_err(gateway_error)?;
    let mut orders = map_rows(order_rows, order_from_row)?;

    let item_rows = sqlx::query(
      "SELECT i.order_id, i.product_id, i.name, i.quantity::int8 AS quantity, i.unit_price, \
              p.image_url \
       FROM order_items i LEFT JOIN products p ON p.id = i.product_id \
       ORDER BY i.id ASC",
    )
    .fetch_all(&self.pool)
    .await
    .map_err(gateway_error)?;

    let mut items_by_order: HashMap<Uuid, Vec<OrderItemRow>> = HashMap::new();
    for item in map_rows(item_rows, order_item_from_row)? {
      items_by_order.entry(item.order_id).or_default().push(item);
    }
    for order in &mut orders {
      order.items = items_by_order.remove(&order.id).unwrap_or_default();
    }
    Ok(orders)
  }

  #[instrument(skip(self, row), fields(order_number = %row.order_number), err(Display))]
  async fn insert_order(&self, row: OrderRow) -> GatewayResult<()> {
    sqlx::query(
      "INSERT INTO orders (id, order_number, user_id, customer_email, total_amount, currency, status, \
                           shipping_details, tracking_number, courier_name, payment_id, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
    )
    .bind(row.id)
    .bind(&row.order_number)
    .bind(&row.user_id)
    .bind(&row.customer_email)
    .bind(row.total_amount)
    .bind(&row.currency)
    .bind(&row.status)
    .bind(Json(&row.shipping_details))
    .bind(&row.tracking_number)
    .bind(&row.courier_name)
    .bind(&row.payment_id)
    .bind(row.created_at)
    .execute(&self.pool)
    .await
    .map_err(gateway_error)?;
    Ok(())
  }

  #[instrument(skip(self, rows), fields(count = rows.len()), err(Display))]
  async fn insert_order_items(&self, rows: Vec<OrderItemRow>) -> GatewayResult<()> {
    let mut tx = self.pool.begin().await.map_err(gateway_error)?;
    for item in &rows {
      sqlx::query(
        "INSERT INTO order_items (order_id, product_id, name, quantity, unit_price) \
         VALUES ($1, $2, $3, $4::int8, $5)",
      )
      .bind(item.order_id)
      .bind(&item.product_id)
      .bind(&item.name)
      .bind(item.quantity)
      .bind(item.unit_price)
      .execute(&mut *tx)
      .await
      .map_err(gateway_error)?;
    }
    tx.commit().await.map_err(gateway_error)?;
    Ok(())
  }

  #[instrument(skip(self, patch), fields(status = %patch.status), err(Display))]
  async fn update_order(&self, id: Uuid, patch: OrderStatusPatchRow) -> GatewayResult<()> {
    sqlx::query(
      "UPDATE orders SET status = $2, \
         tracking_number = COALESCE($3, tracking_number), \
         courier_name = COALESCE($4, courier_name) \
       WHERE id = $1",
    )
    .bind(id)
    .bind(&patch.status)
    .bind(&patch.tracking_number)
    .bind(&patch.courier_name)
    .execute(&self.pool)
    .await
    .map_err(gateway_error)?;
    Ok(())
  }

  async fn fetch_profile(&self, user_id: &str) -> GatewayResult<Option<ProfileRow>> {
    let row = sqlx::query("SELECT id, email, full_name, role FROM profiles WHERE id = $1")
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(gateway_error)?;
    row.as_ref().map(profile_from_row).transpose().map_err(gateway_error)
  }

  #[instrument(skip(self, bytes), fields(size = bytes.len()), err(Display))]
  async fn upload_object(&self, bucket: &str, path: &str, bytes: Vec<u8>) -> GatewayResult<String> {
    sqlx::query(
      "INSERT INTO storage_objects (bucket, path, bytes) VALUES ($1, $2, $3) \
       ON CONFLICT (bucket, path) DO UPDATE SET bytes = EXCLUDED.bytes",
    )
    .bind(bucket)
    .bind(path)
    .bind(bytes)
    .execute(&self.pool)
    .await
    .map_err(gateway_error)?;
    Ok(format!("{}/{}/{}", self.image_base_url, bucket, path))
  }

  fn subscribe_orders(&self) -> broadcast::Receiver<ChangeEvent> {
    self.orders_feed.subscribe()
  }
}

