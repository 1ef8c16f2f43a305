// app/src/shell.rs

//! A line-oriented front end over the storefront: browse, fill the cart,
//! check out, track orders and run the admin console.

use crate::errors::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use storefront::admin::{delete_failure_message, ProductForm};
use storefront::catalog::ALL_CATEGORIES;
use storefront::diagnostics::{grant_admin_sql, SETUP_SQL};
use storefront::gateway::PaymentMethod;
use storefront::model::{Money, Order, Product, ShippingDetails, UserRole};
use storefront::{CatalogQuery, CheckoutSession, CheckoutStep, Route, SortOrder, StoreError, Storefront};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tracing::{debug, warn};

/// One line typed at the prompt.
#[derive(Parser, Debug)]
#[command(name = "storefront", no_binary_name = true, disable_help_flag = true, disable_version_flag = true)]
struct ShellLine {
  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
  /// List products, filtered and paged
  Products {
    #[arg(long)]
    category: Option<String>,
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, value_parser = ["new", "featured"])]
    sort: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: usize,
  },
  /// List categories
  Categories,
  /// Show one product
  Show { id: String },
  /// Reload the catalog after a failure
  Retry,

  /// Add a product to the cart
  Add {
    id: String,
    #[arg(default_value_t = 1)]
    qty: u32,
  },
  /// Set the quantity of a cart line
  Qty { id: String, qty: u32 },
  Inc { id: String },
  Dec { id: String },
  Remove { id: String },
  /// Show the cart
  Cart,
  Clear,

  /// Create a customer account
  Signup {
    email: String,
    password: String,
    #[arg(required = true, num_args = 1..)]
    name: Vec<String>,
  },
  Login { email: String, password: String },
  AdminLogin { email: String, password: String },
  Logout,
  Whoami,
  MyOrders,

  /// Enter shipping details for the current cart
  Checkout,
  /// Pay for the order and place it
  Pay {
    #[arg(value_enum, default_value_t = MethodArg::Upi)]
    method: MethodArg,
  },
  /// Return from payment to shipping details
  Back,

  /// Look up an order by its number
  Track { order_number: String },

  /// Admin dashboard
  Admin,
  /// Search orders by number or email
  Orders { term: Vec<String> },
  Ship {
    order_number: String,
    tracking: String,
    courier: Option<String>,
  },
  Deliver { order_number: String },
  NewProduct(ProductArgs),
  EditProduct {
    id: String,
    #[command(flatten)]
    fields: ProductArgs,
  },
  DeleteProduct { id: String },
  AddCategory {
    #[arg(required = true, num_args = 1..)]
    name: Vec<String>,
  },
  DeleteCategory { id: String },
  /// Upload a product image
  Upload { file: PathBuf },

  /// Resolve a route such as "#/success/ANS-..."
  Go { route: String },
  /// Print the database setup script
  SetupSql,
  /// Print the statement that makes an account an admin
  GrantAdmin { email: String },
  #[command(alias = "exit")]
  Quit,
}

/// Product fields; absent flags keep the current value.
#[derive(Args, Debug, Default, PartialEq)]
struct ProductArgs {
  #[arg(long)]
  name: Option<String>,
  #[arg(long)]
  description: Option<String>,
  /// Major units, e.g. 149.99
  #[arg(long)]
  price: Option<Money>,
  #[arg(long)]
  stock: Option<u32>,
  #[arg(long)]
  category: Option<String>,
  #[arg(long)]
  sku: Option<String>,
  #[arg(long)]
  currency: Option<String>,
  #[arg(long = "image")]
  image_url: Option<String>,
}

impl ProductArgs {
  fn apply(self, mut form: ProductForm) -> ProductForm {
    if let Some(name) = self.name {
      form.name = name;
    }
    if let Some(description) = self.description {
      form.description = description;
    }
    if self.price.is_some() {
      form.price = self.price;
    }
    if let Some(stock) = self.stock {
      form.stock = stock;
    }
    if let Some(category) = self.category {
      form.category = category;
    }
    if let Some(sku) = self.sku {
      form.sku = sku;
    }
    if let Some(currency) = self.currency {
      form.currency = currency;
    }
    if let Some(image_url) = self.image_url {
      form.image_url = image_url;
    }
    form
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MethodArg {
  Upi,
  Card,
  Netbanking,
  Wallet,
  Cod,
}

impl From<MethodArg> for PaymentMethod {
  fn from(arg: MethodArg) -> Self {
    match arg {
      MethodArg::Upi => PaymentMethod::Upi,
      MethodArg::Card => PaymentMethod::Card,
      MethodArg::Netbanking => PaymentMethod::Netbanking,
      MethodArg::Wallet => PaymentMethod::Wallet,
      MethodArg::Cod => PaymentMethod::Cod,
    }
  }
}

/// Splits a line on whitespace; double quotes keep words together.
fn split_words(line: &str) -> Vec<String> {
  let mut words = Vec::new();
  let mut current = String::new();
  let mut in_word = false;
  let mut quoted = false;
  for c in line.chars() {
    match c {
      '"' => {
        quoted = !quoted;
        in_word = true;
      }
      c if c.is_whitespace() && !quoted => {
        if in_word {
          words.push(std::mem::take(&mut current));
          in_word = false;
        }
      }
      c => {
        current.push(c);
        in_word = true;
      }
    }
  }
  if in_word {
    words.push(current);
  }
  words
}

fn parse_line(line: &str) -> std::result::Result<Command, clap::Error> {
  ShellLine::try_parse_from(split_words(line)).map(|parsed| parsed.command)
}

pub struct Shell<'a> {
  store: &'a Storefront,
  lines: Lines<BufReader<Stdin>>,
  checkout: Option<CheckoutSession>,
}

impl<'a> Shell<'a> {
  pub fn new(store: &'a Storefront) -> Self {
    Self {
      store,
      lines: BufReader::new(tokio::io::stdin()).lines(),
      checkout: None,
    }
  }

  async fn prompt(&mut self, label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;
    Ok(self.lines.next_line().await?)
  }

  /// Reads commands until `quit` or end of input.
  pub async fn run(&mut self) -> Result<()> {
    println!("Ansar Tools storefront. Type 'help' for commands.");
    while let Some(line) = self.prompt("> ").await? {
      let line = line.trim().to_string();
      if line.is_empty() {
        continue;
      }
      let command = match parse_line(&line) {
        Ok(command) => command,
        Err(e) => {
          // Also covers `help`, which clap reports as an error kind.
          if let Err(io) = e.print() {
            warn!(error = %io, "Failed to print command help.");
          }
          continue;
        }
      };
      if command == Command::Quit {
        break;
      }
      match self.dispatch(command).await {
        Ok(()) => {}
        Err(ShellError::Store(e)) => {
          debug!(error = %e, command = %line, "Command failed.");
          println!("error: {}", e.user_message());
          if let Some(script) = e.setup_script() {
            println!("Run the setup script ('setup-sql' prints it, {} bytes).", script.len());
          }
        }
        Err(ShellError::Message(msg)) => println!("{}", msg),
      }
    }
    Ok(())
  }

  async fn dispatch(&mut self, command: Command) -> std::result::Result<(), ShellError> {
    match command {
      Command::Products {
        category,
        search,
        sort,
        page,
      } => self.list_products(CatalogQuery {
        category,
        search,
        sort: SortOrder::from_filter(sort.as_deref()),
        page,
      }),
      Command::Categories => {
        for category in self.store.catalog().categories() {
          println!("{:<10} {}", category.id, category.name);
        }
      }
      Command::Show { id } => {
        let product = self.product(&id)?;
        println!("{} [{}] {}", product.name, product.sku, product.category);
        println!("  {}", product.description);
        println!("  {} {} | stock {} | rating {:.1}", product.currency, product.price, product.stock, product.rating);
      }
      Command::Retry => {
        self.store.catalog().retry().await?;
        println!("Catalog reloaded: {} products.", self.store.catalog().products().len());
      }

      Command::Add { id, qty } => {
        let product = self.product(&id)?;
        self.store.cart().add_to_cart(&product, qty);
        println!("Added {} x {}. Cart: {} items.", qty.max(1), product.name, self.store.cart().item_count());
      }
      Command::Qty { id, qty } => {
        self.store.cart().update_quantity(&id, qty);
        self.print_cart();
      }
      Command::Inc { id } => {
        self.store.cart().increment(&id);
        self.print_cart();
      }
      Command::Dec { id } => {
        self.store.cart().decrement(&id);
        self.print_cart();
      }
      Command::Remove { id } => {
        self.store.cart().remove_from_cart(&id);
        self.print_cart();
      }
      Command::Cart => self.print_cart(),
      Command::Clear => {
        self.store.cart().clear_cart();
        println!("Cart cleared.");
      }

      Command::Signup { email, password, name } => {
        let name = name.join(" ");
        self.store.session().signup(&email, &password, &name, UserRole::Customer).await?;
        let user = self.store.session().init().await;
        println!("Welcome, {}.", user.map(|u| u.name).unwrap_or(name));
      }
      Command::Login { email, password } => {
        let user = self.store.session().login(&email, &password).await?;
        println!("Signed in as {} ({}).", user.name, user.role);
      }
      Command::AdminLogin { email, password } => {
        let user = self.store.session().login_as_admin(&email, &password).await?;
        println!("Admin session for {}.", user.name);
      }
      Command::Logout => {
        self.store.session().logout().await;
        self.checkout = None;
        println!("Signed out.");
      }
      Command::Whoami => match self.store.session().user() {
        Some(user) => println!("{} <{}> {}", user.name, user.email, user.role),
        None => println!("Not signed in."),
      },
      Command::MyOrders => {
        let user = self
          .store
          .session()
          .user()
          .ok_or_else(|| ShellError::Message("Sign in to see your orders.".to_string()))?;
        print_orders(&self.store.orders().orders_for_user(&user.id));
      }

      Command::Checkout => self.begin_checkout().await?,
      Command::Back => match self.checkout.as_mut() {
        Some(session) => {
          session.back();
          println!("Back to shipping details. Run 'checkout' to edit them.");
        }
        None => println!("No checkout in progress."),
      },
      Command::Pay { method } => {
        let session = self
          .checkout
          .as_ref()
          .filter(|s| s.step() == CheckoutStep::Payment)
          .ok_or_else(|| ShellError::Message("Run 'checkout' first.".to_string()))?;
        println!("Opening secure checkout...");
        let placed = self.store.place_order(session, method.into()).await?;
        self.checkout = None;
        println!(
          "Order {} placed: {} {}. Next: {}",
          placed.order.order_number,
          placed.order.currency,
          placed.order.total_amount,
          placed.confirmation.to_hash()
        );
      }

      Command::Track { order_number } => match self.store.track(&order_number) {
        Some(order) => print_tracking(&order),
        None => println!("Order not found. Please check the order number."),
      },

      Command::Admin => {
        if let Err(route) = self.store.enter_admin().await {
          return Err(ShellError::Message(format!("Admins only. Sign in at {}", route.to_hash())));
        }
        let stats = self.store.admin().dashboard_stats()?;
        println!(
          "Revenue INR {} | orders {} | pending shipments {} | low stock {}",
          stats.total_revenue, stats.total_orders, stats.pending_shipments, stats.low_stock_items
        );
        for product in self.store.catalog().low_stock() {
          println!("  low stock: {} ({} left)", product.name, product.stock);
        }
      }
      Command::Orders { term } => print_orders(&self.store.admin().search_orders(&term.join(" "))?),
      Command::Ship {
        order_number,
        tracking,
        courier,
      } => {
        let order = self.order(&order_number)?;
        self.store.admin().ship_order(order.id, &tracking, courier.as_deref()).await?;
        println!("Order {} marked SHIPPED.", order.order_number);
      }
      Command::Deliver { order_number } => {
        let order = self.order(&order_number)?;
        self.store.admin().complete_order(order.id).await?;
        println!("Order {} marked DELIVERED.", order.order_number);
      }
      Command::NewProduct(fields) => {
        self.store.admin().save_product(fields.apply(ProductForm::default()), None).await?;
        println!("Product saved.");
      }
      Command::EditProduct { id, fields } => {
        let current = self.product(&id)?;
        let form = fields.apply(ProductForm::from_product(&current));
        self.store.admin().save_product(form, Some(&id)).await?;
        println!("Product updated.");
      }
      Command::DeleteProduct { id } => {
        self
          .store
          .admin()
          .delete_product(&id)
          .await
          .map_err(|e| ShellError::Message(delete_failure_message(&e)))?;
        println!("Product deleted.");
      }
      Command::AddCategory { name } => {
        self.store.admin().add_category(&name.join(" ")).await?;
        println!("Category added.");
      }
      Command::DeleteCategory { id } => {
        self.store.admin().delete_category(&id).await?;
        println!("Category deleted.");
      }
      Command::Upload { file } => {
        let bytes = tokio::fs::read(&file)
          .await
          .map_err(|e| ShellError::Message(format!("Could not read {}: {}", file.display(), e)))?;
        let url = self.store.admin().upload_image(&file.to_string_lossy(), bytes).await?;
        println!("Uploaded: {}", url);
      }

      Command::Go { route } => {
        let route = Route::parse(&route);
        println!("{} -> {:?}", route.to_hash(), route);
      }
      Command::SetupSql => println!("{}", SETUP_SQL),
      Command::GrantAdmin { email } => println!("{}", grant_admin_sql(&email)),
      // Handled by the read loop.
      Command::Quit => {}
    }
    Ok(())
  }

  fn product(&self, id: &str) -> std::result::Result<Product, ShellError> {
    self
      .store
      .catalog()
      .product(id)
      .ok_or_else(|| ShellError::Message(format!("No product with id '{}'.", id)))
  }

  fn order(&self, order_number: &str) -> std::result::Result<Order, ShellError> {
    self
      .store
      .orders()
      .get_order_by_number(order_number)
      .ok_or_else(|| ShellError::Message(format!("No order '{}'.", order_number)))
  }

  fn list_products(&self, query: CatalogQuery) {
    let catalog = self.store.catalog();
    if let Some(message) = catalog.error() {
      println!("Could not load products: {}. Type 'retry'.", message);
      return;
    }
    let page = catalog.query(&query);
    println!(
      "{} | page {}/{} | {} products",
      query.category.as_deref().unwrap_or(ALL_CATEGORIES),
      page.page,
      page.total_pages,
      page.total_items
    );
    for product in &page.items {
      println!(
        "{:<38} {:<34} {:>10} {:<10} stock {}",
        product.id, product.name, product.price, product.category, product.stock
      );
    }
  }

  fn print_cart(&self) {
    let cart = self.store.cart();
    if cart.is_empty() {
      println!("Your cart is empty.");
      return;
    }
    for item in cart.items() {
      println!(
        "{:<38} {:<34} {:>3} x {:>10} = {:>10}",
        item.product.id,
        item.product.name,
        item.quantity,
        item.product.price,
        item.line_total()
      );
    }
    println!("Subtotal INR {} ({} items)", cart.total(), cart.item_count());
  }

  async fn begin_checkout(&mut self) -> std::result::Result<(), ShellError> {
    let mut session = match self.checkout.take() {
      Some(session) => session,
      None => self.store.enter_checkout().map_err(|route| match route {
        Route::Cart => ShellError::Message("Your cart is empty.".to_string()),
        other => ShellError::Message(format!("Please sign in to continue ({}).", other.to_hash())),
      })?,
    };

    println!("Shipping details (enter keeps the current value):");
    for (idx, label) in SHIPPING_FIELDS.iter().enumerate() {
      let current = shipping_field(session.shipping_mut(), idx).clone();
      let answer = self
        .prompt(&format!("  {} [{}]: ", label, current))
        .await?
        .unwrap_or_default();
      if !answer.trim().is_empty() {
        *shipping_field(session.shipping_mut(), idx) = answer.trim().to_string();
      }
    }

    let result = session.submit_shipping();
    self.checkout = Some(session);
    result?;

    let subtotal = self.store.cart().total();
    let total = subtotal.with_tax(storefront::checkout::GST_PERCENT);
    println!(
      "Subtotal INR {} + GST INR {} = INR {}. Type 'pay' to continue.",
      subtotal,
      Money::from_minor(total.minor() - subtotal.minor()),
      total
    );
    Ok(())
  }
}

const SHIPPING_FIELDS: [&str; 6] = ["Full name", "Email", "Address", "City", "ZIP code", "Country"];

fn shipping_field(shipping: &mut ShippingDetails, idx: usize) -> &mut String {
  match idx {
    0 => &mut shipping.full_name,
    1 => &mut shipping.email,
    2 => &mut shipping.address,
    3 => &mut shipping.city,
    4 => &mut shipping.zip_code,
    _ => &mut shipping.country,
  }
}

fn print_orders(orders: &[Order]) {
  if orders.is_empty() {
    println!("No orders.");
  }
  for order in orders {
    println!(
      "{:<20} {:<10} {:>12} {:<28} {}",
      order.order_number,
      order.status,
      order.total_amount,
      order.customer_email,
      order.created_at.format("%Y-%m-%d %H:%M")
    );
  }
}

fn print_tracking(order: &Order) {
  println!("Order {} is {}.", order.order_number, order.status);
  let stages = ["Pending", "Paid", "Processing", "Shipped", "Delivered"];
  match order.status.tracking_step() {
    Some(step) => {
      let bar: Vec<String> = stages
        .iter()
        .enumerate()
        .map(|(i, name)| if i <= step { format!("[{}]", name) } else { name.to_string() })
        .collect();
      println!("  {}", bar.join(" > "));
    }
    None => println!("  This order was cancelled."),
  }
  if let (Some(tracking), Some(courier)) = (&order.tracking_number, &order.courier_name) {
    println!("  {} tracking number {}", courier, tracking);
  }
  for line in &order.items {
    println!("  {} x {} @ {}", line.quantity, line.name, line.unit_price);
  }
}

enum ShellError {
  Store(StoreError),
  Message(String),
}

impl From<StoreError> for ShellError {
  fn from(err: StoreError) -> Self {
    ShellError::Store(err)
  }
}

impl From<crate::errors::AppError> for ShellError {
  fn from(err: crate::errors::AppError) -> Self {
    ShellError::Message(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use clap::error::ErrorKind;

  #[test]
  fn cart_commands_parse_typed_quantities() {
    assert_eq!(
      parse_line("add 1").unwrap(),
      Command::Add {
        id: "1".into(),
        qty: 1
      }
    );
    assert_eq!(
      parse_line("qty 3 4").unwrap(),
      Command::Qty {
        id: "3".into(),
        qty: 4
      }
    );

    let err = parse_line("add 1 2x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
    assert!(parse_line("qty 3 -1").is_err());
    assert!(parse_line("qty 3").is_err());
  }

  #[test]
  fn product_flags_take_quoted_values_and_decimal_prices() {
    let parsed = parse_line(r#"new-product --name "Laser Level" --price 12999.50 --stock 4 --category "Hand Tools""#).unwrap();
    let Command::NewProduct(fields) = parsed else {
      panic!("expected new-product, got {:?}", parsed);
    };
    assert_eq!(fields.name.as_deref(), Some("Laser Level"));
    assert_eq!(fields.price, Some(Money::from_minor(1_299_950)));
    assert_eq!(fields.category.as_deref(), Some("Hand Tools"));

    let form = fields.apply(ProductForm::default());
    assert_eq!(form.stock, 4);
    assert_eq!(form.price, Some(Money::from_minor(1_299_950)));

    assert!(parse_line("new-product --price 12,999").is_err());
    assert!(parse_line("edit-product 1 --stock lots").is_err());
  }

  #[test]
  fn catalog_and_checkout_commands() {
    assert_eq!(
      parse_line(r#"products --category "Hand Tools" --sort new --page 2"#).unwrap(),
      Command::Products {
        category: Some("Hand Tools".into()),
        search: String::new(),
        sort: Some("new".into()),
        page: 2,
      }
    );
    assert!(parse_line("products --sort cheapest").is_err());
    assert!(parse_line("products --page two").is_err());

    assert_eq!(parse_line("pay").unwrap(), Command::Pay { method: MethodArg::Upi });
    assert_eq!(parse_line("pay cod").unwrap(), Command::Pay { method: MethodArg::Cod });
    assert!(parse_line("pay cheque").is_err());
    assert_eq!(PaymentMethod::from(MethodArg::Netbanking), PaymentMethod::Netbanking);

    assert_eq!(
      parse_line("signup asha@example.com secret-1 Asha Rao").unwrap(),
      Command::Signup {
        email: "asha@example.com".into(),
        password: "secret-1".into(),
        name: vec!["Asha".into(), "Rao".into()],
      }
    );
    assert!(parse_line("signup asha@example.com secret-1").is_err());
  }

  #[test]
  fn quit_exit_and_unknown_commands() {
    assert_eq!(parse_line("quit").unwrap(), Command::Quit);
    assert_eq!(parse_line("exit").unwrap(), Command::Quit);
    assert_eq!(parse_line("fly").unwrap_err().kind(), ErrorKind::InvalidSubcommand);
    assert_eq!(parse_line("help").unwrap_err().kind(), ErrorKind::DisplayHelp);
  }

  #[test]
  fn words_split_on_whitespace_outside_quotes() {
    assert_eq!(split_words("  add   1 2 "), vec!["add", "1", "2"]);
    assert_eq!(split_words(r#"add-category "Power Tools""#), vec!["add-category", "Power Tools"]);
    assert_eq!(split_words(r#"x """#), vec!["x", ""]);
  }
}
