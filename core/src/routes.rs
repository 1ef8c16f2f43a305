// core/src/routes.rs

//! The storefront's hash routes and the guards that redirect between them.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
  /// `#/`, optionally `?filter=new|featured`.
  Storefront { filter: Option<String> },
  Cart,
  Checkout,
  OrderSuccess { order_number: String },
  Tracking,
  Admin,
  /// `#/login`, `?role=admin` for the admin gate, `return_to` for where to go afterwards.
  Login { admin: bool, return_to: Option<String> },
  Policy,
  Terms,
  Privacy,
  Contact,
}

impl Route {
  pub fn home() -> Self {
    Route::Storefront { filter: None }
  }

  /// Parses `#/path?query`. Anything unrecognised lands on the storefront.
  pub fn parse(raw: &str) -> Self {
    let trimmed = raw.trim().trim_start_matches('#');
    let (path, query) = trimmed.split_once('?').unwrap_or((trimmed, ""));
    let params: Vec<(&str, &str)> = query
      .split('&')
      .filter(|pair| !pair.is_empty())
      .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
      .collect();
    let param = |key: &str| {
      params
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
    };

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
      [] => Route::Storefront { filter: param("filter") },
      ["cart"] => Route::Cart,
      ["checkout"] => Route::Checkout,
      ["success", number] => Route::OrderSuccess {
        order_number: (*number).to_string(),
      },
      ["tracking"] => Route::Tracking,
      ["admin"] => Route::Admin,
      ["login"] => Route::Login {
        admin: param("role").as_deref() == Some("admin"),
        return_to: param("return_to"),
      },
      ["policy"] => Route::Policy,
      ["terms"] => Route::Terms,
      ["privacy"] => Route::Privacy,
      ["contact"] => Route::Contact,
      _ => Route::home(),
    }
  }

  pub fn to_hash(&self) -> String {
    match self {
      Route::Storefront { filter: None } => "#/".to_string(),
      Route::Storefront { filter: Some(f) } => format!("#/?filter={}", f),
      Route::Cart => "#/cart".to_string(),
      Route::Checkout => "#/checkout".to_string(),
      Route::OrderSuccess { order_number } => format!("#/success/{}", order_number),
      Route::Tracking => "#/tracking".to_string(),
      Route::Admin => "#/admin".to_string(),
      Route::Login { admin, return_to } => {
        let mut query = Vec::new();
        if *admin {
          query.push("role=admin".to_string());
        }
        if let Some(target) = return_to {
          query.push(format!("return_to={}", target));
        }
        if query.is_empty() {
          "#/login".to_string()
        } else {
          format!("#/login?{}", query.join("&"))
        }
      }
      Route::Policy => "#/policy".to_string(),
      Route::Terms => "#/terms".to_string(),
      Route::Privacy => "#/privacy".to_string(),
      Route::Contact => "#/contact".to_string(),
    }
  }
}

impl fmt::Display for Route {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_hash())
  }
}

/// Where checkout should send the shopper instead, if anywhere.
pub fn checkout_redirect(cart_empty: bool, authenticated: bool, require_login: bool) -> Option<Route> {
  if cart_empty {
    return Some(Route::Cart);
  }
  if require_login && !authenticated {
    return Some(Route::Login {
      admin: false,
      return_to: Some("/checkout".to_string()),
    });
  }
  None
}

/// Where the admin area should send a non-admin.
pub fn admin_redirect(authenticated: bool, is_admin: bool) -> Option<Route> {
  if authenticated && is_admin {
    None
  } else {
    Some(Route::Login {
      admin: true,
      return_to: None,
    })
  }
}
