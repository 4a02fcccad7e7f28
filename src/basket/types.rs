//! Basket domain types.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Basket line identifier.
///
/// Assigned by the server in remote mode (numeric on the wire) and
/// synthesized locally in local mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LineId(String);

impl LineId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for LineId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for LineId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
      Number(u64),
      Text(String),
    }

    Ok(match Raw::deserialize(deserializer)? {
      Raw::Number(n) => Self(n.to_string()),
      Raw::Text(s) => Self(s),
    })
  }
}

/// Catalog product identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub u64);

impl fmt::Display for ProductId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Authenticated user identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UserId(String);

impl UserId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for UserId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl<'de> Deserialize<'de> for UserId {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    LineId::deserialize(deserializer).map(|id| Self(id.0))
  }
}

/// The product a basket line refers to.
///
/// Only the id is guaranteed; a product that has since been deleted or
/// changed may come back without a name or price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
  pub id: ProductId,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
}

impl ProductRef {
  pub fn new(id: ProductId) -> Self {
    Self {
      id,
      name: None,
      price: None,
      image: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn with_price(mut self, price: f64) -> Self {
    self.price = Some(price);
    self
  }
}

/// One product and its quantity in the basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasketLine {
  pub id: LineId,
  pub product: ProductRef,
  pub quantity: u32,
}

impl BasketLine {
  /// Price times quantity; zero when the product has no known price.
  pub fn subtotal(&self) -> f64 {
    self
      .product
      .price
      .map(|price| price * f64::from(self.quantity))
      .unwrap_or(0.0)
  }
}

/// Sum of line subtotals.
pub fn basket_total(lines: &[BasketLine]) -> f64 {
  lines.iter().map(BasketLine::subtotal).sum()
}

/// Which backing the basket currently operates against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BasketMode {
  /// Guest basket in the durable client-side store
  Local,
  /// Server-side basket of an authenticated user
  Remote { user: UserId },
}
