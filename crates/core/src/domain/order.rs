// Order Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Product identifier (unique within an order)
pub type ProductId = i64;

/// Line quantity
pub type Quantity = i64;

/// Order identifier (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct OrderId(i64);

impl OrderId {
    pub fn new(id: i64) -> Result<Self> {
        if id <= 0 {
            return Err(DomainError::InvalidOrderId(id));
        }
        Ok(Self(id))
    }

    pub fn get(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for OrderId {
    type Error = DomainError;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<OrderId> for i64 {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order header row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderHeader {
    pub order_id: OrderId,
    pub customer_name: String,
    pub address: String,
}

/// Order line row, keyed by (order_id, product_id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub designation: String,
    pub unit_price: f64,
    pub quantity: Quantity,
}

/// Header plus its lines, lines ordered by product id ascending
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub header: OrderHeader,
    pub lines: Vec<OrderLine>,
}

impl Order {
    pub fn line(&self, product_id: ProductId) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.product_id == product_id)
    }
}

/// One requested quantity change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEdit {
    pub product_id: ProductId,
    pub quantity: Quantity,
}

impl FromStr for LineEdit {
    type Err = DomainError;

    /// Parses `PRODUCT=QUANTITY` (e.g. `1=9`)
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DomainError::InvalidLineEdit(s.to_string());
        let (product, quantity) = s.split_once('=').ok_or_else(invalid)?;
        Ok(Self {
            product_id: product.trim().parse().map_err(|_| invalid())?,
            quantity: quantity.trim().parse().map_err(|_| invalid())?,
        })
    }
}

/// Edit request: the input of one unit of work
///
/// The address update is always issued, even when `address` is empty or
/// equal to the stored value. Line edits keep insertion order and product
/// ids stay unique: setting a product again replaces the earlier entry and
/// moves it to the end.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EditRequest {
    pub order_id: OrderId,
    pub address: String,
    lines: Vec<LineEdit>,
}

impl EditRequest {
    pub fn new(order_id: OrderId, address: impl Into<String>) -> Self {
        Self {
            order_id,
            address: address.into(),
            lines: Vec::new(),
        }
    }

    /// Builder-style variant of [`EditRequest::set_quantity`]
    pub fn with_line(mut self, product_id: ProductId, quantity: Quantity) -> Self {
        self.set_quantity(product_id, quantity);
        self
    }

    /// Set the new quantity for a product (last write wins)
    pub fn set_quantity(&mut self, product_id: ProductId, quantity: Quantity) {
        self.lines.retain(|l| l.product_id != product_id);
        self.lines.push(LineEdit {
            product_id,
            quantity,
        });
    }

    pub fn lines(&self) -> &[LineEdit] {
        &self.lines
    }

    /// True when the request carries neither an address nor line edits
    pub fn is_blank(&self) -> bool {
        self.address.is_empty() && self.lines.is_empty()
    }
}
