//! Cart data model.
//!
//! The snapshot is the client's cache of the server-owned cart. Line totals
//! and the grand total are always derived from unit price and quantity and
//! are never stored.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use std::ops::Mul;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

/// Server-assigned key of a cart line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Catalog key of a product (meal) that can be added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Line quantity, always within `[Quantity::MIN, Quantity::MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(into = "u8")]
pub struct Quantity(u8);

impl Quantity {
    pub const MIN: Quantity = Quantity(1);
    pub const MAX: Quantity = Quantity(25);

    /// `None` when `value` is outside the allowed range.
    pub fn new(value: i64) -> Option<Self> {
        if (i64::from(Self::MIN.0)..=i64::from(Self::MAX.0)).contains(&value) {
            u8::try_from(value).ok().map(Self)
        } else {
            None
        }
    }

    /// Pull `value` into range: below the minimum becomes 1, above the
    /// maximum becomes 25.
    pub fn clamped(value: i64) -> Self {
        let bounded = value.clamp(i64::from(Self::MIN.0), i64::from(Self::MAX.0));
        Self(u8::try_from(bounded).unwrap_or(Self::MAX.0))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn increment(self) -> Self {
        Self::clamped(i64::from(self.0) + 1)
    }

    pub fn decrement(self) -> Self {
        Self::clamped(i64::from(self.0) - 1)
    }
}

impl From<Quantity> for u8 {
    fn from(q: Quantity) -> Self {
        q.0
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = i64::deserialize(deserializer)?;
        Quantity::new(raw).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "quantity {raw} outside {}..={}",
                Quantity::MIN.0,
                Quantity::MAX.0
            ))
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Money amount in integer cents. Displays as `$D.CC`. Arithmetic saturates.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: {0:?}")]
pub struct ParseMoneyError(String);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl FromStr for Money {
    type Err = ParseMoneyError;

    /// Accepts `5`, `5.9`, `5.99`, `$5.99`; extra fraction digits round half up.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseMoneyError(s.to_string());
        let trimmed = s.trim();
        let digits = trimmed.strip_prefix('$').unwrap_or(trimmed).trim();
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let whole: i64 = whole.parse().map_err(|_| err())?;

        let mut frac = fraction.bytes().map(|b| i64::from(b - b'0'));
        let tenths = frac.next().unwrap_or(0);
        let hundredths = frac.next().unwrap_or(0);
        let round_up = frac.next().is_some_and(|d| d >= 5);

        let cents = whole
            .checked_mul(100)
            .and_then(|c| c.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(err)?;
        Ok(Self(cents))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Mul<Quantity> for Money {
    type Output = Money;

    fn mul(self, rhs: Quantity) -> Money {
        Money(self.0.saturating_mul(i64::from(rhs.0)))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Display data for a product being added: drives the confirmation popup
/// and seeds a new line when the server confirms the add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub unit_price: Money,
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub item_id: ItemId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: Quantity,
}

impl CartLineItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// Ordered client-side cache of the cart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartSnapshot {
    items: Vec<CartLineItem>,
}

impl CartSnapshot {
    pub fn new(items: Vec<CartLineItem>) -> Self {
        let mut snapshot = Self::default();
        for item in items {
            snapshot.upsert(item);
        }
        snapshot
    }

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn line(&self, item_id: &ItemId) -> Option<&CartLineItem> {
        self.items.iter().find(|line| &line.item_id == item_id)
    }

    /// Replace the line with the same id in place, or append it.
    pub fn upsert(&mut self, line: CartLineItem) {
        match self.items.iter_mut().find(|l| l.item_id == line.item_id) {
            Some(existing) => *existing = line,
            None => self.items.push(line),
        }
    }

    /// Returns the updated line, or `None` if no line has that id.
    pub fn set_quantity(&mut self, item_id: &ItemId, quantity: Quantity) -> Option<&CartLineItem> {
        let line = self.items.iter_mut().find(|l| &l.item_id == item_id)?;
        line.quantity = quantity;
        Some(line)
    }

    pub fn remove(&mut self, item_id: &ItemId) -> Option<CartLineItem> {
        let index = self.items.iter().position(|l| &l.item_id == item_id)?;
        Some(self.items.remove(index))
    }

    pub fn grand_total(&self) -> Money {
        self.items.iter().map(CartLineItem::line_total).sum()
    }
}
