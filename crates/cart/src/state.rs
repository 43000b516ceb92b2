//! Cart state and the reducer that mutates it.
//!
//! `total_items` and `total_price` are never patched in place: every action
//! rebuilds them from the item list, and deserialization does the same, so a
//! persisted snapshot with stale totals cannot leak into a live cart.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::item::CartItem;

/// Reasons a cart is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// A line's price or original price is negative or above the limit.
    #[error("price out of range for item {0}")]
    PriceOutOfRange(String),
    /// A line's quantity is above the limit.
    #[error("quantity out of range for item {0}")]
    QuantityOutOfRange(String),
    /// The cart total cannot be represented.
    #[error("cart total out of range")]
    TotalOutOfRange,
}

/// Actions accepted by the cart reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add an item, merging into an existing line with the same id.
    ///
    /// A quantity of 0 on the incoming item is treated as 1.
    AddItem(CartItem),
    /// Remove the line with the given id. No-op if absent.
    RemoveItem(String),
    /// Set the quantity of a line. `quantity <= 0` removes the line.
    UpdateQuantity {
        /// Line id.
        id: String,
        /// New quantity.
        quantity: i64,
    },
    /// Remove every line.
    ClearCart,
    /// Replace the cart with a rehydrated state.
    LoadCart(CartState),
}

/// Client-held cart: line items plus derived totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CartSnapshot")]
pub struct CartState {
    items: Vec<CartItem>,
    total_items: u32,
    #[serde(with = "rust_decimal::serde::float")]
    total_price: Decimal,
}

/// Wire form of a cart as it arrives from storage or a client.
///
/// Totals are accepted for compatibility but ignored. Lines outside the
/// price or quantity limits fail deserialization.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CartSnapshot {
    #[serde(default)]
    items: Vec<CartItem>,
}

impl TryFrom<CartSnapshot> for CartState {
    type Error = CartError;

    fn try_from(snapshot: CartSnapshot) -> Result<Self, Self::Error> {
        Self::try_from_items(snapshot.items)
    }
}

impl CartState {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from raw line items.
    ///
    /// Lines with a zero quantity are dropped and lines sharing an id are
    /// merged, so the result satisfies the same invariants as a cart built
    /// through actions.
    ///
    /// # Errors
    ///
    /// Returns a `CartError` if any merged line breaks the price or quantity
    /// limits, or the total cannot be represented.
    pub fn try_from_items(items: impl IntoIterator<Item = CartItem>) -> Result<Self, CartError> {
        let mut merged: Vec<CartItem> = Vec::new();
        for item in items.into_iter().filter(|item| item.quantity > 0) {
            match merged.iter_mut().find(|line| line.id == item.id) {
                Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
                None => merged.push(item),
            }
        }
        let mut state = Self {
            items: merged,
            ..Self::default()
        };
        state.recompute()?;
        Ok(state)
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Look up a line by id.
    #[must_use]
    pub fn item(&self, id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Sum of line quantities.
    #[must_use]
    pub const fn total_items(&self) -> u32 {
        self.total_items
    }

    /// Sum of unit price times quantity.
    #[must_use]
    pub const fn total_price(&self) -> Decimal {
        self.total_price
    }

    /// Sum of savings against original prices.
    #[must_use]
    pub fn total_savings(&self) -> Decimal {
        self.items
            .iter()
            .filter_map(CartItem::line_savings)
            .try_fold(Decimal::ZERO, Decimal::checked_add)
            .unwrap_or(Decimal::MAX)
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Apply an action and return the resulting state.
    #[must_use]
    pub fn reduce(mut self, action: CartAction) -> Self {
        self.apply(action);
        self
    }

    /// Apply an action in place.
    ///
    /// An action that would push a line past the price or quantity limits
    /// is dropped and the cart is left as it was.
    pub fn apply(&mut self, action: CartAction) {
        let mut next = self.clone();
        match action {
            CartAction::AddItem(item) => next.add_item(item),
            CartAction::RemoveItem(id) => next.items.retain(|item| item.id != id),
            CartAction::UpdateQuantity { id, quantity } => next.update_quantity(&id, quantity),
            CartAction::ClearCart => next.items.clear(),
            CartAction::LoadCart(state) => next.items = state.items,
        }

        match next.recompute() {
            Ok(()) => *self = next,
            Err(e) => warn!(error = %e, "Cart action rejected"),
        }
    }

    fn add_item(&mut self, mut item: CartItem) {
        let added = item.quantity.max(1);
        match self.items.iter_mut().find(|line| line.id == item.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(added),
            None => {
                item.quantity = added;
                self.items.push(item);
            }
        }
    }

    fn update_quantity(&mut self, id: &str, quantity: i64) {
        if quantity <= 0 {
            self.items.retain(|item| item.id != id);
            return;
        }
        if let Some(line) = self.items.iter_mut().find(|line| line.id == id) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    fn recompute(&mut self) -> Result<(), CartError> {
        let mut total_items = 0u32;
        let mut total_price = Decimal::ZERO;

        for item in &self.items {
            item.check_bounds()?;
            total_items = total_items.saturating_add(item.quantity);
            total_price = item
                .line_total()
                .and_then(|line| total_price.checked_add(line))
                .ok_or(CartError::TotalOutOfRange)?;
        }

        self.total_items = total_items;
        self.total_price = total_price;
        Ok(())
    }
}
