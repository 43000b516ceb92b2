//! Cart line items.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::state::CartError;

/// Highest unit price (or original price) a line may carry.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000, 0, 0, false, 0);

/// Highest quantity a single line may hold.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// One product/variant entry in the cart.
///
/// Serialized in the camelCase shape the storefront persists:
/// `{id, name, image, price, originalPrice?, quantity, category, packInfo}`,
/// with prices as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Stable id for the product + variant combination.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Image URL or asset reference.
    #[serde(default)]
    pub image: String,
    /// Unit price.
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// Pre-discount unit price, when the item is on sale.
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub original_price: Option<Decimal>,
    /// Number of units. Always at least 1 while the item is in a cart.
    pub quantity: u32,
    /// Category label.
    #[serde(default)]
    pub category: String,
    /// Pack or variant descriptor (e.g. "Pack of 6").
    #[serde(default)]
    pub pack_info: String,
}

impl CartItem {
    /// Create a single-unit item with no image, category or pack descriptor.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image: String::new(),
            price,
            original_price: None,
            quantity: 1,
            category: String::new(),
            pack_info: String::new(),
        }
    }

    /// Set the quantity.
    #[must_use]
    pub const fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Build the stable line id for a product and its variant/pack.
    ///
    /// Adding the same product in the same pack twice must land on the same
    /// line, so the id is derived from both parts rather than generated.
    #[must_use]
    pub fn line_id(product_id: &str, variant: &str) -> String {
        let variant = variant.trim();
        if variant.is_empty() {
            product_id.to_owned()
        } else {
            format!("{product_id}:{}", variant.to_lowercase().replace(' ', "-"))
        }
    }

    /// Check the line against the price and quantity limits.
    ///
    /// # Errors
    ///
    /// Returns `CartError::PriceOutOfRange` for a negative or oversized
    /// price or original price, and `CartError::QuantityOutOfRange` for a
    /// quantity above [`MAX_LINE_QUANTITY`].
    pub fn check_bounds(&self) -> Result<(), CartError> {
        let price_ok = |price: &Decimal| !price.is_sign_negative() && *price <= MAX_UNIT_PRICE;

        if !price_ok(&self.price) || !self.original_price.as_ref().is_none_or(price_ok) {
            return Err(CartError::PriceOutOfRange(self.id.clone()));
        }
        if self.quantity > MAX_LINE_QUANTITY {
            return Err(CartError::QuantityOutOfRange(self.id.clone()));
        }
        Ok(())
    }

    /// Unit price times quantity, or `None` if the product overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(self.quantity))
    }

    /// Savings against the original price for the whole line, if discounted.
    #[must_use]
    pub fn line_savings(&self) -> Option<Decimal> {
        self.original_price
            .filter(|original| *original > self.price)
            .and_then(|original| original.checked_sub(self.price))
            .and_then(|unit| unit.checked_mul(Decimal::from(self.quantity)))
    }
}
