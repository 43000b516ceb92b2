//! Avara cart state.
//!
//! The cart is a small, closed state machine: every mutation goes through a
//! [`CartAction`], and the derived totals are recomputed from the line items
//! after each one. [`CartStore`] owns a [`CartState`] and writes it through a
//! [`CartStorage`] backend after every dispatch, so a reload rehydrates the
//! same cart.
//!
//! # Example
//!
//! ```rust
//! use avara_cart::{CartAction, CartItem, CartStore, MemoryStorage};
//! use rust_decimal::Decimal;
//!
//! let mut store = CartStore::open(MemoryStorage::new());
//! let item = CartItem::new("argan-oil-50ml", "Argan Oil", Decimal::new(1000, 2));
//! store.dispatch(CartAction::AddItem(item.clone()));
//! store.dispatch(CartAction::AddItem(item));
//!
//! assert_eq!(store.state().total_items(), 2);
//! assert_eq!(store.state().total_price(), Decimal::new(2000, 2));
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod item;
pub mod state;
pub mod storage;
pub mod store;

pub use item::{CartItem, MAX_LINE_QUANTITY, MAX_UNIT_PRICE};
pub use state::{CartAction, CartError, CartState};
pub use storage::{CartStorage, FileStorage, MemoryStorage, StorageError};
pub use store::{CART_STORAGE_KEY, CartStore};
