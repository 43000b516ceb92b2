//! Cart store: the reducer plus write-through persistence.

use tracing::{debug, warn};

use crate::item::CartItem;
use crate::state::{CartAction, CartState};
use crate::storage::CartStorage;

/// Storage key the cart is persisted under.
pub const CART_STORAGE_KEY: &str = "avara_cart";

/// Owns the cart state and persists it after every dispatched action.
///
/// All mutations go through [`CartStore::dispatch`], which takes `&mut self`,
/// so writes are serialized by construction. Persistence is fire-and-forget:
/// a failed write is logged and the in-memory state stays authoritative.
#[derive(Debug)]
pub struct CartStore<S> {
    state: CartState,
    storage: S,
}

impl<S: CartStorage> CartStore<S> {
    /// Open the store, rehydrating from storage.
    ///
    /// Missing, unreadable or corrupt stored data yields an empty cart.
    pub fn open(storage: S) -> Self {
        let state = match storage.get(CART_STORAGE_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<CartState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "Stored cart is corrupt, starting empty");
                    CartState::new()
                }
            },
            Ok(None) => CartState::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart, starting empty");
                CartState::new()
            }
        };

        debug!(
            items = state.items().len(),
            total_items = state.total_items(),
            "Cart rehydrated"
        );

        Self { state, storage }
    }

    /// Current cart state.
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// Apply an action, persist the result, and return the new state.
    pub fn dispatch(&mut self, action: CartAction) -> &CartState {
        self.state.apply(action);
        self.persist();
        &self.state
    }

    /// Add an item (see [`CartAction::AddItem`]).
    pub fn add_item(&mut self, item: CartItem) -> &CartState {
        self.dispatch(CartAction::AddItem(item))
    }

    /// Remove a line (see [`CartAction::RemoveItem`]).
    pub fn remove_item(&mut self, id: impl Into<String>) -> &CartState {
        self.dispatch(CartAction::RemoveItem(id.into()))
    }

    /// Set a line's quantity (see [`CartAction::UpdateQuantity`]).
    pub fn update_quantity(&mut self, id: impl Into<String>, quantity: i64) -> &CartState {
        self.dispatch(CartAction::UpdateQuantity {
            id: id.into(),
            quantity,
        })
    }

    /// Empty the cart.
    pub fn clear(&mut self) -> &CartState {
        self.dispatch(CartAction::ClearCart)
    }

    /// Give back the storage backend.
    pub fn into_storage(self) -> S {
        self.storage
    }

    fn persist(&self) {
        let serialized = match serde_json::to_string(&self.state) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(error = %e, "Failed to serialize cart");
                return;
            }
        };

        if let Err(e) = self.storage.set(CART_STORAGE_KEY, &serialized) {
            warn!(error = %e, "Failed to persist cart");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::storage::{FileStorage, MemoryStorage, StorageError};

    fn item(id: &str, cents: i64) -> CartItem {
        CartItem::new(id, id, Decimal::new(cents, 2))
    }

    /// Storage whose writes always fail.
    struct ReadOnlyStorage;

    impl CartStorage for ReadOnlyStorage {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Ok(None)
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[test]
    fn test_open_without_stored_cart_is_empty() {
        let store = CartStore::open(MemoryStorage::new());
        assert!(store.state().is_empty());
        assert_eq!(store.state().total_price(), Decimal::ZERO);
    }

    #[test]
    fn test_open_with_corrupt_cart_is_empty() {
        let storage = MemoryStorage::new();
        storage.set(CART_STORAGE_KEY, "{not json").unwrap();

        let store = CartStore::open(storage);
        assert!(store.state().is_empty());
    }

    #[test]
    fn test_dispatch_persists_and_reopen_rehydrates() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        store.add_item(item("A", 1000));
        store.add_item(item("A", 1000));
        store.add_item(item("B", 250).with_quantity(4));
        store.update_quantity("B", 2);
        let expected = store.state().clone();

        let reopened = CartStore::open(storage);
        assert_eq!(reopened.state(), &expected);
        assert_eq!(reopened.state().total_items(), 4);
        assert_eq!(reopened.state().total_price(), Decimal::new(25, 0));
    }

    #[test]
    fn test_clear_is_persisted() {
        let storage = MemoryStorage::new();
        let mut store = CartStore::open(storage.clone());
        store.add_item(item("A", 100));
        store.clear();

        let raw = storage.get(CART_STORAGE_KEY).unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"items": [], "totalItems": 0, "totalPrice": 0.0})
        );
    }

    #[test]
    fn test_failed_writes_keep_in_memory_state() {
        let mut store = CartStore::open(ReadOnlyStorage);
        let state = store.add_item(item("A", 300));
        assert_eq!(state.total_items(), 1);
        store.remove_item("A");
        assert!(store.state().is_empty());
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = CartStore::open(FileStorage::open(dir.path()).unwrap());
            store.add_item(item("A", 499).with_quantity(3));
        }

        let store = CartStore::open(FileStorage::open(dir.path()).unwrap());
        assert_eq!(store.state().total_items(), 3);
        assert_eq!(store.state().total_price(), Decimal::new(1497, 2));
    }
}
