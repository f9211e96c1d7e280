//! Cart store: the client-persisted ordered collection of line items.
//!
//! The cart is a client-local record of intent at add-time. Every mutation
//! persists the full list under [`keys::CART`] and then synchronously notifies
//! every subscriber, in registration order, with the new list before the
//! mutating call returns. Subscribers receive a read-only snapshot and must
//! treat each notification as a full replacement.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tealtree_core::{Price, ProductId};

use crate::storage::{self, StorageBackend, keys};

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Product identifier, unique within the cart.
    pub id: ProductId,
    /// Product title at add-time.
    pub title: String,
    /// Unit price at add-time.
    pub price: Price,
    /// Product image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Units of this product (at least 1).
    pub quantity: u32,
}

impl CartItem {
    /// Price × quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price.times(self.quantity)
    }
}

/// Handle returned by [`CartStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&[CartItem]) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
}

impl Subscribers {
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Store owning the cart record.
#[derive(Clone)]
pub struct CartStore {
    backend: Arc<dyn StorageBackend>,
    subscribers: Arc<Subscribers>,
}

impl CartStore {
    /// Create a store over `backend`.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            subscribers: Arc::new(Subscribers::default()),
        }
    }

    /// The cart lines in insertion order.
    ///
    /// A corrupt record reads as an empty cart. Individual lines that do not
    /// match the line schema (negative price, zero quantity, missing fields)
    /// are dropped, as are repeated ids after their first occurrence.
    #[must_use]
    pub fn list(&self) -> Vec<CartItem> {
        let Some(raw) = storage::load::<Vec<Value>>(self.backend.as_ref(), keys::CART) else {
            return Vec::new();
        };

        let mut items: Vec<CartItem> = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<CartItem>(value) {
                Ok(item) if item.quantity == 0 => {
                    tracing::warn!(id = %item.id, "Dropping stored cart line with zero quantity");
                }
                Ok(item) if items.iter().any(|existing| existing.id == item.id) => {
                    tracing::warn!(id = %item.id, "Dropping duplicate stored cart line");
                }
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!(error = %e, "Dropping malformed stored cart line"),
            }
        }
        items
    }

    /// Add `item`, merging into an existing line with the same id.
    ///
    /// A merge only sums quantities; the existing title, price and image are
    /// kept. Adding zero units does nothing.
    pub fn add(&self, item: CartItem) {
        if item.quantity == 0 {
            tracing::debug!(id = %item.id, "Ignoring add of zero units");
            return;
        }

        let mut items = self.list();
        if let Some(existing) = items.iter_mut().find(|line| line.id == item.id) {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
        } else {
            items.push(item);
        }
        self.commit(&items);
    }

    /// Set the quantity of the line with `id`.
    ///
    /// A quantity of zero or below removes the line. Unknown ids are ignored.
    pub fn set_quantity(&self, id: &ProductId, quantity: i64) {
        let mut items = self.list();
        let Some(position) = items.iter().position(|line| &line.id == id) else {
            return;
        };

        if quantity <= 0 {
            items.remove(position);
        } else if let Some(line) = items.get_mut(position) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
        self.commit(&items);
    }

    /// Remove the line with `id`, if present.
    pub fn remove(&self, id: &ProductId) {
        let mut items = self.list();
        let before = items.len();
        items.retain(|line| &line.id != id);
        if items.len() != before {
            self.commit(&items);
        }
    }

    /// Empty the cart.
    pub fn clear(&self) {
        self.commit(&[]);
    }

    /// Σ price × quantity over all lines.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        subtotal(&self.list())
    }

    /// Total units across all lines (the cart badge count).
    #[must_use]
    pub fn item_count(&self) -> u64 {
        item_count(&self.list())
    }

    /// Register `listener` for cart-changed notifications.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&[CartItem]) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.subscribers.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((id, Arc::new(listener)));
        id
    }

    /// Stop notifying the listener registered as `id`.
    ///
    /// Returns whether a listener was removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.subscribers.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    fn commit(&self, items: &[CartItem]) {
        storage::save(self.backend.as_ref(), keys::CART, items);
        tracing::debug!(lines = items.len(), "Cart updated");

        // Snapshot the listeners so they can call back into the store.
        let listeners: Vec<Listener> = self
            .subscribers
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(items);
        }
    }
}

/// Σ price × quantity over `items`.
#[must_use]
pub fn subtotal(items: &[CartItem]) -> Price {
    items.iter().map(CartItem::line_total).sum()
}

/// Total units across `items`.
#[must_use]
pub fn item_count(items: &[CartItem]) -> u64 {
    items.iter().map(|item| u64::from(item.quantity)).sum()
}
