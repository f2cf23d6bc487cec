//! Persistence seam for merchants, listings and orders.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    discovery::{Merchant, NewMerchant},
    errors::{ListingError, OrderError, StorageError},
    listing::{Bundle, Listing, ListingRef, NewBundle, NewProduct, Product},
    order::{CancellationPolicy, NewOrder, Order, OrderStatus, TransitionPolicy},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A merchant-initiated status change.
#[derive(Debug, Clone, Copy)]
pub struct StatusChange {
    pub order_id: i64,
    pub merchant_id: i64,
    pub status: OrderStatus,
    pub transitions: TransitionPolicy,
    pub cancellation: CancellationPolicy,
}

/// Storage operations the marketplace core relies on.
///
/// `place_order` and `update_order_status` are atomic: either every write
/// lands or none does, and concurrent calls touching the same listings or
/// order are serialised.
#[async_trait]
pub trait MarketplaceStore: Send + Sync {
    async fn list_merchants(&self) -> Result<Vec<Merchant>, StorageError>;

    async fn get_merchant(&self, id: i64) -> Result<Option<Merchant>, StorageError>;

    /// Products with stock left and not yet expired at `now`.
    async fn available_products(&self, now: DateTime<Utc>) -> Result<Vec<Product>, StorageError>;

    /// Bundles with stock left and not yet expired at `now`.
    async fn available_bundles(&self, now: DateTime<Utc>) -> Result<Vec<Bundle>, StorageError>;

    /// Current state of the given listings; unknown references are skipped.
    async fn get_listings(&self, refs: &[ListingRef]) -> Result<Vec<Listing>, StorageError>;

    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, StorageError>;

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, ListingError>;

    async fn create_bundle(&self, bundle: NewBundle, now: DateTime<Utc>)
    -> Result<Bundle, ListingError>;

    /// Changes the prices of a listing. Existing order items keep theirs.
    async fn reprice_listing(
        &self,
        listing: ListingRef,
        original_price: Decimal,
        discounted_price: Decimal,
    ) -> Result<Listing, ListingError>;

    async fn place_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, OrderError>;

    async fn update_order_status(
        &self,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError>;

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StorageError>;

    /// Newest first.
    async fn customer_orders(&self, customer_id: i64) -> Result<Vec<Order>, StorageError>;

    /// Newest first.
    async fn merchant_orders(&self, merchant_id: i64) -> Result<Vec<Order>, StorageError>;
}
