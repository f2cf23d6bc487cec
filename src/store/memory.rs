//! In-process store used by tests and database-less runs.
//!
//! A single mutex guards all state, so every operation is trivially atomic
//! and concurrent placements are serialised.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;

use crate::{
    domain::{
        confirmation,
        discovery::{Merchant, NewMerchant},
        errors::{ListingError, OrderError, StorageError},
        listing::{self, Bundle, Listing, ListingRef, NewBundle, NewProduct, Product},
        order::{CancellationPolicy, NewOrder, Order, OrderItem, OrderStatus},
        placement,
    },
    store::{MarketplaceStore, StatusChange},
};

#[derive(Debug, Default)]
struct State {
    last_id: i64,
    merchants: BTreeMap<i64, Merchant>,
    products: BTreeMap<i64, Product>,
    bundles: BTreeMap<i64, Bundle>,
    orders: BTreeMap<i64, Order>,
    codes: HashSet<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn listing(&self, listing: ListingRef) -> Option<Listing> {
        match listing {
            ListingRef::Product(id) => self.products.get(&id).map(Product::to_listing),
            ListingRef::Bundle(id) => self.bundles.get(&id).map(Bundle::to_listing),
        }
    }

    fn quantity_mut(&mut self, listing: ListingRef) -> Option<&mut i32> {
        match listing {
            ListingRef::Product(id) => self
                .products
                .get_mut(&id)
                .map(|product| &mut product.available_quantity),
            ListingRef::Bundle(id) => self
                .bundles
                .get_mut(&id)
                .map(|bundle| &mut bundle.available_quantity),
        }
    }

    fn place_order(&mut self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, OrderError> {
        placement::check_request(&order)?;

        let merchant_name = self
            .merchants
            .get(&order.merchant_id)
            .map(|merchant| merchant.name.clone())
            .ok_or(OrderError::MerchantNotFound(order.merchant_id))?;

        let stock: HashMap<ListingRef, Listing> = order
            .lines
            .iter()
            .filter_map(|line| self.listing(line.listing))
            .map(|listing| (listing.listing, listing))
            .collect();

        let reservation = placement::reserve(&order, &stock, now)?;
        let code = confirmation::generate_unique(&merchant_name, &mut rand::thread_rng(), |code| {
            self.codes.contains(code)
        })?;

        // Nothing below can fail, so the decrements never need undoing.
        for item in &reservation.items {
            if let Some(quantity) = self.quantity_mut(item.listing) {
                *quantity -= item.quantity;
            }
        }

        let order_id = self.next_id();
        let mut items = Vec::with_capacity(reservation.items.len());
        for item in reservation.items {
            items.push(OrderItem {
                id: self.next_id(),
                listing: item.listing,
                name: item.name,
                quantity: item.quantity,
                unit_price: item.unit_price,
            });
        }

        let placed = Order {
            id: order_id,
            customer_id: order.customer_id,
            merchant_id: order.merchant_id,
            status: OrderStatus::Pending,
            confirmation_code: code.clone(),
            total_amount: reservation.total_amount,
            pickup_window: reservation.pickup_window,
            note: order.note,
            picked_up_at: None,
            created_at: now,
            updated_at: now,
            items,
        };

        self.codes.insert(code);
        self.orders.insert(order_id, placed.clone());

        Ok(placed)
    }

    fn update_order_status(
        &mut self,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let order = self
            .orders
            .get_mut(&change.order_id)
            .filter(|order| order.merchant_id == change.merchant_id)
            .ok_or(OrderError::OrderNotFound(change.order_id))?;

        change.transitions.check(order.status, change.status)?;
        order.apply_status(change.status, now);
        let updated = order.clone();

        if change.status == OrderStatus::Cancelled
            && change.cancellation == CancellationPolicy::RestoreInventory
        {
            for item in &updated.items {
                if let Some(quantity) = self.quantity_mut(item.listing) {
                    *quantity += item.quantity;
                }
            }
        }

        Ok(updated)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
    orders
}

#[async_trait]
impl MarketplaceStore for MemoryStore {
    async fn list_merchants(&self) -> Result<Vec<Merchant>, StorageError> {
        Ok(self.state.lock().merchants.values().cloned().collect())
    }

    async fn get_merchant(&self, id: i64) -> Result<Option<Merchant>, StorageError> {
        Ok(self.state.lock().merchants.get(&id).cloned())
    }

    async fn available_products(&self, now: DateTime<Utc>) -> Result<Vec<Product>, StorageError> {
        Ok(self
            .state
            .lock()
            .products
            .values()
            .filter(|product| product.is_available(now))
            .cloned()
            .collect())
    }

    async fn available_bundles(&self, now: DateTime<Utc>) -> Result<Vec<Bundle>, StorageError> {
        Ok(self
            .state
            .lock()
            .bundles
            .values()
            .filter(|bundle| bundle.is_available(now))
            .cloned()
            .collect())
    }

    async fn get_listings(&self, refs: &[ListingRef]) -> Result<Vec<Listing>, StorageError> {
        let state = self.state.lock();
        Ok(refs.iter().filter_map(|listing| state.listing(*listing)).collect())
    }

    async fn create_merchant(&self, merchant: NewMerchant) -> Result<Merchant, StorageError> {
        let mut state = self.state.lock();
        let created = Merchant {
            id: state.next_id(),
            name: merchant.name,
            address: merchant.address,
            location: merchant.location,
            pickup_instructions: merchant.pickup_instructions,
        };
        state.merchants.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, ListingError> {
        product.validate(now)?;

        let mut state = self.state.lock();
        if !state.merchants.contains_key(&product.merchant_id) {
            return Err(ListingError::MerchantNotFound(product.merchant_id));
        }

        let created = Product {
            id: state.next_id(),
            merchant_id: product.merchant_id,
            name: product.name,
            description: product.description,
            category: product.category,
            original_price: product.original_price,
            discounted_price: product.discounted_price,
            available_quantity: product.available_quantity,
            allergens: product.allergens,
            dietary_tags: product.dietary_tags,
            expires_at: product.expires_at,
        };
        state.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_bundle(
        &self,
        bundle: NewBundle,
        now: DateTime<Utc>,
    ) -> Result<Bundle, ListingError> {
        bundle.validate(now)?;

        let mut state = self.state.lock();
        if !state.merchants.contains_key(&bundle.merchant_id) {
            return Err(ListingError::MerchantNotFound(bundle.merchant_id));
        }
        for item in &bundle.items {
            let owned = state
                .products
                .get(&item.product_id)
                .is_some_and(|product| product.merchant_id == bundle.merchant_id);
            if !owned {
                return Err(ListingError::ForeignBundleItem {
                    product_id: item.product_id,
                    merchant_id: bundle.merchant_id,
                });
            }
        }

        let created = Bundle {
            id: state.next_id(),
            merchant_id: bundle.merchant_id,
            name: bundle.name,
            description: bundle.description,
            total_original_price: bundle.total_original_price,
            bundle_price: bundle.bundle_price,
            available_quantity: bundle.available_quantity,
            expires_at: bundle.expires_at,
            items: bundle.items,
        };
        state.bundles.insert(created.id, created.clone());
        Ok(created)
    }

    async fn reprice_listing(
        &self,
        listing: ListingRef,
        original_price: Decimal,
        discounted_price: Decimal,
    ) -> Result<Listing, ListingError> {
        listing::validate_prices(original_price, discounted_price)?;

        let mut state = self.state.lock();
        match listing {
            ListingRef::Product(id) => {
                let product = state
                    .products
                    .get_mut(&id)
                    .ok_or(ListingError::NotFound(listing))?;
                product.original_price = original_price;
                product.discounted_price = discounted_price;
                Ok(product.to_listing())
            }
            ListingRef::Bundle(id) => {
                let bundle = state
                    .bundles
                    .get_mut(&id)
                    .ok_or(ListingError::NotFound(listing))?;
                bundle.total_original_price = original_price;
                bundle.bundle_price = discounted_price;
                Ok(bundle.to_listing())
            }
        }
    }

    async fn place_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, OrderError> {
        self.state.lock().place_order(order, now)
    }

    async fn update_order_status(
        &self,
        change: StatusChange,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        self.state.lock().update_order_status(change, now)
    }

    async fn get_order(&self, id: i64) -> Result<Option<Order>, StorageError> {
        Ok(self.state.lock().orders.get(&id).cloned())
    }

    async fn customer_orders(&self, customer_id: i64) -> Result<Vec<Order>, StorageError> {
        let orders = self
            .state
            .lock()
            .orders
            .values()
            .filter(|order| order.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }

    async fn merchant_orders(&self, merchant_id: i64) -> Result<Vec<Order>, StorageError> {
        let orders = self
            .state
            .lock()
            .orders
            .values()
            .filter(|order| order.merchant_id == merchant_id)
            .cloned()
            .collect();
        Ok(newest_first(orders))
    }
}
