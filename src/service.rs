//! Marketplace operations shared by every HTTP surface.

use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::{
    domain::{
        cart::Cart,
        discovery::{self, ListingFilter, Merchant, MerchantSummary, NewMerchant},
        errors::{CartError, ListingError, OrderError, QuoteError, StorageError},
        geo::{self, DEFAULT_RADIUS_KM, GeoPoint},
        listing::{Bundle, Listing, ListingRef, NewBundle, NewProduct, Product},
        order::{CancellationPolicy, NewOrder, Order, OrderLine, OrderStatus, TransitionPolicy},
    },
    platform::config::Config,
    store::{MarketplaceStore, StatusChange},
};

#[derive(Debug, Clone, Copy)]
pub struct MarketplaceSettings {
    pub transitions: TransitionPolicy,
    pub cancellation: CancellationPolicy,
    pub default_radius_km: f64,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            transitions: TransitionPolicy::default(),
            cancellation: CancellationPolicy::default(),
            default_radius_km: DEFAULT_RADIUS_KM,
        }
    }
}

impl From<&Config> for MarketplaceSettings {
    fn from(config: &Config) -> Self {
        Self {
            transitions: config.status_transition_policy,
            cancellation: config.cancellation_policy,
            default_radius_km: config.default_radius_km,
        }
    }
}

#[derive(Clone)]
pub struct Marketplace {
    store: Arc<dyn MarketplaceStore>,
    settings: MarketplaceSettings,
}

impl Marketplace {
    pub fn new(store: Arc<dyn MarketplaceStore>, settings: MarketplaceSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> MarketplaceSettings {
        self.settings
    }

    /// Ids of merchants within the radius, or `None` when no centre was given.
    fn nearby_ids(
        &self,
        merchants: &[Merchant],
        center: Option<GeoPoint>,
        radius_km: Option<f64>,
    ) -> Option<BTreeSet<i64>> {
        let radius_km = radius_km.unwrap_or(self.settings.default_radius_km);
        center.map(|center| {
            geo::nearby(
                center,
                radius_km,
                merchants.iter().map(|merchant| (merchant.id, merchant.location)),
            )
        })
    }

    /// Merchants with their counts of listings available at `now`.
    #[instrument(skip(self))]
    pub async fn browse_merchants(
        &self,
        center: Option<GeoPoint>,
        radius_km: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<Vec<MerchantSummary>, StorageError> {
        let merchants = self.store.list_merchants().await?;
        let nearby = self.nearby_ids(&merchants, center, radius_km);

        let mut products_count: HashMap<i64, usize> = HashMap::new();
        for product in self.store.available_products(now).await? {
            *products_count.entry(product.merchant_id).or_default() += 1;
        }
        let mut bundles_count: HashMap<i64, usize> = HashMap::new();
        for bundle in self.store.available_bundles(now).await? {
            *bundles_count.entry(bundle.merchant_id).or_default() += 1;
        }

        Ok(merchants
            .into_iter()
            .filter(|merchant| nearby.as_ref().is_none_or(|ids| ids.contains(&merchant.id)))
            .map(|merchant| MerchantSummary {
                available_products_count: products_count.get(&merchant.id).copied().unwrap_or(0),
                available_bundles_count: bundles_count.get(&merchant.id).copied().unwrap_or(0),
                merchant,
            })
            .collect())
    }

    /// Available products matching `filter`, each with its merchant.
    #[instrument(skip(self))]
    pub async fn browse_products(
        &self,
        filter: &ListingFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Product, Merchant)>, StorageError> {
        let merchants = self.store.list_merchants().await?;
        let nearby = self.nearby_ids(&merchants, filter.center(), filter.radius);
        let products = discovery::filter_products(
            self.store.available_products(now).await?,
            filter,
            nearby.as_ref(),
            now,
        );

        Ok(with_merchants(products, merchants, |product| product.merchant_id))
    }

    /// Available bundles matching `filter`, each with its merchant.
    #[instrument(skip(self))]
    pub async fn browse_bundles(
        &self,
        filter: &ListingFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<(Bundle, Merchant)>, StorageError> {
        let merchants = self.store.list_merchants().await?;
        let nearby = self.nearby_ids(&merchants, filter.center(), filter.radius);
        let bundles = discovery::filter_bundles(
            self.store.available_bundles(now).await?,
            filter,
            nearby.as_ref(),
            now,
        );

        Ok(with_merchants(bundles, merchants, |bundle| bundle.merchant_id))
    }

    /// Prices submitted lines against current listings.
    ///
    /// Lines are added in order, so the first listing fixes the merchant.
    #[instrument(skip(self))]
    pub async fn quote_cart(
        &self,
        lines: &[OrderLine],
        now: DateTime<Utc>,
    ) -> Result<Cart, QuoteError> {
        let refs: Vec<ListingRef> = lines.iter().map(|line| line.listing).collect();
        let listings: HashMap<ListingRef, Listing> = self
            .store
            .get_listings(&refs)
            .await?
            .into_iter()
            .map(|listing| (listing.listing, listing))
            .collect();

        let mut cart = Cart::new();
        for line in lines {
            let quantity = u32::try_from(line.quantity).map_err(|_| CartError::InvalidQuantity)?;
            let listing = listings
                .get(&line.listing)
                .filter(|listing| listing.is_available(now))
                .ok_or(OrderError::InsufficientInventory {
                    listing: line.listing,
                    requested: line.quantity,
                    available: 0,
                })?;
            cart.add(listing, quantity)?;
        }

        for line in cart.lines() {
            let available = listings
                .get(&line.listing)
                .map_or(0, |listing| listing.available_quantity);
            let requested = i32::try_from(line.quantity).unwrap_or(i32::MAX);
            if requested > available {
                return Err(OrderError::InsufficientInventory {
                    listing: line.listing,
                    requested,
                    available,
                }
                .into());
            }
        }

        Ok(cart)
    }

    #[instrument(skip(self, order), fields(customer_id = order.customer_id, merchant_id = order.merchant_id))]
    pub async fn place_order(&self, order: NewOrder, now: DateTime<Utc>) -> Result<Order, OrderError> {
        match self.store.place_order(order, now).await {
            Ok(placed) => {
                info!(
                    code = %placed.confirmation_code,
                    total = %placed.total_amount,
                    "Order #{} has been placed",
                    placed.id
                );
                Ok(placed)
            }
            Err(err) => {
                warn!(error = %err, "Order placement rejected");
                Err(err)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(
        &self,
        merchant_id: i64,
        order_id: i64,
        status: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, OrderError> {
        let change = StatusChange {
            order_id,
            merchant_id,
            status,
            transitions: self.settings.transitions,
            cancellation: self.settings.cancellation,
        };

        let order = self.store.update_order_status(change, now).await?;
        info!("Order #{} has been moved to {}", order.id, order.status);

        Ok(order)
    }

    pub async fn customer_orders(&self, customer_id: i64) -> Result<Vec<Order>, StorageError> {
        self.store.customer_orders(customer_id).await
    }

    /// An order of the given customer. Other customers' orders are not found.
    pub async fn customer_order(&self, customer_id: i64, order_id: i64) -> Result<Order, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.customer_id == customer_id)
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    /// Orders of a merchant, newest first. `active_only` keeps pending to ready.
    pub async fn merchant_orders(
        &self,
        merchant_id: i64,
        active_only: bool,
    ) -> Result<Vec<Order>, StorageError> {
        let mut orders = self.store.merchant_orders(merchant_id).await?;
        if active_only {
            orders.retain(|order| order.status.is_active());
        }
        Ok(orders)
    }

    pub async fn merchant_order(&self, merchant_id: i64, order_id: i64) -> Result<Order, OrderError> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.merchant_id == merchant_id)
            .ok_or(OrderError::OrderNotFound(order_id))
    }

    #[instrument(skip(self, merchant), fields(name = %merchant.name))]
    pub async fn register_merchant(&self, merchant: NewMerchant) -> Result<Merchant, StorageError> {
        let created = self.store.create_merchant(merchant).await?;
        info!("Merchant #{} has been registered", created.id);
        Ok(created)
    }

    #[instrument(skip(self, product), fields(merchant_id = product.merchant_id))]
    pub async fn create_product(
        &self,
        product: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Product, ListingError> {
        let created = self.store.create_product(product, now).await?;
        info!("Product #{} has been listed", created.id);
        Ok(created)
    }

    #[instrument(skip(self, bundle), fields(merchant_id = bundle.merchant_id))]
    pub async fn create_bundle(
        &self,
        bundle: NewBundle,
        now: DateTime<Utc>,
    ) -> Result<Bundle, ListingError> {
        let created = self.store.create_bundle(bundle, now).await?;
        info!("Bundle #{} has been listed", created.id);
        Ok(created)
    }

    /// Changes the prices of a merchant's own listing.
    #[instrument(skip(self))]
    pub async fn reprice_listing(
        &self,
        merchant_id: i64,
        listing: ListingRef,
        original_price: Decimal,
        discounted_price: Decimal,
    ) -> Result<Listing, ListingError> {
        let owned = self
            .store
            .get_listings(&[listing])
            .await?
            .into_iter()
            .any(|found| found.merchant_id == merchant_id);
        if !owned {
            return Err(ListingError::NotFound(listing));
        }

        let updated = self
            .store
            .reprice_listing(listing, original_price, discounted_price)
            .await?;
        info!("Listing {} has been repriced to {}", listing, updated.discounted_price);

        Ok(updated)
    }
}

fn with_merchants<T>(
    items: Vec<T>,
    merchants: Vec<Merchant>,
    merchant_id: impl Fn(&T) -> i64,
) -> Vec<(T, Merchant)> {
    let merchants: HashMap<i64, Merchant> = merchants
        .into_iter()
        .map(|merchant| (merchant.id, merchant))
        .collect();

    items
        .into_iter()
        .filter_map(|item| {
            let merchant = merchants.get(&merchant_id(&item))?.clone();
            Some((item, merchant))
        })
        .collect()
}
