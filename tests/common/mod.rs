#![allow(dead_code)]

pub mod pg;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rescue_orderservice::{
    domain::{
        discovery::{Merchant, NewMerchant},
        geo::GeoPoint,
        listing::{Bundle, BundleItem, ListingRef, NewBundle, NewProduct, Product},
        order::{NewOrder, OrderLine},
    },
    service::{Marketplace, MarketplaceSettings},
    store::{MarketplaceStore, MemoryStore},
};
use rust_decimal::Decimal;
use testresult::TestResult;

pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub marketplace: Marketplace,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_settings(MarketplaceSettings::default())
    }

    pub fn with_settings(settings: MarketplaceSettings) -> Self {
        let store = Arc::new(MemoryStore::new());
        let marketplace = Marketplace::new(store.clone(), settings);
        Self { store, marketplace }
    }

    pub async fn merchant(&self, name: &str) -> TestResult<Merchant> {
        Ok(self
            .marketplace
            .register_merchant(NewMerchant {
                name: name.into(),
                address: "12 Harbour Rd".into(),
                location: GeoPoint::new(40.7128, -74.0060),
                pickup_instructions: None,
            })
            .await?)
    }

    /// A product at 6.00, discounted to `discounted_cents`.
    pub async fn product(
        &self,
        merchant_id: i64,
        discounted_cents: i64,
        quantity: i32,
    ) -> TestResult<Product> {
        Ok(self
            .marketplace
            .create_product(
                NewProduct {
                    merchant_id,
                    name: "Sourdough loaf".into(),
                    description: None,
                    category: "bakery".into(),
                    original_price: Decimal::new(600, 2),
                    discounted_price: Decimal::new(discounted_cents, 2),
                    available_quantity: quantity,
                    allergens: vec!["gluten".into()],
                    dietary_tags: vec!["vegetarian".into()],
                    expires_at: Utc::now() + Duration::hours(8),
                },
                Utc::now(),
            )
            .await?)
    }

    pub async fn bundle(
        &self,
        merchant_id: i64,
        product_id: i64,
        quantity: i32,
    ) -> TestResult<Bundle> {
        Ok(self
            .marketplace
            .create_bundle(
                NewBundle {
                    merchant_id,
                    name: "Surprise bag".into(),
                    description: None,
                    total_original_price: Decimal::new(1500, 2),
                    bundle_price: Decimal::new(499, 2),
                    available_quantity: quantity,
                    expires_at: Utc::now() + Duration::hours(8),
                    items: vec![BundleItem {
                        product_id,
                        quantity: 2,
                    }],
                },
                Utc::now(),
            )
            .await?)
    }

    pub async fn quantity(&self, listing: ListingRef) -> TestResult<i32> {
        let found = self.store.get_listings(&[listing]).await?;
        Ok(found
            .first()
            .map(|listing| listing.available_quantity)
            .ok_or("listing missing")?)
    }
}

pub fn window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    (now + Duration::hours(1), now + Duration::hours(2))
}

pub fn new_order(customer_id: i64, merchant_id: i64, lines: &[(ListingRef, i32)]) -> NewOrder {
    let (start, end) = window(Utc::now());
    NewOrder {
        customer_id,
        merchant_id,
        pickup_window_start: start,
        pickup_window_end: end,
        note: None,
        lines: lines
            .iter()
            .map(|(listing, quantity)| OrderLine {
                listing: *listing,
                quantity: *quantity,
            })
            .collect(),
    }
}
