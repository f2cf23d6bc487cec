//! Browse filters applied over already-available listings.

use std::collections::BTreeSet;

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    geo::GeoPoint,
    listing::{Bundle, Product},
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Merchant {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
    pub pickup_instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewMerchant {
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub location: GeoPoint,
    pub pickup_instructions: Option<String>,
}

/// Merchant as shown on the browse page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MerchantSummary {
    #[serde(flatten)]
    pub merchant: Merchant,
    pub available_products_count: usize,
    pub available_bundles_count: usize,
}

/// Query parameters shared by product and bundle browsing.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListingFilter {
    /// Centre latitude; proximity applies only with both coordinates.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Radius in kilometres.
    pub radius: Option<f64>,
    /// Case-insensitive name search.
    pub search: Option<String>,
    pub category: Option<String>,
    pub merchant_id: Option<i64>,
    #[param(value_type = Option<String>)]
    pub min_price: Option<Decimal>,
    #[param(value_type = Option<String>)]
    pub max_price: Option<Decimal>,
    /// Comma separated tags every product must carry.
    pub dietary_tags: Option<String>,
    /// Comma separated allergens no product may contain.
    pub exclude_allergens: Option<String>,
    pub expiring_within_hours: Option<i64>,
}

impl ListingFilter {
    pub fn center(&self) -> Option<GeoPoint> {
        Some(GeoPoint::new(self.latitude?, self.longitude?))
    }

    /// Rejects query values that cannot describe a window.
    pub fn validate(&self) -> Result<(), String> {
        if self.expiring_within_hours.is_some_and(|hours| hours < 0) {
            return Err("expiring_within_hours must not be negative".into());
        }
        Ok(())
    }

    /// Latest expiry the filter accepts. A window past chrono's range has no bound.
    fn expiry_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let hours = self.expiring_within_hours?;
        TimeDelta::try_hours(hours).and_then(|window| now.checked_add_signed(window))
    }

    fn matches_common(
        &self,
        merchant_id: i64,
        name: &str,
        price: Decimal,
        expires_at: DateTime<Utc>,
        nearby: Option<&BTreeSet<i64>>,
        now: DateTime<Utc>,
    ) -> bool {
        if nearby.is_some_and(|ids| !ids.contains(&merchant_id)) {
            return false;
        }
        if self.merchant_id.is_some_and(|id| id != merchant_id) {
            return false;
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty())
            && !name.to_lowercase().contains(&search.to_lowercase())
        {
            return false;
        }
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        if let Some(cutoff) = self.expiry_cutoff(now)
            && expires_at > cutoff
        {
            return false;
        }
        true
    }

    pub fn matches_product(
        &self,
        product: &Product,
        nearby: Option<&BTreeSet<i64>>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.matches_common(
            product.merchant_id,
            &product.name,
            product.discounted_price,
            product.expires_at,
            nearby,
            now,
        ) {
            return false;
        }
        if let Some(category) = self.category.as_deref().filter(|c| !c.is_empty())
            && product.category != category
        {
            return false;
        }
        if !split_tags(self.dietary_tags.as_deref())
            .all(|tag| contains_tag(&product.dietary_tags, tag))
        {
            return false;
        }
        !split_tags(self.exclude_allergens.as_deref())
            .any(|allergen| contains_tag(&product.allergens, allergen))
    }

    pub fn matches_bundle(
        &self,
        bundle: &Bundle,
        nearby: Option<&BTreeSet<i64>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.matches_common(
            bundle.merchant_id,
            &bundle.name,
            bundle.bundle_price,
            bundle.expires_at,
            nearby,
            now,
        )
    }
}

fn split_tags(raw: Option<&str>) -> impl Iterator<Item = &str> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
}

fn contains_tag(tags: &[String], wanted: &str) -> bool {
    tags.iter().any(|tag| tag.eq_ignore_ascii_case(wanted))
}

/// Applies the filter to available products, most urgent expiry first.
pub fn filter_products(
    products: Vec<Product>,
    filter: &ListingFilter,
    nearby: Option<&BTreeSet<i64>>,
    now: DateTime<Utc>,
) -> Vec<Product> {
    let mut products: Vec<Product> = products
        .into_iter()
        .filter(|product| product.is_available(now))
        .filter(|product| filter.matches_product(product, nearby, now))
        .collect();
    products.sort_by_key(|product| (product.expires_at, product.id));
    products
}

/// Applies the filter to available bundles, most urgent expiry first.
pub fn filter_bundles(
    bundles: Vec<Bundle>,
    filter: &ListingFilter,
    nearby: Option<&BTreeSet<i64>>,
    now: DateTime<Utc>,
) -> Vec<Bundle> {
    let mut bundles: Vec<Bundle> = bundles
        .into_iter()
        .filter(|bundle| bundle.is_available(now))
        .filter(|bundle| filter.matches_bundle(bundle, nearby, now))
        .collect();
    bundles.sort_by_key(|bundle| (bundle.expires_at, bundle.id));
    bundles
}
