//! Products, bundles and the availability rule shared by discovery and placement.

use std::{collections::HashSet, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, prelude::ToPrimitive};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::errors::ListingError;

/// Reference to either a product or a bundle.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ListingRef {
    Product(i64),
    Bundle(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ListingKind {
    Product,
    Bundle,
}

impl ListingRef {
    pub fn new(kind: ListingKind, id: i64) -> Self {
        match kind {
            ListingKind::Product => Self::Product(id),
            ListingKind::Bundle => Self::Bundle(id),
        }
    }

    pub fn kind(self) -> ListingKind {
        match self {
            Self::Product(_) => ListingKind::Product,
            Self::Bundle(_) => ListingKind::Bundle,
        }
    }

    pub fn id(self) -> i64 {
        match self {
            Self::Product(id) | Self::Bundle(id) => id,
        }
    }
}

impl fmt::Display for ListingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind().as_str(), self.id())
    }
}

impl ListingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Bundle => "bundle",
        }
    }
}

impl FromStr for ListingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Self::Product),
            "bundle" => Ok(Self::Bundle),
            other => Err(format!("unknown item type {other:?}")),
        }
    }
}

/// Available iff there is stock left and the listing has not expired.
///
/// Expiry is exclusive: a listing expiring exactly at `now` is gone.
pub fn is_available(available_quantity: i32, expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    available_quantity > 0 && expires_at > now
}

/// The fields of a product or bundle that ordering cares about.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Listing {
    pub listing: ListingRef,
    pub merchant_id: i64,
    pub name: String,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub available_quantity: i32,
    pub expires_at: DateTime<Utc>,
}

impl Listing {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        is_available(self.available_quantity, self.expires_at, now)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Product {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub available_quantity: i32,
    pub allergens: Vec<String>,
    pub dietary_tags: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl Product {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        is_available(self.available_quantity, self.expires_at, now)
    }

    pub fn discount_amount(&self) -> Decimal {
        self.original_price - self.discounted_price
    }

    pub fn discount_percentage(&self) -> u32 {
        discount_percentage(self.original_price, self.discounted_price)
    }

    pub fn to_listing(&self) -> Listing {
        Listing {
            listing: ListingRef::Product(self.id),
            merchant_id: self.merchant_id,
            name: self.name.clone(),
            original_price: self.original_price,
            discounted_price: self.discounted_price,
            available_quantity: self.available_quantity,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BundleItem {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Bundle {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub total_original_price: Decimal,
    pub bundle_price: Decimal,
    pub available_quantity: i32,
    pub expires_at: DateTime<Utc>,
    pub items: Vec<BundleItem>,
}

impl Bundle {
    pub fn is_available(&self, now: DateTime<Utc>) -> bool {
        is_available(self.available_quantity, self.expires_at, now)
    }

    pub fn discount_amount(&self) -> Decimal {
        self.total_original_price - self.bundle_price
    }

    pub fn discount_percentage(&self) -> u32 {
        discount_percentage(self.total_original_price, self.bundle_price)
    }

    pub fn to_listing(&self) -> Listing {
        Listing {
            listing: ListingRef::Bundle(self.id),
            merchant_id: self.merchant_id,
            name: self.name.clone(),
            original_price: self.total_original_price,
            discounted_price: self.bundle_price,
            available_quantity: self.available_quantity,
            expires_at: self.expires_at,
        }
    }
}

fn discount_percentage(original: Decimal, discounted: Decimal) -> u32 {
    if original <= Decimal::ZERO {
        return 0;
    }

    ((original - discounted) / original * Decimal::ONE_HUNDRED)
        .round()
        .to_u32()
        .unwrap_or(0)
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewProduct {
    #[serde(default)]
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub available_quantity: i32,
    #[serde(default)]
    pub allergens: Vec<String>,
    #[serde(default)]
    pub dietary_tags: Vec<String>,
    pub expires_at: DateTime<Utc>,
}

impl NewProduct {
    /// Checks the creation rules that do not need a store lookup.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ListingError> {
        validate_listing(
            &self.name,
            self.original_price,
            self.discounted_price,
            self.available_quantity,
            self.expires_at,
            now,
        )
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewBundle {
    #[serde(default)]
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub total_original_price: Decimal,
    pub bundle_price: Decimal,
    pub available_quantity: i32,
    pub expires_at: DateTime<Utc>,
    pub items: Vec<BundleItem>,
}

impl NewBundle {
    /// Checks the creation rules that do not need a store lookup.
    ///
    /// Ownership of the referenced products is checked by the store.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ListingError> {
        validate_listing(
            &self.name,
            self.total_original_price,
            self.bundle_price,
            self.available_quantity,
            self.expires_at,
            now,
        )?;

        let mut seen = HashSet::new();
        for item in &self.items {
            if item.quantity <= 0 {
                return Err(ListingError::InvalidBundleItemQuantity);
            }
            if !seen.insert(item.product_id) {
                return Err(ListingError::DuplicateBundleItem(item.product_id));
            }
        }

        Ok(())
    }
}

fn validate_listing(
    name: &str,
    original: Decimal,
    discounted: Decimal,
    quantity: i32,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), ListingError> {
    if name.trim().is_empty() {
        return Err(ListingError::MissingName);
    }
    validate_prices(original, discounted)?;
    if quantity < 0 {
        return Err(ListingError::NegativeQuantity);
    }
    if expires_at <= now {
        return Err(ListingError::ExpiryInPast);
    }
    Ok(())
}

pub(crate) fn validate_prices(original: Decimal, discounted: Decimal) -> Result<(), ListingError> {
    if original <= Decimal::ZERO || discounted <= Decimal::ZERO {
        return Err(ListingError::NonPositivePrice);
    }
    if discounted >= original {
        return Err(ListingError::DiscountNotLower {
            original,
            discounted,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 14, 10, 0, 0).unwrap()
    }

    fn new_product() -> NewProduct {
        NewProduct {
            merchant_id: 1,
            name: "Sourdough loaf".into(),
            description: None,
            category: "bakery".into(),
            original_price: Decimal::new(600, 2),
            discounted_price: Decimal::new(250, 2),
            available_quantity: 4,
            allergens: vec!["gluten".into()],
            dietary_tags: vec![],
            expires_at: now() + Duration::hours(3),
        }
    }

    #[test]
    fn expiry_at_now_is_unavailable() {
        assert!(!is_available(5, now(), now()));
        assert!(is_available(5, now() + Duration::seconds(1), now()));
    }

    #[test]
    fn zero_quantity_is_unavailable() {
        assert!(!is_available(0, now() + Duration::hours(1), now()));
    }

    #[test]
    fn listing_ref_serializes_as_tagged_pair() {
        let json = serde_json::to_value(ListingRef::Bundle(7)).unwrap();

        assert_eq!(json, serde_json::json!({ "kind": "bundle", "id": 7 }));
    }

    #[test]
    fn product_rejects_discount_not_lower() {
        let mut product = new_product();
        product.discounted_price = product.original_price;

        assert!(matches!(
            product.validate(now()),
            Err(ListingError::DiscountNotLower { .. })
        ));
    }

    #[test]
    fn product_rejects_expiry_not_in_future() {
        let mut product = new_product();
        product.expires_at = now();

        assert!(matches!(
            product.validate(now()),
            Err(ListingError::ExpiryInPast)
        ));
    }

    #[test]
    fn product_accepts_valid_input() {
        assert!(new_product().validate(now()).is_ok());
    }

    #[test]
    fn bundle_rejects_duplicate_products() {
        let bundle = NewBundle {
            merchant_id: 1,
            name: "Surprise bag".into(),
            description: None,
            total_original_price: Decimal::new(1500, 2),
            bundle_price: Decimal::new(500, 2),
            available_quantity: 2,
            expires_at: now() + Duration::hours(2),
            items: vec![
                BundleItem {
                    product_id: 3,
                    quantity: 1,
                },
                BundleItem {
                    product_id: 3,
                    quantity: 2,
                },
            ],
        };

        assert!(matches!(
            bundle.validate(now()),
            Err(ListingError::DuplicateBundleItem(3))
        ));
    }

    #[test]
    fn discount_percentage_rounds() {
        let product = Product {
            id: 1,
            merchant_id: 1,
            name: "Croissant".into(),
            description: None,
            category: "bakery".into(),
            original_price: Decimal::new(300, 2),
            discounted_price: Decimal::new(100, 2),
            available_quantity: 1,
            allergens: vec![],
            dietary_tags: vec![],
            expires_at: now(),
        };

        assert_eq!(product.discount_percentage(), 67);
        assert_eq!(product.discount_amount(), Decimal::new(200, 2));
    }
}
