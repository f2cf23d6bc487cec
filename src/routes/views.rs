//! Response shapes that add computed fields to domain values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    cart::{Cart, CartLine},
    discovery::Merchant,
    listing::{Bundle, Product},
    order::Order,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub can_be_picked_up: bool,
    pub overdue: bool,
}

impl OrderView {
    pub fn new(order: Order, now: DateTime<Utc>) -> Self {
        Self {
            can_be_picked_up: order.can_be_picked_up(now),
            overdue: order.is_overdue(now),
            order,
        }
    }

    pub fn many(orders: Vec<Order>, now: DateTime<Utc>) -> Vec<Self> {
        orders
            .into_iter()
            .map(|order| Self::new(order, now))
            .collect()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MerchantStub {
    pub id: i64,
    pub name: String,
    pub address: String,
}

impl From<Merchant> for MerchantStub {
    fn from(merchant: Merchant) -> Self {
        Self {
            id: merchant.id,
            name: merchant.name,
            address: merchant.address,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductCard {
    #[serde(flatten)]
    pub product: Product,
    pub discount_amount: Decimal,
    pub discount_percentage: u32,
    pub merchant: MerchantStub,
}

impl From<(Product, Merchant)> for ProductCard {
    fn from((product, merchant): (Product, Merchant)) -> Self {
        Self {
            discount_amount: product.discount_amount(),
            discount_percentage: product.discount_percentage(),
            product,
            merchant: merchant.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BundleCard {
    #[serde(flatten)]
    pub bundle: Bundle,
    pub discount_amount: Decimal,
    pub discount_percentage: u32,
    pub item_count: usize,
    pub merchant: MerchantStub,
}

impl From<(Bundle, Merchant)> for BundleCard {
    fn from((bundle, merchant): (Bundle, Merchant)) -> Self {
        Self {
            discount_amount: bundle.discount_amount(),
            discount_percentage: bundle.discount_percentage(),
            item_count: bundle.items.len(),
            bundle,
            merchant: merchant.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub merchant_id: Option<i64>,
    pub lines: Vec<CartLine>,
    pub item_count: u32,
    pub total: Decimal,
}

impl From<Cart> for CartView {
    fn from(cart: Cart) -> Self {
        Self {
            merchant_id: cart.merchant_id(),
            item_count: cart.item_count(),
            total: cart.total(),
            lines: cart.lines().to_vec(),
        }
    }
}
