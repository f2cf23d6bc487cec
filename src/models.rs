use chrono::{DateTime, Utc};
use diesel::{
    Selectable,
    prelude::{AsChangeset, Identifiable, Insertable, Queryable},
};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::domain::{
    discovery::Merchant,
    errors::StorageError,
    geo::GeoPoint,
    listing::{Bundle, BundleItem, ListingKind, ListingRef, Product},
    order::{Order, OrderItem, PickupWindow},
};

// Merchants

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::merchants)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct MerchantEntity {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub pickup_instructions: Option<String>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::merchants)]
pub struct CreateMerchantEntity {
    pub name: String,
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    pub pickup_instructions: Option<String>,
}

impl From<MerchantEntity> for Merchant {
    fn from(entity: MerchantEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            address: entity.address,
            location: GeoPoint::new(entity.latitude, entity.longitude),
            pickup_instructions: entity.pickup_instructions,
        }
    }
}

// Products

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::products)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ProductEntity {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub available_quantity: i32,
    pub allergens: Value,
    pub dietary_tags: Value,
    pub expires_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::products)]
pub struct CreateProductEntity {
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub available_quantity: i32,
    pub allergens: Value,
    pub dietary_tags: Value,
    pub expires_at: DateTime<Utc>,
}

impl TryFrom<ProductEntity> for Product {
    type Error = StorageError;

    fn try_from(entity: ProductEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            merchant_id: entity.merchant_id,
            name: entity.name,
            description: entity.description,
            category: entity.category,
            original_price: entity.original_price,
            discounted_price: entity.discounted_price,
            available_quantity: entity.available_quantity,
            allergens: string_list("products", entity.allergens)?,
            dietary_tags: string_list("products", entity.dietary_tags)?,
            expires_at: entity.expires_at,
        })
    }
}

fn string_list(table: &'static str, value: Value) -> Result<Vec<String>, StorageError> {
    serde_json::from_value(value).map_err(|err| StorageError::Corrupt {
        table,
        reason: err.to_string(),
    })
}

// Bundles

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::bundles)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BundleEntity {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub total_original_price: Decimal,
    pub bundle_price: Decimal,
    pub available_quantity: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::bundles)]
pub struct CreateBundleEntity {
    pub merchant_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub total_original_price: Decimal,
    pub bundle_price: Decimal,
    pub available_quantity: i32,
    pub expires_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Insertable, Debug)]
#[diesel(table_name = crate::schema::bundle_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BundleItemEntity {
    pub bundle_id: i64,
    pub product_id: i64,
    pub position: i32,
    pub quantity: i32,
}

impl BundleEntity {
    pub fn into_bundle(self, mut items: Vec<BundleItemEntity>) -> Bundle {
        items.sort_by_key(|item| item.position);
        Bundle {
            id: self.id,
            merchant_id: self.merchant_id,
            name: self.name,
            description: self.description,
            total_original_price: self.total_original_price,
            bundle_price: self.bundle_price,
            available_quantity: self.available_quantity,
            expires_at: self.expires_at,
            items: items
                .into_iter()
                .map(|item| BundleItem {
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::products)]
pub struct ProductPriceChangeset {
    pub original_price: Decimal,
    pub discounted_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(AsChangeset, Debug)]
#[diesel(table_name = crate::schema::bundles)]
pub struct BundlePriceChangeset {
    pub total_original_price: Decimal,
    pub bundle_price: Decimal,
    pub updated_at: DateTime<Utc>,
}

// Orders

#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderEntity {
    pub id: i64,
    pub customer_id: i64,
    pub merchant_id: i64,
    pub status: String,
    pub confirmation_code: String,
    pub total_amount: Decimal,
    pub pickup_window_start: DateTime<Utc>,
    pub pickup_window_end: DateTime<Utc>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::orders)]
pub struct CreateOrderEntity {
    pub customer_id: i64,
    pub merchant_id: i64,
    pub status: String,
    pub confirmation_code: String,
    pub total_amount: Decimal,
    pub pickup_window_start: DateTime<Utc>,
    pub pickup_window_end: DateTime<Utc>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Queryable, Selectable, Identifiable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemEntity {
    pub id: i64,
    pub order_id: i64,
    pub item_type: String,
    pub item_id: i64,
    pub name: String,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::order_items)]
pub struct CreateOrderItemEntity {
    pub order_id: i64,
    pub item_type: String,
    pub item_id: i64,
    pub name: String,
    pub quantity: i32,
    pub price_at_purchase: Decimal,
}

impl TryFrom<OrderItemEntity> for OrderItem {
    type Error = StorageError;

    fn try_from(entity: OrderItemEntity) -> Result<Self, Self::Error> {
        let kind: ListingKind = entity
            .item_type
            .parse()
            .map_err(|reason| StorageError::Corrupt {
                table: "order_items",
                reason,
            })?;

        Ok(Self {
            id: entity.id,
            listing: ListingRef::new(kind, entity.item_id),
            name: entity.name,
            quantity: entity.quantity,
            unit_price: entity.price_at_purchase,
        })
    }
}

impl OrderEntity {
    pub fn into_order(self, items: Vec<OrderItemEntity>) -> Result<Order, StorageError> {
        let corrupt = |reason: String| StorageError::Corrupt {
            table: "orders",
            reason,
        };

        Ok(Order {
            id: self.id,
            customer_id: self.customer_id,
            merchant_id: self.merchant_id,
            status: self.status.parse().map_err(corrupt)?,
            confirmation_code: self.confirmation_code,
            total_amount: self.total_amount,
            pickup_window: PickupWindow::new(self.pickup_window_start, self.pickup_window_end)
                .map_err(|err| corrupt(err.to_string()))?,
            note: self.special_instructions,
            picked_up_at: self.picked_up_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
            items: items
                .into_iter()
                .map(OrderItem::try_from)
                .collect::<Result<_, _>>()?,
        })
    }
}
