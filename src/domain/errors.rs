//! Error kinds raised by the order, cart and listing core.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{listing::ListingRef, order::OrderStatus};

/// Failures of the persistence layer itself.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database query failed")]
    Query(#[from] diesel::result::Error),

    #[error("failed to obtain a database connection: {0}")]
    Pool(String),

    #[error("corrupt row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    #[error("cart holds items from merchant #{cart_merchant}, cannot add an item from merchant #{listing_merchant}")]
    CrossMerchant {
        cart_merchant: i64,
        listing_merchant: i64,
    },

    #[error("quantity must be greater than zero")]
    InvalidQuantity,
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("listing name must not be empty")]
    MissingName,

    #[error("prices must be greater than zero")]
    NonPositivePrice,

    #[error("discounted price {discounted} must be less than original price {original}")]
    DiscountNotLower {
        original: Decimal,
        discounted: Decimal,
    },

    #[error("expiry must be in the future")]
    ExpiryInPast,

    #[error("available quantity must not be negative")]
    NegativeQuantity,

    #[error("bundle item quantity must be greater than zero")]
    InvalidBundleItemQuantity,

    #[error("product #{0} appears more than once in the bundle")]
    DuplicateBundleItem(i64),

    #[error("product #{product_id} does not belong to merchant #{merchant_id}")]
    ForeignBundleItem { product_id: i64, merchant_id: i64 },

    #[error("merchant #{0} not found")]
    MerchantNotFound(i64),

    #[error("listing {0} not found")]
    NotFound(ListingRef),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("pickup window end must be after its start")]
    InvalidPickupWindow,

    #[error("order must contain at least one item")]
    EmptyOrder,

    #[error("quantity for {0} must be greater than zero")]
    InvalidQuantity(ListingRef),

    #[error("merchant #{0} not found")]
    MerchantNotFound(i64),

    #[error("{listing} does not belong to merchant #{merchant_id}")]
    OwnershipMismatch {
        listing: ListingRef,
        merchant_id: i64,
    },

    #[error("insufficient inventory for {listing}: requested {requested}, available {available}")]
    InsufficientInventory {
        listing: ListingRef,
        requested: i32,
        available: i32,
    },

    #[error("order #{0} not found")]
    OrderNotFound(i64),

    #[error("cannot move order from {current} to {requested}")]
    IllegalStatusTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },

    #[error("no unique confirmation code found after {attempts} attempts")]
    CodeGenerationExhausted { attempts: u32 },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Why a submitted cart could not be priced.
#[derive(Debug, Error)]
pub enum QuoteError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<diesel::result::Error> for OrderError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Storage(error.into())
    }
}

impl From<diesel::result::Error> for ListingError {
    fn from(error: diesel::result::Error) -> Self {
        Self::Storage(error.into())
    }
}
