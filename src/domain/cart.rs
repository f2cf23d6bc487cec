//! Single-merchant cart.
//!
//! A pickup order is collected from one place in one window, so a cart only
//! ever holds listings of one merchant. Prices here are what the customer saw
//! when adding; placement re-reads the authoritative ones.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    errors::CartError,
    listing::{Listing, ListingRef},
    order::{NewOrder, OrderLine},
};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CartLine {
    pub listing: ListingRef,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl CartLine {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct Cart {
    merchant_id: Option<i64>,
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merchant_id(&self) -> Option<i64> {
        self.merchant_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn can_add(&self, merchant_id: i64) -> bool {
        self.is_empty() || self.merchant_id == Some(merchant_id)
    }

    /// Adds `quantity` of `listing`, merging with an existing line.
    ///
    /// The cart is left untouched on error.
    pub fn add(&mut self, listing: &Listing, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        if !self.can_add(listing.merchant_id) {
            return Err(CartError::CrossMerchant {
                cart_merchant: self.merchant_id.unwrap_or_default(),
                listing_merchant: listing.merchant_id,
            });
        }

        match self.line_mut(listing.listing) {
            Some(line) => {
                line.quantity = line
                    .quantity
                    .checked_add(quantity)
                    .ok_or(CartError::InvalidQuantity)?;
            }
            None => self.lines.push(CartLine {
                listing: listing.listing,
                name: listing.name.clone(),
                unit_price: listing.discounted_price,
                quantity,
            }),
        }
        self.merchant_id = Some(listing.merchant_id);

        Ok(())
    }

    pub fn remove(&mut self, listing: ListingRef) {
        self.lines.retain(|line| line.listing != listing);
        if self.lines.is_empty() {
            self.merchant_id = None;
        }
    }

    /// Zero or negative quantities remove the line.
    pub fn set_quantity(&mut self, listing: ListingRef, quantity: i64) {
        let Ok(quantity @ 1..) = u32::try_from(quantity) else {
            self.remove(listing);
            return;
        };

        if let Some(line) = self.line_mut(listing) {
            line.quantity = quantity;
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.merchant_id = None;
    }

    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::subtotal).sum()
    }

    pub fn item_count(&self) -> u32 {
        self.lines
            .iter()
            .fold(0, |count: u32, line| count.saturating_add(line.quantity))
    }

    /// Turns the cart into a placement request. `None` for an empty cart.
    pub fn checkout(
        &self,
        customer_id: i64,
        pickup_window_start: DateTime<Utc>,
        pickup_window_end: DateTime<Utc>,
        note: Option<String>,
    ) -> Option<NewOrder> {
        let merchant_id = self.merchant_id?;

        Some(NewOrder {
            customer_id,
            merchant_id,
            pickup_window_start,
            pickup_window_end,
            note,
            lines: self
                .lines
                .iter()
                .map(|line| OrderLine {
                    listing: line.listing,
                    quantity: i32::try_from(line.quantity).unwrap_or(i32::MAX),
                })
                .collect(),
        })
    }

    fn line_mut(&mut self, listing: ListingRef) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.listing == listing)
    }
}
