//! Validation and pricing of a submitted cart against fresh listing reads.
//!
//! Stores call [`reserve`] while holding whatever lock serialises access to
//! the listings involved, then apply the returned decrements and persist the
//! order in the same atomic unit.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::{
    errors::OrderError,
    listing::{Listing, ListingRef},
    order::{NewOrder, PickupWindow},
};

/// A line that passed every check, priced at the current listing price.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservedItem {
    pub listing: ListingRef,
    pub name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    pub pickup_window: PickupWindow,
    pub items: Vec<ReservedItem>,
    pub total_amount: Decimal,
}

/// Collapses repeated listings and returns lines in lock order.
///
/// Sorting keeps concurrent placements acquiring row locks in the same order.
pub fn merged_lines(order: &NewOrder) -> Result<Vec<(ListingRef, i32)>, OrderError> {
    if order.lines.is_empty() {
        return Err(OrderError::EmptyOrder);
    }

    let mut merged: BTreeMap<ListingRef, i32> = BTreeMap::new();
    for line in &order.lines {
        if line.quantity <= 0 {
            return Err(OrderError::InvalidQuantity(line.listing));
        }
        let quantity = merged.entry(line.listing).or_default();
        *quantity = quantity.saturating_add(line.quantity);
    }

    Ok(merged.into_iter().collect())
}

/// Checks what needs no storage read: the pickup window first, then the lines.
///
/// Returns the merged lines in lock order.
pub fn check_request(order: &NewOrder) -> Result<Vec<(ListingRef, i32)>, OrderError> {
    PickupWindow::new(order.pickup_window_start, order.pickup_window_end)?;
    merged_lines(order)
}

/// Checks the window, ownership and stock of every line; all-or-nothing.
///
/// `stock` holds the freshest read of each listing. Listings missing from it
/// are treated as no longer available.
pub fn reserve(
    order: &NewOrder,
    stock: &HashMap<ListingRef, Listing>,
    now: DateTime<Utc>,
) -> Result<Reservation, OrderError> {
    let pickup_window = PickupWindow::new(order.pickup_window_start, order.pickup_window_end)?;
    let lines = merged_lines(order)?;

    for (listing, _) in &lines {
        if let Some(found) = stock.get(listing)
            && found.merchant_id != order.merchant_id
        {
            return Err(OrderError::OwnershipMismatch {
                listing: *listing,
                merchant_id: order.merchant_id,
            });
        }
    }

    let mut items = Vec::with_capacity(lines.len());
    for (listing, quantity) in lines {
        let Some(found) = stock.get(&listing) else {
            return Err(OrderError::InsufficientInventory {
                listing,
                requested: quantity,
                available: 0,
            });
        };

        if !found.is_available(now) || quantity > found.available_quantity {
            return Err(OrderError::InsufficientInventory {
                listing,
                requested: quantity,
                available: if found.expires_at > now {
                    found.available_quantity
                } else {
                    0
                },
            });
        }

        items.push(ReservedItem {
            listing,
            name: found.name.clone(),
            quantity,
            unit_price: found.discounted_price,
        });
    }

    let total_amount = items
        .iter()
        .map(|item| item.unit_price * Decimal::from(item.quantity))
        .sum::<Decimal>()
        .round_dp(2);

    Ok(Reservation {
        pickup_window,
        items,
        total_amount,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::domain::order::OrderLine;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 14, 16, 0, 0).unwrap()
    }

    fn stock(listings: &[(ListingRef, i64, i32, i64)]) -> HashMap<ListingRef, Listing> {
        listings
            .iter()
            .map(|&(listing, merchant_id, quantity, cents)| {
                (
                    listing,
                    Listing {
                        listing,
                        merchant_id,
                        name: format!("{listing}"),
                        original_price: Decimal::new(cents * 3, 2),
                        discounted_price: Decimal::new(cents, 2),
                        available_quantity: quantity,
                        expires_at: now() + Duration::hours(2),
                    },
                )
            })
            .collect()
    }

    fn new_order(lines: &[(ListingRef, i32)]) -> NewOrder {
        NewOrder {
            customer_id: 7,
            merchant_id: 1,
            pickup_window_start: now() + Duration::hours(1),
            pickup_window_end: now() + Duration::hours(2),
            note: None,
            lines: lines
                .iter()
                .map(|&(listing, quantity)| OrderLine { listing, quantity })
                .collect(),
        }
    }

    #[test]
    fn prices_items_and_totals() {
        let stock = stock(&[
            (ListingRef::Product(1), 1, 5, 250),
            (ListingRef::Bundle(2), 1, 1, 499),
        ]);
        let order = new_order(&[(ListingRef::Product(1), 2), (ListingRef::Bundle(2), 1)]);

        let reservation = reserve(&order, &stock, now()).unwrap();

        assert_eq!(reservation.total_amount, Decimal::new(999, 2));
        assert_eq!(reservation.items.len(), 2);
    }

    #[test]
    fn repeated_lines_are_checked_together() {
        let stock = stock(&[(ListingRef::Product(1), 1, 3, 100)]);
        let order = new_order(&[(ListingRef::Product(1), 2), (ListingRef::Product(1), 2)]);

        let result = reserve(&order, &stock, now());

        assert!(matches!(
            result,
            Err(OrderError::InsufficientInventory {
                requested: 4,
                available: 3,
                ..
            })
        ));
    }

    #[test]
    fn rejects_inverted_window_first() {
        let stock = stock(&[(ListingRef::Product(1), 2, 0, 100)]);
        let mut order = new_order(&[(ListingRef::Product(1), 1)]);
        order.pickup_window_end = order.pickup_window_start;

        assert!(matches!(
            reserve(&order, &stock, now()),
            Err(OrderError::InvalidPickupWindow)
        ));
    }

    #[test]
    fn ownership_is_checked_before_stock() {
        let stock = stock(&[
            (ListingRef::Product(1), 1, 0, 100),
            (ListingRef::Product(2), 9, 5, 100),
        ]);
        let order = new_order(&[(ListingRef::Product(1), 1), (ListingRef::Product(2), 1)]);

        assert!(matches!(
            reserve(&order, &stock, now()),
            Err(OrderError::OwnershipMismatch {
                listing: ListingRef::Product(2),
                merchant_id: 1,
            })
        ));
    }

    #[test]
    fn expired_listing_is_insufficient() {
        let mut stock = stock(&[(ListingRef::Product(1), 1, 5, 100)]);
        if let Some(listing) = stock.get_mut(&ListingRef::Product(1)) {
            listing.expires_at = now();
        }
        let order = new_order(&[(ListingRef::Product(1), 1)]);

        assert!(matches!(
            reserve(&order, &stock, now()),
            Err(OrderError::InsufficientInventory { available: 0, .. })
        ));
    }

    #[test]
    fn unknown_listing_is_insufficient() {
        let order = new_order(&[(ListingRef::Bundle(5), 1)]);

        assert!(matches!(
            reserve(&order, &HashMap::new(), now()),
            Err(OrderError::InsufficientInventory {
                listing: ListingRef::Bundle(5),
                available: 0,
                ..
            })
        ));
    }

    #[test]
    fn rejects_empty_and_non_positive_lines() {
        let stock = stock(&[(ListingRef::Product(1), 1, 5, 100)]);

        assert!(matches!(
            reserve(&new_order(&[]), &stock, now()),
            Err(OrderError::EmptyOrder)
        ));
        assert!(matches!(
            reserve(&new_order(&[(ListingRef::Product(1), 0)]), &stock, now()),
            Err(OrderError::InvalidQuantity(ListingRef::Product(1)))
        ));
    }
}
