//! Order lifecycle: statuses, transition policies and pickup-window predicates.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{errors::OrderError, listing::ListingRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [Self; 6] = [
        Self::Pending,
        Self::Confirmed,
        Self::Preparing,
        Self::Ready,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Pending through ready: still on a merchant's board.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Next step of the linear fulfilment sequence.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Confirmed),
            Self::Confirmed => Some(Self::Preparing),
            Self::Preparing => Some(Self::Ready),
            Self::Ready => Some(Self::Completed),
            Self::Completed | Self::Cancelled => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown order status {s:?}"))
    }
}

/// Which targets a merchant may move a non-terminal order to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum TransitionPolicy {
    /// Any status, as long as the order is not completed or cancelled.
    #[default]
    Permissive,
    /// Only the next step of the sequence, or cancellation.
    Forward,
}

impl TransitionPolicy {
    pub fn check(self, current: OrderStatus, requested: OrderStatus) -> Result<(), OrderError> {
        let allowed = !current.is_terminal()
            && match self {
                Self::Permissive => true,
                Self::Forward => {
                    requested == OrderStatus::Cancelled || current.next() == Some(requested)
                }
            };

        if allowed {
            Ok(())
        } else {
            Err(OrderError::IllegalStatusTransition { current, requested })
        }
    }
}

/// What happens to reserved stock when an order is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum CancellationPolicy {
    #[default]
    KeepInventory,
    RestoreInventory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct PickupWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl PickupWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, OrderError> {
        if end <= start {
            return Err(OrderError::InvalidPickupWindow);
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Inclusive at both ends.
    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct OrderItem {
    pub id: i64,
    pub listing: ListingRef,
    pub name: String,
    pub quantity: i32,
    /// Price at purchase time; never follows later listing edits.
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Order {
    pub id: i64,
    pub customer_id: i64,
    pub merchant_id: i64,
    pub status: OrderStatus,
    pub confirmation_code: String,
    pub total_amount: Decimal,
    pub pickup_window: PickupWindow,
    pub note: Option<String>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn is_completed(&self) -> bool {
        self.status == OrderStatus::Completed
    }

    pub fn can_be_picked_up(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatus::Ready && self.pickup_window.contains(now)
    }

    /// Past the window and not completed. Cancelled orders count as overdue too.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.pickup_window.end() < now && !self.is_completed()
    }

    /// Applies a status change the policy has already accepted.
    pub(crate) fn apply_status(&mut self, status: OrderStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
        if status == OrderStatus::Completed {
            self.picked_up_at = Some(now);
        }
    }
}

/// One submitted cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderLine {
    pub listing: ListingRef,
    pub quantity: i32,
}

/// A cart snapshot submitted for placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct NewOrder {
    #[serde(default)]
    pub customer_id: i64,
    pub merchant_id: i64,
    pub pickup_window_start: DateTime<Utc>,
    pub pickup_window_end: DateTime<Utc>,
    pub note: Option<String>,
    pub lines: Vec<OrderLine>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 14, hour, minute, 0).unwrap()
    }

    fn order(status: OrderStatus) -> Order {
        Order {
            id: 1,
            customer_id: 10,
            merchant_id: 20,
            status,
            confirmation_code: "BA1234".into(),
            total_amount: Decimal::new(500, 2),
            pickup_window: PickupWindow::new(at(10, 0), at(11, 0)).unwrap(),
            note: None,
            picked_up_at: None,
            created_at: at(9, 0),
            updated_at: at(9, 0),
            items: vec![],
        }
    }

    #[test]
    fn window_end_must_follow_start() {
        assert!(matches!(
            PickupWindow::new(at(10, 0), at(10, 0)),
            Err(OrderError::InvalidPickupWindow)
        ));
        assert!(PickupWindow::new(at(10, 0), at(10, 1)).is_ok());
    }

    #[test]
    fn ready_order_can_be_picked_up_inside_window() {
        let order = order(OrderStatus::Ready);

        assert!(order.can_be_picked_up(at(10, 30)));
        assert!(order.can_be_picked_up(at(10, 0)));
        assert!(order.can_be_picked_up(at(11, 0)));
        assert!(!order.can_be_picked_up(at(9, 59)));
        assert!(!order.can_be_picked_up(at(11, 1)));
    }

    #[test]
    fn only_ready_orders_can_be_picked_up() {
        assert!(!order(OrderStatus::Preparing).can_be_picked_up(at(10, 30)));
    }

    #[test]
    fn overdue_ignores_cancellation() {
        let later = at(11, 0) + Duration::minutes(1);

        assert!(order(OrderStatus::Cancelled).is_overdue(later));
        assert!(order(OrderStatus::Ready).is_overdue(later));
        assert!(!order(OrderStatus::Completed).is_overdue(later));
        assert!(!order(OrderStatus::Ready).is_overdue(at(11, 0)));
    }

    #[test]
    fn terminal_states_never_transition() {
        for policy in [TransitionPolicy::Permissive, TransitionPolicy::Forward] {
            for current in [OrderStatus::Completed, OrderStatus::Cancelled] {
                for requested in OrderStatus::ALL {
                    assert!(
                        policy.check(current, requested).is_err(),
                        "{policy:?}: {current} -> {requested}"
                    );
                }
            }
        }
    }

    #[test]
    fn permissive_policy_allows_any_target() {
        let policy = TransitionPolicy::Permissive;

        assert!(policy.check(OrderStatus::Ready, OrderStatus::Pending).is_ok());
        assert!(policy.check(OrderStatus::Pending, OrderStatus::Completed).is_ok());
    }

    #[test]
    fn forward_policy_enforces_sequence() {
        let policy = TransitionPolicy::Forward;

        assert!(policy.check(OrderStatus::Pending, OrderStatus::Confirmed).is_ok());
        assert!(policy.check(OrderStatus::Ready, OrderStatus::Completed).is_ok());
        assert!(policy.check(OrderStatus::Preparing, OrderStatus::Cancelled).is_ok());
        assert!(policy.check(OrderStatus::Pending, OrderStatus::Ready).is_err());
        assert!(policy.check(OrderStatus::Ready, OrderStatus::Confirmed).is_err());
    }

    #[test]
    fn completing_stamps_pickup_time() {
        let mut order = order(OrderStatus::Ready);

        order.apply_status(OrderStatus::Completed, at(10, 45));

        assert_eq!(order.picked_up_at, Some(at(10, 45)));
        assert_eq!(order.updated_at, at(10, 45));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert!("delivered".parse::<OrderStatus>().is_err());
    }
}
