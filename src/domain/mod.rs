//! Order placement, inventory and discovery core.
//!
//! Nothing in here touches storage or the clock; callers pass `now` in.

pub mod cart;
pub mod confirmation;
pub mod discovery;
pub mod errors;
pub mod geo;
pub mod listing;
pub mod order;
pub mod placement;
