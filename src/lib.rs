//! Order service of a food-rescue marketplace: merchants list surplus food
//! near its expiry, customers reserve it for pickup.

pub mod domain;
pub mod models;
pub mod platform;
pub mod routes;
pub mod schema;
pub mod service;
pub mod store;
