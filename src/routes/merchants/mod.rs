pub mod listings;
pub mod orders;
pub mod profile;
