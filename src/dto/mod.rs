pub mod auth;
pub mod categories;
pub mod orders;
pub mod prescriptions;
pub mod products;
pub mod variants;
