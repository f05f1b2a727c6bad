pub mod models;
pub mod money;
pub mod policy;
pub mod reports;
pub mod stock;
