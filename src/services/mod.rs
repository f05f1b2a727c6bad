pub mod activity;
pub mod alerts;
pub mod errors;
pub mod export;
pub mod items;
pub mod orders;
pub mod recipients;
pub mod reports;
pub mod sales;
pub mod suppliers;
pub mod users;
