pub mod auth;
pub mod billing;
pub mod catalog;
pub mod crm;
pub mod inventory;
pub mod sales;
pub mod users;
