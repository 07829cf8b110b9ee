pub mod auth;
pub mod billing;
