pub mod access;
pub mod auth;
pub mod catalog_service;
pub mod crm_service;
pub mod inventory_service;
pub mod payment_plan;
pub mod sales_service;
pub mod tenancy_service;
pub mod user_service;
