pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod crm_repo;
pub use crm_repo::CustomerRepository;
pub mod inventory_repo;
pub use inventory_repo::InventoryRepository;
pub mod sales_repo;
pub use sales_repo::SalesRepository;
pub mod tenancy_repo;
pub use tenancy_repo::TenantRepository;
pub mod user_repo;
pub use user_repo::UserRepository;
