// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::{
        clock::{Clock, SystemClock},
        codegen::{CodeGenerator, KsuidGenerator},
    },
    db::{
        CatalogRepository, CustomerRepository, InventoryRepository, SalesRepository,
        TenantRepository, UserRepository,
    },
    services::{
        auth::AuthService, catalog_service::CatalogService, crm_service::CrmService,
        inventory_service::InventoryService, sales_service::SalesService,
        tenancy_service::TenantService, user_service::UserService,
    },
};

// Configuração lida do ambiente (.env)
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub database_max_connections: u32,
    pub database_acquire_timeout_secs: u64,
    pub jwt_expiration_hours: i64,
    pub trial_days: i64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| get(key).with_context(|| format!("{} deve ser definida", key));

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            server_addr: get("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            database_acquire_timeout_secs: parse_or(&get, "DATABASE_ACQUIRE_TIMEOUT_SECS", 3)?,
            jwt_expiration_hours: parse_or(&get, "JWT_EXPIRATION_HOURS", 168)?,
            trial_days: parse_or(&get, "TRIAL_DAYS", 15)?,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} inválida: {}", key, raw)),
        None => Ok(default),
    }
}

// O estado compartilhado que será acessível em toda a aplicação
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub tenant_service: TenantService,
    pub user_service: UserService,
    pub crm_service: CrmService,
    pub catalog_service: CatalogService,
    pub inventory_service: InventoryService,
    pub sales_service: SalesService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(config.database_acquire_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        sqlx::migrate!()
            .run(&db_pool)
            .await
            .context("Falha ao rodar as migrações do banco de dados")?;

        tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

        Ok(Self::build(db_pool, config, Arc::new(SystemClock), Arc::new(KsuidGenerator)))
    }

    // --- Monta o gráfico de dependências ---
    pub(crate) fn build(
        db_pool: PgPool,
        config: &Config,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        let user_repo = UserRepository::new(db_pool.clone());
        let tenant_repo = TenantRepository::new(db_pool.clone());
        let customer_repo = CustomerRepository::new(db_pool.clone());
        let catalog_repo = CatalogRepository::new(db_pool.clone());
        let inventory_repo = InventoryRepository::new(db_pool.clone());
        let sales_repo = SalesRepository::new(db_pool.clone());

        let auth_service = AuthService::new(
            db_pool.clone(),
            user_repo.clone(),
            tenant_repo.clone(),
            inventory_repo.clone(),
            config.jwt_secret.clone(),
            config.jwt_expiration_hours,
            config.trial_days,
            clock.clone(),
        );
        let tenant_service =
            TenantService::new(db_pool.clone(), tenant_repo, user_repo.clone(), clock.clone());
        let user_service =
            UserService::new(db_pool.clone(), user_repo.clone(), inventory_repo.clone());
        let crm_service = CrmService::new(db_pool.clone(), customer_repo.clone());
        let catalog_service = CatalogService::new(db_pool.clone(), catalog_repo.clone());
        let inventory_service = InventoryService::new(
            db_pool.clone(),
            inventory_repo.clone(),
            catalog_repo.clone(),
            clock.clone(),
        );
        let sales_service = SalesService::new(
            db_pool.clone(),
            sales_repo,
            catalog_repo,
            inventory_repo,
            customer_repo,
            user_repo,
            inventory_service.clone(),
            clock,
            codes,
        );

        Self {
            db_pool,
            auth_service,
            tenant_service,
            user_service,
            crm_service,
            catalog_service,
            inventory_service,
            sales_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "s")]))
                .unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:3000");
        assert_eq!(config.database_max_connections, 5);
        assert_eq!(config.database_acquire_timeout_secs, 3);
        assert_eq!(config.jwt_expiration_hours, 168);
        assert_eq!(config.trial_days, 15);
    }

    #[test]
    fn test_missing_secret_fails() {
        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x")])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_invalid_number_fails() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://x"),
            ("JWT_SECRET", "s"),
            ("TRIAL_DAYS", "quinze"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("TRIAL_DAYS"));
    }
}
