// src/db/tenancy_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::tenancy::Tenant};

#[derive(Clone)]
pub struct TenantRepository {
    pool: PgPool,
}

impl TenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Cria a empresa já em período de teste.
    pub async fn create_tenant<'e, E>(
        &self,
        executor: E,
        name: &str,
        trial_ends_at: DateTime<Utc>,
    ) -> Result<Tenant, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (name, subscription_status, trial_ends_at)
            VALUES ($1, 'TRIALING', $2)
            RETURNING id, name, subscription_status, trial_ends_at, current_period_end,
                      created_at, updated_at
            "#,
        )
        .bind(name)
        .bind(trial_ends_at)
        .fetch_one(executor)
        .await?;

        Ok(tenant)
    }

    // Usado a cada requisição autenticada para recalcular o `can_write`.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, name, subscription_status, trial_ends_at, current_period_end,
                   created_at, updated_at
            FROM tenants
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }
}
