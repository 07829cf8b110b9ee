// src/db/crm_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::like_pattern, error::AppError},
    models::crm::Customer,
};

const CUSTOMER_COLUMNS: &str = "id, tenant_id, name, phone, created_at, updated_at";

#[derive(Clone)]
pub struct CustomerRepository {
    pool: PgPool,
}

impl CustomerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        tenant_id: Uuid,
        name: &str,
        phone: Option<&str>,
    ) -> Result<Customer, AppError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (tenant_id, name, phone)
             VALUES ($1, $2, $3)
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await?;

        Ok(customer)
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Customer>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(customer)
    }

    // Busca por nome ou telefone (ILIKE)
    pub async fn list(
        &self,
        tenant_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Customer>, AppError> {
        let pattern = like_pattern(search);

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {CUSTOMER_COLUMNS} FROM customers
             WHERE tenant_id = $1 AND deleted_at IS NULL
               AND ($2::text IS NULL OR name ILIKE $2 OR phone ILIKE $2)
             ORDER BY name"
        ))
        .bind(tenant_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    pub async fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        name: &str,
        phone: Option<&str>,
    ) -> Result<Option<Customer>, AppError> {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers SET name = $3, phone = $4, updated_at = NOW()
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
             RETURNING {CUSTOMER_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(name)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Exclusão lógica. Retorna falso se o cliente não existia.
    pub async fn soft_delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE customers SET deleted_at = NOW()
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
