// src/services/crm_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{db_utils::not_found_as, error::AppError},
    db::CustomerRepository,
    models::{
        crm::{Customer, CustomerPayload},
        tenancy::TenantContext,
    },
};

fn clean_phone(phone: Option<&str>) -> Option<&str> {
    phone.map(str::trim).filter(|p| !p.is_empty())
}

#[derive(Clone)]
pub struct CrmService {
    pool: PgPool,
    repo: CustomerRepository,
}

impl CrmService {
    pub fn new(pool: PgPool, repo: CustomerRepository) -> Self {
        Self { pool, repo }
    }

    pub async fn create_customer(
        &self,
        ctx: &TenantContext,
        payload: CustomerPayload,
    ) -> Result<Customer, AppError> {
        let customer = self
            .repo
            .create(
                ctx.tenant_id,
                payload.name.trim(),
                clean_phone(payload.phone.as_deref()),
            )
            .await?;

        tracing::info!(tenant_id = %ctx.tenant_id, customer_id = %customer.id, "Cliente criado");
        Ok(customer)
    }

    pub async fn list_customers(
        &self,
        ctx: &TenantContext,
        search: Option<&str>,
    ) -> Result<Vec<Customer>, AppError> {
        self.repo.list(ctx.tenant_id, search).await
    }

    pub async fn get_customer(&self, ctx: &TenantContext, id: Uuid) -> Result<Customer, AppError> {
        not_found_as(
            self.repo.find_by_id(&self.pool, ctx.tenant_id, id).await,
            "Cliente",
        )
    }

    pub async fn update_customer(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        payload: CustomerPayload,
    ) -> Result<Customer, AppError> {
        not_found_as(
            self.repo
                .update(
                    ctx.tenant_id,
                    id,
                    payload.name.trim(),
                    clean_phone(payload.phone.as_deref()),
                )
                .await,
            "Cliente",
        )
    }

    pub async fn delete_customer(&self, ctx: &TenantContext, id: Uuid) -> Result<(), AppError> {
        if !self.repo.soft_delete(ctx.tenant_id, id).await? {
            return Err(AppError::NotFound("Cliente".into()));
        }
        tracing::info!(tenant_id = %ctx.tenant_id, customer_id = %id, "Cliente removido");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_phone_is_dropped() {
        assert_eq!(clean_phone(Some("  ")), None);
        assert_eq!(clean_phone(Some(" 11 99999-0000 ")), Some("11 99999-0000"));
        assert_eq!(clean_phone(None), None);
    }
}
