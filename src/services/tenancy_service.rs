// src/services/tenancy_service.rs

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    common::{clock::Clock, error::AppError},
    db::{TenantRepository, UserRepository},
    models::{
        auth::Claims,
        tenancy::{BillingContext, BillingStatus, Tenant, TenantContext},
    },
};

pub fn billing_status(tenant: &Tenant, now: chrono::DateTime<chrono::Utc>) -> BillingStatus {
    BillingStatus {
        tenant_id: tenant.id,
        subscription_status: tenant.subscription_status,
        trial_ends_at: tenant.trial_ends_at,
        current_period_end: tenant.current_period_end,
        can_write: tenant.can_write(now),
    }
}

#[derive(Clone)]
pub struct TenantService {
    pool: PgPool,
    tenant_repo: TenantRepository,
    user_repo: UserRepository,
    clock: Arc<dyn Clock>,
}

impl TenantService {
    pub fn new(
        pool: PgPool,
        tenant_repo: TenantRepository,
        user_repo: UserRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            tenant_repo,
            user_repo,
            clock,
        }
    }

    /// Monta o contexto da requisição a partir do token.
    ///
    /// Nome e papel vêm do banco, não do token: mudanças valem já na próxima requisição.
    pub async fn load_context(&self, claims: &Claims) -> Result<TenantContext, AppError> {
        let tenant = self
            .tenant_repo
            .find_by_id(claims.tenant_id)
            .await?
            .ok_or(AppError::InvalidToken)?;
        let user = self
            .user_repo
            .find_by_id(&self.pool, tenant.id, claims.sub)
            .await?
            .ok_or(AppError::InvalidToken)?;

        Ok(TenantContext {
            tenant_id: tenant.id,
            user_id: user.id,
            username: user.name,
            role: user.role,
            billing: BillingContext {
                can_write: tenant.can_write(self.clock.now()),
            },
        })
    }

    pub async fn billing_status(&self, ctx: &TenantContext) -> Result<BillingStatus, AppError> {
        let tenant = self
            .tenant_repo
            .find_by_id(ctx.tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Empresa".into()))?;

        Ok(billing_status(&tenant, self.clock.now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::tenancy::SubscriptionStatus;
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn test_billing_status_after_trial() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let tenant = Tenant {
            id: Uuid::new_v4(),
            name: "Loja".into(),
            subscription_status: SubscriptionStatus::Trialing,
            trial_ends_at: start + Duration::days(15),
            current_period_end: None,
            created_at: start,
            updated_at: start,
        };

        assert!(billing_status(&tenant, start + Duration::days(1)).can_write);

        let expired = billing_status(&tenant, start + Duration::days(16));
        assert!(!expired.can_write);
        assert_eq!(expired.subscription_status, SubscriptionStatus::Trialing);
        assert_eq!(expired.tenant_id, tenant.id);
    }
}
