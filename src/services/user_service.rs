// src/services/user_service.rs

use sqlx::PgPool;

use crate::{
    common::error::AppError,
    db::{InventoryRepository, UserRepository},
    models::{
        auth::{CreateUserPayload, User},
        inventory::InventoryType,
        tenancy::{Role, TenantContext},
    },
    services::{access, auth::hash_password},
};

#[derive(Clone)]
pub struct UserService {
    pool: PgPool,
    user_repo: UserRepository,
    inventory_repo: InventoryRepository,
}

impl UserService {
    pub fn new(pool: PgPool, user_repo: UserRepository, inventory_repo: InventoryRepository) -> Self {
        Self {
            pool,
            user_repo,
            inventory_repo,
        }
    }

    /// Cria um usuário da empresa. Revendedores ganham o próprio estoque na mesma transação.
    pub async fn create_user(
        &self,
        ctx: &TenantContext,
        payload: CreateUserPayload,
    ) -> Result<User, AppError> {
        access::require_admin(ctx)?;

        let hashed_password = hash_password(payload.password.clone()).await?;

        let mut tx = self.pool.begin().await?;

        let user = self
            .user_repo
            .create_user(
                &mut *tx,
                ctx.tenant_id,
                payload.name.trim(),
                payload.email.trim(),
                &hashed_password,
                payload.role,
            )
            .await?;

        if user.role == Role::Reseller {
            self.inventory_repo
                .create_inventory(&mut *tx, ctx.tenant_id, InventoryType::Reseller, Some(user.id))
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            created_by = %ctx.user_id,
            user_id = %user.id,
            role = ?user.role,
            "👤 Usuário criado"
        );
        Ok(user)
    }

    pub async fn list_users(&self, ctx: &TenantContext) -> Result<Vec<User>, AppError> {
        access::require_admin(ctx)?;
        self.user_repo.list(ctx.tenant_id).await
    }

    pub async fn me(&self, ctx: &TenantContext) -> Result<User, AppError> {
        self.user_repo
            .find_by_id(&self.pool, ctx.tenant_id, ctx.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Usuário".into()))
    }
}
