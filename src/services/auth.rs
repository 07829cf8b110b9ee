// src/services/auth.rs

use std::sync::Arc;

use bcrypt::{hash, verify};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use sqlx::PgPool;

use crate::{
    common::{clock::Clock, error::AppError},
    db::{InventoryRepository, TenantRepository, UserRepository},
    models::{
        auth::{Claims, LoginUserPayload, RegisterTenantPayload, User},
        inventory::InventoryType,
        tenancy::Role,
    },
};

/// Hash bcrypt fora do executor assíncrono.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    let hashed = tokio::task::spawn_blocking(move || hash(&password, bcrypt::DEFAULT_COST))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de hashing: {}", e))??;
    Ok(hashed)
}

async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    let valid = tokio::task::spawn_blocking(move || verify(&password, &password_hash))
        .await
        .map_err(|e| anyhow::anyhow!("Falha na task de verificação de senha: {}", e))??;
    Ok(valid)
}

/// Emite um JWT HS256 para o usuário.
pub fn issue_token(
    user: &User,
    secret: &str,
    now: DateTime<Utc>,
    expiration_hours: i64,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user.id,
        tenant_id: user.tenant_id,
        username: user.name.clone(),
        role: user.role,
        exp: (now + Duration::hours(expiration_hours)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?)
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )
    .map_err(|_| AppError::InvalidToken)?;

    Ok(data.claims)
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    user_repo: UserRepository,
    tenant_repo: TenantRepository,
    inventory_repo: InventoryRepository,
    jwt_secret: String,
    jwt_expiration_hours: i64,
    trial_days: i64,
    clock: Arc<dyn Clock>,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        user_repo: UserRepository,
        tenant_repo: TenantRepository,
        inventory_repo: InventoryRepository,
        jwt_secret: String,
        jwt_expiration_hours: i64,
        trial_days: i64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            user_repo,
            tenant_repo,
            inventory_repo,
            jwt_secret,
            jwt_expiration_hours,
            trial_days,
            clock,
        }
    }

    /// Cadastra a empresa, o primeiro administrador e o estoque principal numa única transação.
    pub async fn register_tenant(&self, payload: RegisterTenantPayload) -> Result<String, AppError> {
        // Hashing fora da transação: não toca no banco.
        let hashed_password = hash_password(payload.password.clone()).await?;
        let now = self.clock.now();

        let mut tx = self.pool.begin().await?;

        let tenant = self
            .tenant_repo
            .create_tenant(
                &mut *tx,
                payload.company_name.trim(),
                now + Duration::days(self.trial_days),
            )
            .await?;

        let admin = self
            .user_repo
            .create_user(
                &mut *tx,
                tenant.id,
                payload.name.trim(),
                payload.email.trim(),
                &hashed_password,
                Role::Admin,
            )
            .await?;

        let primary = self
            .inventory_repo
            .create_inventory(&mut *tx, tenant.id, InventoryType::Primary, None)
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant.id,
            user_id = %admin.id,
            inventory_id = %primary.id,
            trial_ends_at = %tenant.trial_ends_at,
            "🏢 Empresa cadastrada"
        );

        issue_token(&admin, &self.jwt_secret, now, self.jwt_expiration_hours)
    }

    pub async fn login_user(&self, payload: LoginUserPayload) -> Result<String, AppError> {
        let user = self
            .user_repo
            .find_by_email(payload.email.trim())
            .await?
            .ok_or(AppError::InvalidCredentials)?;

        let is_password_valid = verify_password(payload.password, user.password_hash.clone()).await?;
        if !is_password_valid {
            return Err(AppError::InvalidCredentials);
        }

        issue_token(
            &user,
            &self.jwt_secret,
            self.clock.now(),
            self.jwt_expiration_hours,
        )
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        decode_token(token, &self.jwt_secret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const SECRET: &str = "segredo-de-teste";

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "Ana".into(),
            email: "ana@loja.com".into(),
            password_hash: String::new(),
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_token_carries_tenant_and_role() {
        let u = user(Role::Reseller);
        let token = issue_token(&u, SECRET, Utc::now(), 1).unwrap();
        let claims = decode_token(&token, SECRET).unwrap();

        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.tenant_id, u.tenant_id);
        assert_eq!(claims.username, "Ana");
        assert_eq!(claims.role, Role::Reseller);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_token_with_wrong_secret_is_rejected() {
        let token = issue_token(&user(Role::Admin), SECRET, Utc::now(), 1).unwrap();
        assert!(matches!(decode_token(&token, "outro"), Err(AppError::InvalidToken)));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let issued = Utc::now() - Duration::days(2);
        let token = issue_token(&user(Role::Admin), SECRET, issued, 1).unwrap();
        assert!(matches!(decode_token(&token, SECRET), Err(AppError::InvalidToken)));
    }

    #[tokio::test]
    async fn test_password_hash_roundtrip() {
        let hashed = hash_password("senha123".into()).await.unwrap();
        assert!(verify_password("senha123".into(), hashed.clone()).await.unwrap());
        assert!(!verify_password("errada".into(), hashed).await.unwrap());
    }
}
