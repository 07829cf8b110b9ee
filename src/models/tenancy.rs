// src/models/tenancy.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Reseller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "subscription_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

// --- Tenant (empresa) ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub subscription_status: SubscriptionStatus,
    pub trial_ends_at: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Escrita liberada durante o trial vigente ou com assinatura ativa no período.
    pub fn can_write(&self, now: DateTime<Utc>) -> bool {
        match self.subscription_status {
            SubscriptionStatus::Trialing => now < self.trial_ends_at,
            SubscriptionStatus::Active => self.current_period_end.is_none_or(|end| now < end),
            SubscriptionStatus::PastDue | SubscriptionStatus::Canceled => false,
        }
    }
}

// Resposta de GET /api/billing/status
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BillingStatus {
    pub tenant_id: Uuid,
    pub subscription_status: SubscriptionStatus,
    pub trial_ends_at: DateTime<Utc>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub can_write: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct BillingContext {
    pub can_write: bool,
}

/// Identidade da requisição, montada pelo middleware de autenticação.
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub billing: BillingContext,
}
