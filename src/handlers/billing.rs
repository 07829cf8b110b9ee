// src/handlers/billing.rs

use axum::{extract::State, Json};

use crate::{
    common::error::AppError,
    config::AppState,
    models::tenancy::{BillingStatus, TenantContext},
};

// GET /api/billing/status
#[utoipa::path(
    get,
    path = "/api/billing/status",
    tag = "Billing",
    responses(
        (status = 200, description = "Situação da assinatura e permissão de escrita", body = BillingStatus),
        (status = 401, description = "Não autorizado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_status(
    State(app_state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<BillingStatus>, AppError> {
    let status = app_state.tenant_service.billing_status(&ctx).await?;
    Ok(Json(status))
}
