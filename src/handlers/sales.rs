// src/handlers/sales.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    models::{
        sales::{
            InstallmentStatusChange, NewReturn, NewSale, PaymentDate, SaleDetail, SaleSummary,
            SaleVersionDetail, SalesReturnDetail,
        },
        tenancy::TenantContext,
    },
};

// POST /api/sales
#[utoipa::path(
    post,
    path = "/api/sales",
    tag = "Sales",
    request_body = NewSale,
    responses(
        (status = 201, description = "Venda registrada e estoque baixado", body = SaleDetail),
        (status = 400, description = "Pagamento não fecha, saldo insuficiente ou dados inválidos"),
        (status = 403, description = "Assinatura sem permissão de escrita")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_sale(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<NewSale>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sale = app_state.sales_service.do_sale(&ctx, payload).await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

// GET /api/sales
#[utoipa::path(
    get,
    path = "/api/sales",
    tag = "Sales",
    responses(
        (status = 200, description = "Vendas com o total da versão corrente", body = Vec<SaleSummary>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_sales(
    State(app_state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<SaleSummary>>, AppError> {
    let sales = app_state.sales_service.get_sales(&ctx).await?;
    Ok(Json(sales))
}

// GET /api/sales/{id}
#[utoipa::path(
    get,
    path = "/api/sales/{id}",
    tag = "Sales",
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Venda na versão corrente com devoluções", body = SaleDetail),
        (status = 403, description = "Venda de outro vendedor"),
        (status = 404, description = "Venda não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_sale(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<SaleDetail>, AppError> {
    let sale = app_state.sales_service.get_sale_by_id(&ctx, id).await?;
    Ok(Json(sale))
}

// GET /api/sales/{id}/versions/{version}
#[utoipa::path(
    get,
    path = "/api/sales/{id}/versions/{version}",
    tag = "Sales",
    params(
        ("id" = Uuid, Path, description = "ID da venda"),
        ("version" = i32, Path, description = "Número da versão")
    ),
    responses(
        (status = 200, description = "Itens e pagamentos da versão", body = SaleVersionDetail),
        (status = 404, description = "Versão não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_version(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path((id, version)): Path<(Uuid, i32)>,
) -> Result<Json<SaleVersionDetail>, AppError> {
    let detail = app_state.sales_service.get_version(&ctx, id, version).await?;
    Ok(Json(detail))
}

// POST /api/sales/{id}/returns
#[utoipa::path(
    post,
    path = "/api/sales/{id}/returns",
    tag = "Sales",
    request_body = NewReturn,
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 201, description = "Devolução registrada numa nova versão", body = SaleDetail),
        (status = 400, description = "Quantidade devolvida maior que a devida")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_return(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewReturn>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sale = app_state.sales_service.do_return(&ctx, id, payload).await?;

    Ok((StatusCode::CREATED, Json(sale)))
}

// GET /api/sales/{id}/returns
#[utoipa::path(
    get,
    path = "/api/sales/{id}/returns",
    tag = "Sales",
    params(("id" = Uuid, Path, description = "ID da venda")),
    responses(
        (status = 200, description = "Devoluções com seus itens", body = Vec<SalesReturnDetail>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_returns(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<SalesReturnDetail>>, AppError> {
    let returns = app_state.sales_service.get_returns(&ctx, id).await?;
    Ok(Json(returns))
}

// PATCH /api/sales/{id}/installments/{installment_id}
#[utoipa::path(
    patch,
    path = "/api/sales/{id}/installments/{installment_id}",
    tag = "Sales",
    request_body = InstallmentStatusChange,
    params(
        ("id" = Uuid, Path, description = "ID da venda"),
        ("installment_id" = Uuid, Path, description = "ID da parcela")
    ),
    responses(
        (status = 200, description = "Parcela atualizada", body = PaymentDate),
        (status = 400, description = "PAID sem data de pagamento"),
        (status = 404, description = "Parcela não pertence à venda")
    ),
    security(("api_jwt" = []))
)]
pub async fn change_installment_status(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path((id, installment_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<InstallmentStatusChange>,
) -> Result<Json<PaymentDate>, AppError> {
    let installment = app_state
        .sales_service
        .change_installment_status(&ctx, id, installment_id, payload)
        .await?;
    Ok(Json(installment))
}
