// src/handlers/inventory.rs

use axum::{
    extract::{Path, Query, State},
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
        inventory::{
            Inventory, InventoryItemView, InventoryTransaction, StockMovement, TransactionSearch,
        },
        tenancy::TenantContext,
    },
};

// GET /api/inventories
#[utoipa::path(
    get,
    path = "/api/inventories",
    tag = "Inventory",
    responses(
        (status = 200, description = "Estoques visíveis ao usuário", body = Vec<Inventory>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_inventories(
    State(app_state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<Inventory>>, AppError> {
    let inventories = app_state.inventory_service.list_inventories(&ctx).await?;
    Ok(Json(inventories))
}

// GET /api/inventories/{id}/items
#[utoipa::path(
    get,
    path = "/api/inventories/{id}/items",
    tag = "Inventory",
    params(("id" = Uuid, Path, description = "ID do estoque")),
    responses(
        (status = 200, description = "Saldos por SKU", body = Vec<InventoryItemView>),
        (status = 403, description = "Revendedor consultando estoque alheio"),
        (status = 404, description = "Estoque não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_items(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<InventoryItemView>>, AppError> {
    let items = app_state.inventory_service.list_items(&ctx, id).await?;
    Ok(Json(items))
}

// POST /api/inventories/transactions
#[utoipa::path(
    post,
    path = "/api/inventories/transactions",
    tag = "Inventory",
    request_body = StockMovement,
    responses(
        (status = 201, description = "Movimentação registrada (uma linha por SKU)", body = Vec<InventoryTransaction>),
        (status = 400, description = "Movimentação inválida ou saldo insuficiente"),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_transaction(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<StockMovement>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let rows = app_state.inventory_service.transact(&ctx, payload).await?;

    Ok((StatusCode::CREATED, Json(rows)))
}

// GET /api/inventories/transactions?inventoryId=&skuId=&saleId=
#[utoipa::path(
    get,
    path = "/api/inventories/transactions",
    tag = "Inventory",
    params(TransactionSearch),
    responses(
        (status = 200, description = "Livro-razão, mais recentes primeiro", body = Vec<InventoryTransaction>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_transactions(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<TransactionSearch>,
) -> Result<Json<Vec<InventoryTransaction>>, AppError> {
    let rows = app_state
        .inventory_service
        .list_transactions(&ctx, query)
        .await?;
    Ok(Json(rows))
}
