// src/handlers/catalog.rs

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
        catalog::{
            Category, CreateCategoryPayload, CreateProductPayload, Product, ProductDetail,
            ProductSearch, Sku, SkuPayload, SkuSearch, UpdateProductPayload,
        },
        tenancy::TenantContext,
    },
};

// =============================================================================
//  PRODUTOS
// =============================================================================

// POST /api/products
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "Catalog",
    request_body = CreateProductPayload,
    responses(
        (status = 201, description = "Produto criado com seus SKUs", body = ProductDetail),
        (status = 400, description = "Dados inválidos ou código de SKU repetido")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_product(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateProductPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let product = app_state.catalog_service.create_product(&ctx, payload).await?;

    Ok((StatusCode::CREATED, Json(product)))
}

// GET /api/products?search=
#[utoipa::path(
    get,
    path = "/api/products",
    tag = "Catalog",
    params(ProductSearch),
    responses(
        (status = 200, description = "Produtos", body = Vec<Product>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_products(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<ProductSearch>,
) -> Result<Json<Vec<Product>>, AppError> {
    let products = app_state
        .catalog_service
        .list_products(&ctx, query.search.as_deref())
        .await?;
    Ok(Json(products))
}

// GET /api/products/{id}
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "Catalog",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto com SKUs e saldo agregado", body = ProductDetail),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_product(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ProductDetail>, AppError> {
    let product = app_state.catalog_service.get_product(&ctx, id).await?;
    Ok(Json(product))
}

// PUT /api/products/{id}
#[utoipa::path(
    put,
    path = "/api/products/{id}",
    tag = "Catalog",
    request_body = UpdateProductPayload,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 200, description = "Produto atualizado", body = ProductDetail),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_product(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductPayload>,
) -> Result<Json<ProductDetail>, AppError> {
    payload.validate()?;

    let product = app_state.catalog_service.update_product(&ctx, id, payload).await?;
    Ok(Json(product))
}

// DELETE /api/products/{id}
#[utoipa::path(
    delete,
    path = "/api/products/{id}",
    tag = "Catalog",
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 204, description = "Produto e SKUs removidos"),
        (status = 404, description = "Produto não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_product(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    app_state.catalog_service.delete_product(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  SKUs
// =============================================================================

// POST /api/products/{id}/skus
#[utoipa::path(
    post,
    path = "/api/products/{id}/skus",
    tag = "Catalog",
    request_body = SkuPayload,
    params(("id" = Uuid, Path, description = "ID do produto")),
    responses(
        (status = 201, description = "SKU criado", body = Sku),
        (status = 400, description = "Código de SKU já existe")
    ),
    security(("api_jwt" = []))
)]
pub async fn add_sku(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<SkuPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sku = app_state.catalog_service.add_sku(&ctx, product_id, payload).await?;

    Ok((StatusCode::CREATED, Json(sku)))
}

// PUT /api/skus/{id}
#[utoipa::path(
    put,
    path = "/api/skus/{id}",
    tag = "Catalog",
    request_body = SkuPayload,
    params(("id" = Uuid, Path, description = "ID do SKU")),
    responses(
        (status = 200, description = "SKU atualizado", body = Sku),
        (status = 404, description = "SKU não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_sku(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    Json(payload): Json<SkuPayload>,
) -> Result<Json<Sku>, AppError> {
    payload.validate()?;

    let sku = app_state.catalog_service.update_sku(&ctx, id, payload).await?;
    Ok(Json(sku))
}

// GET /api/skus?search=&inventoryId=
#[utoipa::path(
    get,
    path = "/api/skus",
    tag = "Catalog",
    params(SkuSearch),
    responses(
        (status = 200, description = "SKUs com nome de exibição e saldo", body = Vec<Sku>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_skus(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Query(query): Query<SkuSearch>,
) -> Result<Json<Vec<Sku>>, AppError> {
    let skus = app_state.catalog_service.list_skus(&ctx, &query).await?;
    Ok(Json(skus))
}

// =============================================================================
//  CATEGORIAS
// =============================================================================

// GET /api/categories
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "Catalog",
    responses(
        (status = 200, description = "Categorias", body = Vec<Category>)
    ),
    security(("api_jwt" = []))
)]
pub async fn list_categories(
    State(app_state): State<AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<Category>>, AppError> {
    let categories = app_state.catalog_service.list_categories(&ctx).await?;
    Ok(Json(categories))
}

// POST /api/categories
#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "Catalog",
    request_body = CreateCategoryPayload,
    responses(
        (status = 200, description = "Categoria criada ou já existente", body = Category),
        (status = 400, description = "Dados inválidos")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_category(
    State(app_state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateCategoryPayload>,
) -> Result<Json<Category>, AppError> {
    payload.validate()?;

    let category = app_state
        .catalog_service
        .create_category(&ctx, &payload.name)
        .await?;
    Ok(Json(category))
}
