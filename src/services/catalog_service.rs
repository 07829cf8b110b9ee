// src/services/catalog_service.rs

use std::collections::HashSet;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{db_utils::not_found_as, error::AppError},
    db::CatalogRepository,
    models::{
        catalog::{
            Category, CreateProductPayload, ProductDetail, Sku, SkuPayload, SkuSearch,
            UpdateProductPayload,
        },
        tenancy::TenantContext,
    },
    services::access,
};

/// Primeiro código de SKU repetido dentro do próprio pedido.
pub fn first_repeated_code(skus: &[SkuPayload]) -> Option<String> {
    let mut seen = HashSet::new();
    skus.iter()
        .map(|s| s.code.trim())
        .find(|code| !seen.insert(*code))
        .map(str::to_string)
}

fn normalized(sku: &SkuPayload) -> SkuPayload {
    SkuPayload {
        code: sku.code.trim().to_string(),
        color: sku.color.trim().to_string(),
        size: sku.size.trim().to_string(),
        ..sku.clone()
    }
}

#[derive(Clone)]
pub struct CatalogService {
    pool: PgPool,
    repo: CatalogRepository,
}

impl CatalogService {
    pub fn new(pool: PgPool, repo: CatalogRepository) -> Self {
        Self { pool, repo }
    }

    // Categoria por id, ou criada pelo nome quando não vier id.
    async fn resolve_category(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        category_id: Option<Uuid>,
        category_name: Option<&str>,
    ) -> Result<Option<Category>, AppError> {
        if let Some(id) = category_id {
            let category = not_found_as(
                self.repo.find_category(&mut *conn, tenant_id, id).await,
                "Categoria",
            )?;
            return Ok(Some(category));
        }

        match category_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => Ok(Some(
                self.repo.get_or_create_category(conn, tenant_id, name).await?,
            )),
            None => Ok(None),
        }
    }

    // =========================================================================
    //  PRODUTOS
    // =========================================================================

    pub async fn create_product(
        &self,
        ctx: &TenantContext,
        payload: CreateProductPayload,
    ) -> Result<ProductDetail, AppError> {
        access::require_admin(ctx)?;
        if let Some(code) = first_repeated_code(&payload.skus) {
            return Err(AppError::DuplicateCode(code));
        }

        let mut tx = self.pool.begin().await?;

        let category = self
            .resolve_category(
                &mut tx,
                ctx.tenant_id,
                payload.category_id,
                payload.category_name.as_deref(),
            )
            .await?;

        let product = self
            .repo
            .create_product(
                &mut *tx,
                ctx.tenant_id,
                category.as_ref().map(|c| c.id),
                payload.name.trim(),
                payload.description.trim(),
            )
            .await?;

        for sku in &payload.skus {
            self.repo
                .create_sku(&mut *tx, ctx.tenant_id, product.id, &normalized(sku))
                .await?;
        }

        let skus = self
            .repo
            .skus_by_product(&mut *tx, ctx.tenant_id, product.id)
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            product_id = %product.id,
            skus = skus.len(),
            "🏷️ Produto criado"
        );

        Ok(ProductDetail {
            product,
            category_name: category.map(|c| c.name),
            skus,
        })
    }

    pub async fn update_product(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        payload: UpdateProductPayload,
    ) -> Result<ProductDetail, AppError> {
        access::require_admin(ctx)?;

        let mut tx = self.pool.begin().await?;

        let category = self
            .resolve_category(
                &mut tx,
                ctx.tenant_id,
                payload.category_id,
                payload.category_name.as_deref(),
            )
            .await?;

        not_found_as(
            self.repo
                .update_product(
                    &mut *tx,
                    ctx.tenant_id,
                    id,
                    category.as_ref().map(|c| c.id),
                    payload.name.trim(),
                    payload.description.trim(),
                )
                .await,
            "Produto",
        )?;

        tx.commit().await?;

        self.get_product(ctx, id).await
    }

    pub async fn delete_product(&self, ctx: &TenantContext, id: Uuid) -> Result<(), AppError> {
        access::require_admin(ctx)?;

        let mut tx = self.pool.begin().await?;
        if !self.repo.soft_delete_product(&mut tx, ctx.tenant_id, id).await? {
            return Err(AppError::NotFound("Produto".into()));
        }
        tx.commit().await?;

        tracing::info!(tenant_id = %ctx.tenant_id, product_id = %id, "Produto removido");
        Ok(())
    }

    pub async fn get_product(&self, ctx: &TenantContext, id: Uuid) -> Result<ProductDetail, AppError> {
        let product = not_found_as(
            self.repo.find_product(&self.pool, ctx.tenant_id, id).await,
            "Produto",
        )?;

        let category_name = match product.category_id {
            Some(category_id) => self
                .repo
                .find_category(&self.pool, ctx.tenant_id, category_id)
                .await?
                .map(|c| c.name),
            None => None,
        };
        let skus = self
            .repo
            .skus_by_product(&self.pool, ctx.tenant_id, product.id)
            .await?;

        Ok(ProductDetail {
            product,
            category_name,
            skus,
        })
    }

    pub async fn list_products(
        &self,
        ctx: &TenantContext,
        search: Option<&str>,
    ) -> Result<Vec<crate::models::catalog::Product>, AppError> {
        self.repo.list_products(ctx.tenant_id, search).await
    }

    // =========================================================================
    //  SKUs
    // =========================================================================

    pub async fn add_sku(
        &self,
        ctx: &TenantContext,
        product_id: Uuid,
        payload: SkuPayload,
    ) -> Result<Sku, AppError> {
        access::require_admin(ctx)?;

        let mut tx = self.pool.begin().await?;
        not_found_as(
            self.repo.find_product(&mut *tx, ctx.tenant_id, product_id).await,
            "Produto",
        )?;
        let id = self
            .repo
            .create_sku(&mut *tx, ctx.tenant_id, product_id, &normalized(&payload))
            .await?;
        let sku = self.fetch_sku(&mut tx, ctx.tenant_id, id).await?;
        tx.commit().await?;

        tracing::info!(tenant_id = %ctx.tenant_id, sku_id = %sku.id, code = %sku.code, "SKU criado");
        Ok(sku)
    }

    pub async fn update_sku(
        &self,
        ctx: &TenantContext,
        id: Uuid,
        payload: SkuPayload,
    ) -> Result<Sku, AppError> {
        access::require_admin(ctx)?;

        let mut tx = self.pool.begin().await?;
        if !self
            .repo
            .update_sku(&mut *tx, ctx.tenant_id, id, &normalized(&payload))
            .await?
        {
            return Err(AppError::NotFound("SKU".into()));
        }
        let sku = self.fetch_sku(&mut tx, ctx.tenant_id, id).await?;
        tx.commit().await?;

        Ok(sku)
    }

    async fn fetch_sku(&self, conn: &mut PgConnection, tenant_id: Uuid, id: Uuid) -> Result<Sku, AppError> {
        self.repo
            .find_skus_by_ids(conn, tenant_id, &[id], None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("SKU".into()))
    }

    pub async fn list_skus(&self, ctx: &TenantContext, search: &SkuSearch) -> Result<Vec<Sku>, AppError> {
        self.repo
            .list_skus(ctx.tenant_id, search.search.as_deref(), search.inventory_id)
            .await
    }

    // =========================================================================
    //  CATEGORIAS
    // =========================================================================

    pub async fn list_categories(&self, ctx: &TenantContext) -> Result<Vec<Category>, AppError> {
        self.repo.list_categories(ctx.tenant_id).await
    }

    pub async fn create_category(&self, ctx: &TenantContext, name: &str) -> Result<Category, AppError> {
        access::require_admin(ctx)?;

        let mut conn = self.pool.acquire().await?;
        self.repo
            .get_or_create_category(&mut conn, ctx.tenant_id, name.trim())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::money::dec;

    fn sku(code: &str) -> SkuPayload {
        SkuPayload {
            code: code.into(),
            color: " Azul ".into(),
            size: "M".into(),
            cost: None,
            price: dec("10.00"),
        }
    }

    #[test]
    fn test_repeated_code_in_request() {
        assert_eq!(first_repeated_code(&[sku("A"), sku("B")]), None);
        assert_eq!(
            first_repeated_code(&[sku("A"), sku("B"), sku(" A ")]),
            Some("A".to_string())
        );
    }

    #[test]
    fn test_normalized_trims_text_fields() {
        let n = normalized(&sku(" CAM-01 "));
        assert_eq!(n.code, "CAM-01");
        assert_eq!(n.color, "Azul");
        assert_eq!(n.price, dec("10.00"));
    }
}
