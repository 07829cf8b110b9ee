// src/db/catalog_repo.rs

use sqlx::{Executor, PgConnection, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{like_pattern, map_unique_violation},
        error::AppError,
    },
    models::catalog::{Category, Product, Sku, SkuPayload},
};

const PRODUCT_COLUMNS: &str =
    "id, tenant_id, category_id, name, description, created_at, updated_at";

// $1 = tenant, $2 = estoque opcional para o saldo
const SKU_SELECT: &str = r#"
    SELECT s.id, s.product_id, p.name AS product_name, s.code, s.color, s.size, s.cost, s.price,
           COALESCE((
               SELECT SUM(ii.quantity) FROM inventory_items ii
               WHERE ii.tenant_id = s.tenant_id AND ii.sku_id = s.id
                 AND ($2::uuid IS NULL OR ii.inventory_id = $2)
           ), 0)::INTEGER AS quantity
    FROM skus s
    JOIN products p ON p.id = s.product_id
    WHERE s.tenant_id = $1 AND s.deleted_at IS NULL
"#;

#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CATEGORIAS
    // =========================================================================

    /// Insere ou reaproveita a categoria com este nome.
    /// ON CONFLICT não aborta a transação, então duas criações simultâneas convergem.
    pub async fn get_or_create_category(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Category, AppError> {
        let inserted = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (tenant_id, name)
            VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT categories_tenant_name_key DO NOTHING
            RETURNING id, tenant_id, name, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(category) = inserted {
            return Ok(category);
        }

        let existing = sqlx::query_as::<_, Category>(
            "SELECT id, tenant_id, name, created_at FROM categories WHERE tenant_id = $1 AND name = $2",
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

        Ok(existing)
    }

    pub async fn find_category<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Category>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, tenant_id, name, created_at FROM categories
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(category)
    }

    pub async fn list_categories(&self, tenant_id: Uuid) -> Result<Vec<Category>, AppError> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT id, tenant_id, name, created_at FROM categories
             WHERE tenant_id = $1 AND deleted_at IS NULL
             ORDER BY name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    // =========================================================================
    //  PRODUTOS
    // =========================================================================

    pub async fn create_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        category_id: Option<Uuid>,
        name: &str,
        description: &str,
    ) -> Result<Product, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (tenant_id, category_id, name, description)
             VALUES ($1, $2, $3, $4)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(category_id)
        .bind(name)
        .bind(description)
        .fetch_one(executor)
        .await?;

        Ok(product)
    }

    pub async fn update_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        category_id: Option<Uuid>,
        name: &str,
        description: &str,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET category_id = $3, name = $4, description = $5, updated_at = NOW()
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(id)
        .bind(category_id)
        .bind(name)
        .bind(description)
        .fetch_optional(executor)
        .await?;

        Ok(product)
    }

    pub async fn find_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Product>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(product)
    }

    pub async fn list_products(
        &self,
        tenant_id: Uuid,
        search: Option<&str>,
    ) -> Result<Vec<Product>, AppError> {
        let pattern = like_pattern(search);
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products
             WHERE tenant_id = $1 AND deleted_at IS NULL
               AND ($2::text IS NULL OR name ILIKE $2)
             ORDER BY name"
        ))
        .bind(tenant_id)
        .bind(pattern)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Exclusão lógica do produto e de todos os seus SKUs.
    pub async fn soft_delete_product(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW()
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "UPDATE skus SET deleted_at = NOW()
             WHERE tenant_id = $1 AND product_id = $2 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(true)
    }

    // =========================================================================
    //  SKUs
    // =========================================================================

    pub async fn create_sku<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
        sku: &SkuPayload,
    ) -> Result<Uuid, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO skus (tenant_id, product_id, code, color, size, cost, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(tenant_id)
        .bind(product_id)
        .bind(sku.code.trim())
        .bind(sku.color.trim())
        .bind(sku.size.trim())
        .bind(sku.cost)
        .bind(sku.price)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::DuplicateCode(sku.code.clone())))
    }

    pub async fn update_sku<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
        sku: &SkuPayload,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE skus SET code = $3, color = $4, size = $5, cost = $6, price = $7,
                            updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(id)
        .bind(sku.code.trim())
        .bind(sku.color.trim())
        .bind(sku.size.trim())
        .bind(sku.cost)
        .bind(sku.price)
        .execute(executor)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::DuplicateCode(sku.code.clone())))?;

        Ok(result.rows_affected() > 0)
    }

    /// Busca vários SKUs numa única consulta. Ids ausentes simplesmente não voltam.
    pub async fn find_skus_by_ids<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        ids: &[Uuid],
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<Sku>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let skus = sqlx::query_as::<_, Sku>(&format!("{SKU_SELECT} AND s.id = ANY($3)"))
            .bind(tenant_id)
            .bind(inventory_id)
            .bind(ids)
            .fetch_all(executor)
            .await?;

        Ok(skus.into_iter().map(Sku::with_display_name).collect())
    }

    pub async fn skus_by_product<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        product_id: Uuid,
    ) -> Result<Vec<Sku>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let skus = sqlx::query_as::<_, Sku>(&format!(
            "{SKU_SELECT} AND s.product_id = $3 ORDER BY s.code"
        ))
        .bind(tenant_id)
        .bind(None::<Uuid>)
        .bind(product_id)
        .fetch_all(executor)
        .await?;

        Ok(skus.into_iter().map(Sku::with_display_name).collect())
    }

    pub async fn list_skus(
        &self,
        tenant_id: Uuid,
        search: Option<&str>,
        inventory_id: Option<Uuid>,
    ) -> Result<Vec<Sku>, AppError> {
        let skus = sqlx::query_as::<_, Sku>(&format!(
            "{SKU_SELECT} AND ($3::text IS NULL OR s.code ILIKE $3 OR p.name ILIKE $3)
             ORDER BY p.name, s.code"
        ))
        .bind(tenant_id)
        .bind(inventory_id)
        .bind(like_pattern(search))
        .fetch_all(&self.pool)
        .await?;

        Ok(skus.into_iter().map(Sku::with_display_name).collect())
    }
}
