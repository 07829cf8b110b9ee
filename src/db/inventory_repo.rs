// src/db/inventory_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{is_check_violation, map_unique_violation},
        error::AppError,
    },
    models::inventory::{
        Inventory, InventoryItem, InventoryItemView, InventoryTransaction,
        InventoryTransactionType, InventoryType, TransactionSearch,
    },
};

const INVENTORY_SELECT: &str = r#"
    SELECT i.id, i.tenant_id, i.type, i.user_id, u.name AS owner_name, i.created_at
    FROM inventories i
    LEFT JOIN users u ON u.id = i.user_id
    WHERE i.tenant_id = $1 AND i.deleted_at IS NULL
"#;

const BIN_COLUMNS: &str = "id, inventory_id, sku_id, quantity, updated_at";

const LEDGER_COLUMNS: &str = "id, type, date, quantity, sku_id, inventory_in_id, inventory_out_id, \
                              sale_id, justification";

/// Dados de uma gravação em lote no livro-razão (uma linha por SKU).
#[derive(Debug)]
pub struct LedgerEntry<'a> {
    pub kind: InventoryTransactionType,
    pub date: DateTime<Utc>,
    pub inventory_in_id: Option<Uuid>,
    pub inventory_out_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub justification: &'a str,
    pub sku_ids: Vec<Uuid>,
    pub quantities: Vec<i32>,
}

#[derive(Clone)]
pub struct InventoryRepository {
    pool: PgPool,
}

impl InventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  ESTOQUES
    // =========================================================================

    pub async fn create_inventory<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        kind: InventoryType,
        user_id: Option<Uuid>,
    ) -> Result<Inventory, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Inventory>(
            r#"
            WITH inserted AS (
                INSERT INTO inventories (tenant_id, type, user_id)
                VALUES ($1, $2, $3)
                RETURNING id, tenant_id, type, user_id, created_at
            )
            SELECT i.id, i.tenant_id, i.type, i.user_id, u.name AS owner_name, i.created_at
            FROM inserted i
            LEFT JOIN users u ON u.id = i.user_id
            "#,
        )
        .bind(tenant_id)
        .bind(kind)
        .bind(user_id)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                AppError::Duplicate("Já existe um estoque deste tipo para o dono informado.".into())
            })
        })
    }

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Inventory>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inventory = sqlx::query_as::<_, Inventory>(&format!("{INVENTORY_SELECT} AND i.id = $2"))
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(inventory)
    }

    pub async fn find_primary<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
    ) -> Result<Option<Inventory>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inventory =
            sqlx::query_as::<_, Inventory>(&format!("{INVENTORY_SELECT} AND i.type = 'PRIMARY'"))
                .bind(tenant_id)
                .fetch_optional(executor)
                .await?;

        Ok(inventory)
    }

    /// Estoque de revendedor do usuário, se houver.
    pub async fn find_by_user<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Inventory>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let inventory = sqlx::query_as::<_, Inventory>(&format!(
            "{INVENTORY_SELECT} AND i.type = 'RESELLER' AND i.user_id = $2"
        ))
        .bind(tenant_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(inventory)
    }

    pub async fn list(&self, tenant_id: Uuid) -> Result<Vec<Inventory>, AppError> {
        let inventories = sqlx::query_as::<_, Inventory>(&format!(
            "{INVENTORY_SELECT} ORDER BY i.type, u.name NULLS FIRST"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(inventories)
    }

    pub async fn list_items(
        &self,
        tenant_id: Uuid,
        inventory_id: Uuid,
    ) -> Result<Vec<InventoryItemView>, AppError> {
        let items = sqlx::query_as::<_, InventoryItemView>(
            r#"
            SELECT ii.id, ii.inventory_id, ii.sku_id, s.code AS sku_code,
                   p.name AS product_name, s.color, s.size, ii.quantity
            FROM inventory_items ii
            JOIN skus s ON s.id = ii.sku_id
            JOIN products p ON p.id = s.product_id
            WHERE ii.tenant_id = $1 AND ii.inventory_id = $2 AND s.deleted_at IS NULL
            ORDER BY p.name, s.code
            "#,
        )
        .bind(tenant_id)
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items
            .into_iter()
            .map(|mut item| {
                item.display_name = crate::models::catalog::display_name(
                    &item.product_name,
                    &item.color,
                    &item.size,
                );
                item
            })
            .collect())
    }

    // =========================================================================
    //  LINHAS DE ESTOQUE (dentro da transação do chamador)
    // =========================================================================

    /// Lê e trava as linhas (estoque, sku). Ordem por id para travar sempre na mesma sequência.
    pub async fn lock_bins<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        inventory_id: Uuid,
        sku_ids: &[Uuid],
    ) -> Result<Vec<InventoryItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bins = sqlx::query_as::<_, InventoryItem>(&format!(
            "SELECT {BIN_COLUMNS} FROM inventory_items
             WHERE tenant_id = $1 AND inventory_id = $2 AND sku_id = ANY($3)
             ORDER BY id
             FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(inventory_id)
        .bind(sku_ids)
        .fetch_all(executor)
        .await?;

        Ok(bins)
    }

    /// Cria com quantidade zero as linhas que ainda não existem no destino.
    /// Insere em ordem de `sku_id`: duas movimentações simultâneas para o mesmo
    /// estoque esperam uma pela outra na mesma sequência.
    pub async fn ensure_bins<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        inventory_id: Uuid,
        sku_ids: &[Uuid],
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            INSERT INTO inventory_items (tenant_id, inventory_id, sku_id, quantity)
            SELECT $1, $2, t.sku_id, 0
            FROM unnest($3::uuid[]) AS t(sku_id)
            ORDER BY t.sku_id
            ON CONFLICT ON CONSTRAINT inventory_items_bin_key DO NOTHING
            "#,
        )
        .bind(tenant_id)
        .bind(inventory_id)
        .bind(sku_ids)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Soma `deltas[i]` à linha de `sku_ids[i]`. Um saldo negativo viola o CHECK
    /// `inventory_items_quantity_check` e vira o erro produzido por `on_underflow`.
    pub async fn apply_deltas<'e, E, F>(
        &self,
        executor: E,
        tenant_id: Uuid,
        inventory_id: Uuid,
        sku_ids: &[Uuid],
        deltas: &[i32],
        on_underflow: F,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
        F: FnOnce() -> AppError,
    {
        let result = sqlx::query(
            r#"
            UPDATE inventory_items ii
            SET quantity = ii.quantity + d.delta, updated_at = NOW()
            FROM unnest($3::uuid[], $4::int4[]) AS d(sku_id, delta)
            WHERE ii.tenant_id = $1 AND ii.inventory_id = $2 AND ii.sku_id = d.sku_id
            "#,
        )
        .bind(tenant_id)
        .bind(inventory_id)
        .bind(sku_ids)
        .bind(deltas)
        .execute(executor)
        .await
        .map_err(|e| {
            if is_check_violation(&e, "inventory_items_quantity_check") {
                on_underflow()
            } else {
                e.into()
            }
        })?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    //  LIVRO-RAZÃO
    // =========================================================================

    pub async fn insert_ledger<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        entry: &LedgerEntry<'_>,
    ) -> Result<Vec<InventoryTransaction>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, InventoryTransaction>(&format!(
            "INSERT INTO inventory_transactions (
                 tenant_id, type, date, quantity, sku_id,
                 inventory_in_id, inventory_out_id, sale_id, justification
             )
             SELECT $1, $2, $3, t.quantity, t.sku_id, $4, $5, $6, $7
             FROM unnest($8::uuid[], $9::int4[]) AS t(sku_id, quantity)
             RETURNING {LEDGER_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(entry.kind)
        .bind(entry.date)
        .bind(entry.inventory_in_id)
        .bind(entry.inventory_out_id)
        .bind(entry.sale_id)
        .bind(entry.justification)
        .bind(&entry.sku_ids)
        .bind(&entry.quantities)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Movimentações mais recentes primeiro.
    pub async fn list_transactions(
        &self,
        tenant_id: Uuid,
        search: &TransactionSearch,
    ) -> Result<Vec<InventoryTransaction>, AppError> {
        let rows = sqlx::query_as::<_, InventoryTransaction>(&format!(
            "SELECT {LEDGER_COLUMNS} FROM inventory_transactions
             WHERE tenant_id = $1
               AND ($2::uuid IS NULL OR inventory_in_id = $2 OR inventory_out_id = $2)
               AND ($3::uuid IS NULL OR sku_id = $3)
               AND ($4::uuid IS NULL OR sale_id = $4)
             ORDER BY date DESC, created_at DESC
             LIMIT 1000"
        ))
        .bind(tenant_id)
        .bind(search.inventory_id)
        .bind(search.sku_id)
        .bind(search.sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
