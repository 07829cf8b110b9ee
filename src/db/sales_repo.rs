// src/db/sales_repo.rs

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::map_unique_violation, error::AppError},
    models::sales::{
        Payment, PaymentDate, PaymentStatus, PaymentType, PaymentWithInstallments, Sale,
        SaleItem, SaleSummary, SaleVersion, SalesReturn, SalesReturnDetail, SalesReturnItem,
        ScheduledInstallment,
    },
};

const SALE_COLUMNS: &str = "id, tenant_id, code, date, user_id, customer_id, last_version, created_at";
const VERSION_COLUMNS: &str = "id, sale_id, version, created_at";
const INSTALLMENT_COLUMNS: &str =
    "id, payment_id, installment_number, due_date, paid_date, installment_value, status";
const RETURN_COLUMNS: &str = "id, sale_id, from_version_id, to_version_id, returner_name, reason, \
                              created_by_user_id, created_at";

#[derive(sqlx::FromRow)]
struct InstallmentOfSale {
    #[sqlx(flatten)]
    installment: PaymentDate,
    version: i32,
}

#[derive(Clone)]
pub struct SalesRepository {
    pool: PgPool,
}

impl SalesRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CABEÇALHO E VERSÕES
    // =========================================================================

    pub async fn insert_sale<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        code: &str,
        date: DateTime<Utc>,
        user_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Sale, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Sale>(&format!(
            "INSERT INTO sales (tenant_id, code, date, user_id, customer_id, last_version)
             VALUES ($1, $2, $3, $4, $5, 1)
             RETURNING {SALE_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(code)
        .bind(date)
        .bind(user_id)
        .bind(customer_id)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            map_unique_violation(e, || {
                AppError::Duplicate(format!("Código de venda {} já utilizado.", code))
            })
        })
    }

    pub async fn find_sale<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(sale)
    }

    /// Trava o cabeçalho antes de ler `last_version`: devoluções concorrentes
    /// da mesma venda ficam em fila.
    pub async fn lock_sale<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Sale>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            "SELECT {SALE_COLUMNS} FROM sales
             WHERE tenant_id = $1 AND id = $2 AND deleted_at IS NULL
             FOR UPDATE"
        ))
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(sale)
    }

    pub async fn bump_last_version<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_id: Uuid,
        version: i32,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE sales SET last_version = $3 WHERE tenant_id = $1 AND id = $2")
            .bind(tenant_id)
            .bind(sale_id)
            .bind(version)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn insert_version<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_id: Uuid,
        version: i32,
        created_at: DateTime<Utc>,
    ) -> Result<SaleVersion, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let version = sqlx::query_as::<_, SaleVersion>(&format!(
            "INSERT INTO sale_versions (tenant_id, sale_id, version, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {VERSION_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(version)
        .bind(created_at)
        .fetch_one(executor)
        .await?;

        Ok(version)
    }

    pub async fn find_version<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_id: Uuid,
        version: i32,
    ) -> Result<Option<SaleVersion>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let version = sqlx::query_as::<_, SaleVersion>(&format!(
            "SELECT {VERSION_COLUMNS} FROM sale_versions
             WHERE tenant_id = $1 AND sale_id = $2 AND version = $3"
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(version)
        .fetch_optional(executor)
        .await?;

        Ok(version)
    }

    // =========================================================================
    //  ITENS
    // =========================================================================

    pub async fn insert_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_version_id: Uuid,
        sku_ids: &[Uuid],
        quantities: &[i32],
        unit_prices: &[Decimal],
    ) -> Result<Vec<SaleItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            WITH inserted AS (
                INSERT INTO sale_items (tenant_id, sale_version_id, sku_id, quantity, unit_price)
                SELECT $1, $2, t.sku_id, t.quantity, t.unit_price
                FROM unnest($3::uuid[], $4::int4[], $5::numeric[]) AS t(sku_id, quantity, unit_price)
                RETURNING id, sale_version_id, sku_id, quantity, unit_price
            )
            SELECT i.id, i.sale_version_id, i.sku_id, s.code AS sku_code, i.quantity, i.unit_price
            FROM inserted i
            JOIN skus s ON s.id = i.sku_id
            ORDER BY s.code
            "#,
        )
        .bind(tenant_id)
        .bind(sale_version_id)
        .bind(sku_ids)
        .bind(quantities)
        .bind(unit_prices)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn items_by_version<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_version_id: Uuid,
    ) -> Result<Vec<SaleItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT i.id, i.sale_version_id, i.sku_id, s.code AS sku_code, i.quantity, i.unit_price
            FROM sale_items i
            JOIN skus s ON s.id = i.sku_id
            WHERE i.tenant_id = $1 AND i.sale_version_id = $2
            ORDER BY s.code
            "#,
        )
        .bind(tenant_id)
        .bind(sale_version_id)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    // =========================================================================
    //  PAGAMENTOS E PARCELAS
    // =========================================================================

    pub async fn insert_payment<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_version_id: Uuid,
        payment_type: PaymentType,
    ) -> Result<Payment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Payment>(
            "INSERT INTO payments (tenant_id, sale_version_id, payment_type)
             VALUES ($1, $2, $3)
             RETURNING id, sale_version_id, payment_type",
        )
        .bind(tenant_id)
        .bind(sale_version_id)
        .bind(payment_type)
        .fetch_one(executor)
        .await
        .map_err(|e| map_unique_violation(e, || AppError::DuplicatePaymentType(payment_type)))
    }

    /// Grava as parcelas de um pagamento num único INSERT.
    pub async fn insert_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        payment_id: Uuid,
        installments: &[ScheduledInstallment],
    ) -> Result<Vec<PaymentDate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let numbers: Vec<i32> = installments.iter().map(|i| i.installment_number).collect();
        let due_dates: Vec<NaiveDate> = installments.iter().map(|i| i.due_date).collect();
        let paid_dates: Vec<Option<NaiveDate>> = installments.iter().map(|i| i.paid_date).collect();
        let values: Vec<Decimal> = installments.iter().map(|i| i.installment_value).collect();
        let statuses: Vec<&str> = installments.iter().map(|i| i.status.as_str()).collect();

        let rows = sqlx::query_as::<_, PaymentDate>(&format!(
            "INSERT INTO payment_dates (
                 tenant_id, payment_id, installment_number, due_date, paid_date,
                 installment_value, status
             )
             SELECT $1, $2, t.number, t.due_date, t.paid_date, t.value, t.status::payment_status
             FROM unnest($3::int4[], $4::date[], $5::date[], $6::numeric[], $7::text[])
                  AS t(number, due_date, paid_date, value, status)
             RETURNING {INSTALLMENT_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(payment_id)
        .bind(&numbers)
        .bind(&due_dates)
        .bind(&paid_dates)
        .bind(&values)
        .bind(&statuses)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    /// Parcelas de uma versão com a forma de pagamento, para o recálculo.
    pub async fn installments_by_version<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_version_id: Uuid,
    ) -> Result<Vec<ScheduledInstallment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, ScheduledInstallment>(
            r#"
            SELECT p.payment_type, d.installment_number, d.due_date, d.paid_date,
                   d.installment_value, d.status
            FROM payment_dates d
            JOIN payments p ON p.id = d.payment_id
            WHERE p.tenant_id = $1 AND p.sale_version_id = $2
            ORDER BY p.payment_type, d.due_date, d.installment_number
            "#,
        )
        .bind(tenant_id)
        .bind(sale_version_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn payments_by_version(
        &self,
        tenant_id: Uuid,
        sale_version_id: Uuid,
    ) -> Result<Vec<PaymentWithInstallments>, AppError> {
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT id, sale_version_id, payment_type FROM payments
             WHERE tenant_id = $1 AND sale_version_id = $2
             ORDER BY payment_type",
        )
        .bind(tenant_id)
        .bind(sale_version_id)
        .fetch_all(&self.pool)
        .await?;

        let payment_ids: Vec<Uuid> = payments.iter().map(|p| p.id).collect();
        let installments = sqlx::query_as::<_, PaymentDate>(&format!(
            "SELECT {INSTALLMENT_COLUMNS} FROM payment_dates
             WHERE tenant_id = $1 AND payment_id = ANY($2)
             ORDER BY due_date, installment_number"
        ))
        .bind(tenant_id)
        .bind(&payment_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_payment: HashMap<Uuid, Vec<PaymentDate>> = HashMap::new();
        for installment in installments {
            by_payment
                .entry(installment.payment_id)
                .or_default()
                .push(installment);
        }

        Ok(payments
            .into_iter()
            .map(|payment| PaymentWithInstallments {
                installments: by_payment.remove(&payment.id).unwrap_or_default(),
                payment,
            })
            .collect())
    }

    /// Parcelas PENDING/DELAYED da versão anterior viram CANCEL.
    pub async fn cancel_open_installments<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_version_id: Uuid,
    ) -> Result<u64, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE payment_dates d SET status = 'CANCEL'
            FROM payments p
            WHERE p.id = d.payment_id
              AND p.tenant_id = $1 AND p.sale_version_id = $2
              AND d.status IN ('PENDING', 'DELAYED')
            "#,
        )
        .bind(tenant_id)
        .bind(sale_version_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Parcela de qualquer versão da venda, junto com o número dessa versão.
    pub async fn find_installment_of_sale<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_id: Uuid,
        installment_id: Uuid,
    ) -> Result<Option<(PaymentDate, i32)>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, InstallmentOfSale>(
            r#"
            SELECT d.id, d.payment_id, d.installment_number, d.due_date, d.paid_date,
                   d.installment_value, d.status, v.version
            FROM payment_dates d
            JOIN payments p ON p.id = d.payment_id
            JOIN sale_versions v ON v.id = p.sale_version_id
            WHERE d.tenant_id = $1 AND v.sale_id = $2 AND d.id = $3
            FOR UPDATE OF d
            "#,
        )
        .bind(tenant_id)
        .bind(sale_id)
        .bind(installment_id)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(|r| (r.installment, r.version)))
    }

    pub async fn update_installment_status<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        installment_id: Uuid,
        status: PaymentStatus,
        paid_date: Option<NaiveDate>,
    ) -> Result<PaymentDate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let installment = sqlx::query_as::<_, PaymentDate>(&format!(
            "UPDATE payment_dates SET status = $3, paid_date = $4
             WHERE tenant_id = $1 AND id = $2
             RETURNING {INSTALLMENT_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(installment_id)
        .bind(status)
        .bind(paid_date)
        .fetch_one(executor)
        .await?;

        Ok(installment)
    }

    // =========================================================================
    //  DEVOLUÇÕES
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_return<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sale_id: Uuid,
        from_version_id: Uuid,
        to_version_id: Uuid,
        returner_name: &str,
        reason: &str,
        created_by_user_id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<SalesReturn, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sales_return = sqlx::query_as::<_, SalesReturn>(&format!(
            "INSERT INTO sales_returns (
                 tenant_id, sale_id, from_version_id, to_version_id,
                 returner_name, reason, created_by_user_id, created_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {RETURN_COLUMNS}"
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .bind(from_version_id)
        .bind(to_version_id)
        .bind(returner_name)
        .bind(reason)
        .bind(created_by_user_id)
        .bind(created_at)
        .fetch_one(executor)
        .await?;

        Ok(sales_return)
    }

    pub async fn insert_return_items<'e, E>(
        &self,
        executor: E,
        tenant_id: Uuid,
        sales_return_id: Uuid,
        sku_ids: &[Uuid],
        quantities: &[i32],
        unit_prices: &[Decimal],
    ) -> Result<Vec<SalesReturnItem>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let items = sqlx::query_as::<_, SalesReturnItem>(
            r#"
            INSERT INTO sales_return_items (tenant_id, sales_return_id, sku_id, quantity, unit_price)
            SELECT $1, $2, t.sku_id, t.quantity, t.unit_price
            FROM unnest($3::uuid[], $4::int4[], $5::numeric[]) AS t(sku_id, quantity, unit_price)
            RETURNING id, sales_return_id, sku_id, quantity, unit_price
            "#,
        )
        .bind(tenant_id)
        .bind(sales_return_id)
        .bind(sku_ids)
        .bind(quantities)
        .bind(unit_prices)
        .fetch_all(executor)
        .await?;

        Ok(items)
    }

    pub async fn returns_by_sale(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
    ) -> Result<Vec<SalesReturnDetail>, AppError> {
        let returns = sqlx::query_as::<_, SalesReturn>(&format!(
            "SELECT {RETURN_COLUMNS} FROM sales_returns
             WHERE tenant_id = $1 AND sale_id = $2
             ORDER BY created_at"
        ))
        .bind(tenant_id)
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        let return_ids: Vec<Uuid> = returns.iter().map(|r| r.id).collect();
        let items = sqlx::query_as::<_, SalesReturnItem>(
            "SELECT id, sales_return_id, sku_id, quantity, unit_price FROM sales_return_items
             WHERE tenant_id = $1 AND sales_return_id = ANY($2)",
        )
        .bind(tenant_id)
        .bind(&return_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_return: HashMap<Uuid, Vec<SalesReturnItem>> = HashMap::new();
        for item in items {
            by_return.entry(item.sales_return_id).or_default().push(item);
        }

        Ok(returns
            .into_iter()
            .map(|sales_return| SalesReturnDetail {
                items: by_return.remove(&sales_return.id).unwrap_or_default(),
                sales_return,
            })
            .collect())
    }

    // =========================================================================
    //  LISTAGEM
    // =========================================================================

    /// Resumo das vendas com o total da última versão. `seller` restringe ao vendedor.
    pub async fn list_summaries(
        &self,
        tenant_id: Uuid,
        seller: Option<Uuid>,
    ) -> Result<Vec<SaleSummary>, AppError> {
        let sales = sqlx::query_as::<_, SaleSummary>(
            r#"
            SELECT s.id, s.code, s.date, s.user_id, u.name AS seller_name,
                   s.customer_id, c.name AS customer_name, s.last_version,
                   COALESCE((
                       SELECT ROUND(SUM(i.quantity * i.unit_price), 2)
                       FROM sale_items i
                       WHERE i.sale_version_id = v.id
                   ), 0)::NUMERIC(12, 2) AS total
            FROM sales s
            JOIN sale_versions v ON v.sale_id = s.id AND v.version = s.last_version
            JOIN users u ON u.id = s.user_id
            JOIN customers c ON c.id = s.customer_id
            WHERE s.tenant_id = $1 AND s.deleted_at IS NULL
              AND ($2::uuid IS NULL OR s.user_id = $2)
            ORDER BY s.date DESC
            "#,
        )
        .bind(tenant_id)
        .bind(seller)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }
}
