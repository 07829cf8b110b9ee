// src/services/sales_service.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{clock::Clock, codegen::CodeGenerator, error::AppError, money::round2},
    db::{CatalogRepository, CustomerRepository, InventoryRepository, SalesRepository, UserRepository},
    models::{
        catalog::Sku,
        inventory::{InventoryTransactionType, SkuQuantity, StockMovement},
        sales::{
            InstallmentStatusChange, NewReturn, NewSale, PaymentDate, PaymentStatus,
            PaymentWithInstallments, SaleDetail, SaleItem, SaleSummary, SaleVersionDetail,
            SalesReturnDetail,
        },
        tenancy::TenantContext,
    },
    services::{
        access::{self, InventoryPurpose},
        inventory_service::{check_duplicates, InventoryService},
        payment_plan::{self, PlannedPayment},
    },
};

/// Venda montada em memória, pronta para gravar.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleDraft {
    pub sku_ids: Vec<Uuid>,
    pub quantities: Vec<i32>,
    pub unit_prices: Vec<Decimal>,
    pub payments: Vec<PlannedPayment>,
    pub total: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnLine {
    pub sku_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnPlan {
    /// Itens que seguem na nova versão
    pub remaining: Vec<ReturnLine>,
    /// Itens devolvidos, com o preço da venda
    pub returned: Vec<ReturnLine>,
    pub new_total: Decimal,
}

fn columns(lines: &[ReturnLine]) -> (Vec<Uuid>, Vec<i32>, Vec<Decimal>) {
    (
        lines.iter().map(|l| l.sku_id).collect(),
        lines.iter().map(|l| l.quantity).collect(),
        lines.iter().map(|l| l.unit_price).collect(),
    )
}

// ---
// Montagem da venda (pura)
// ---

/// Valida e monta a venda. `stock` é o saldo de cada SKU no estoque de origem.
///
/// Nenhuma escrita acontece antes deste ponto: qualquer erro aqui deixa o banco intacto.
pub fn build_sale(
    input: &NewSale,
    catalog: &HashMap<Uuid, Sku>,
    stock: &HashMap<Uuid, i32>,
    today: NaiveDate,
) -> Result<SaleDraft, AppError> {
    check_duplicates(&input.items, catalog)?;

    let missing: Vec<Uuid> = input
        .items
        .iter()
        .map(|i| i.sku_id)
        .filter(|id| !catalog.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::SkusNotFound(missing));
    }

    let mut draft = SaleDraft {
        sku_ids: Vec::with_capacity(input.items.len()),
        quantities: Vec::with_capacity(input.items.len()),
        unit_prices: Vec::with_capacity(input.items.len()),
        payments: Vec::new(),
        total: Decimal::ZERO,
    };
    let mut insufficient = Vec::new();

    for item in &input.items {
        let Some(sku) = catalog.get(&item.sku_id) else {
            continue;
        };
        if item.quantity <= 0 {
            return Err(AppError::Validation(
                "A quantidade deve ser maior que zero.".into(),
            ));
        }
        if stock.get(&item.sku_id).copied().unwrap_or(0) < item.quantity {
            insufficient.push(sku.code.clone());
        }
        draft.sku_ids.push(item.sku_id);
        draft.quantities.push(item.quantity);
        draft.unit_prices.push(round2(sku.price));
    }

    draft.payments = payment_plan::build_payments(&input.payments, today)?;
    draft.total = payment_plan::items_total(
        draft
            .quantities
            .iter()
            .copied()
            .zip(draft.unit_prices.iter().copied()),
    );
    payment_plan::check_balance(draft.total, payment_plan::payments_total(&draft.payments))?;

    if !insufficient.is_empty() {
        return Err(AppError::QuantityInsufficient(insufficient));
    }
    Ok(draft)
}

// ---
// Devolução (pura)
// ---

/// Confere os itens devolvidos contra a versão corrente e calcula o que sobra.
///
/// A versão corrente já desconta devoluções anteriores, então o devido é a
/// quantidade do item nela.
pub fn plan_return(current: &[SaleItem], requested: &[SkuQuantity]) -> Result<ReturnPlan, AppError> {
    if requested.is_empty() {
        return Err(AppError::ReturnInvalid("nenhum item informado".into()));
    }

    let by_sku: HashMap<Uuid, &SaleItem> = current.iter().map(|i| (i.sku_id, i)).collect();
    let mut seen = HashSet::new();
    let mut returned_qty: HashMap<Uuid, i32> = HashMap::new();
    let mut returned = Vec::with_capacity(requested.len());

    for line in requested {
        if !seen.insert(line.sku_id) {
            return Err(AppError::ReturnInvalid(format!(
                "SKU {} repetido na devolução",
                by_sku
                    .get(&line.sku_id)
                    .map(|i| i.sku_code.clone())
                    .unwrap_or_else(|| line.sku_id.to_string())
            )));
        }
        let Some(item) = by_sku.get(&line.sku_id) else {
            return Err(AppError::ReturnInvalid(format!(
                "SKU {} não pertence à venda",
                line.sku_id
            )));
        };
        if line.quantity <= 0 {
            return Err(AppError::ReturnInvalid(format!(
                "quantidade inválida para o SKU {}",
                item.sku_code
            )));
        }
        if line.quantity > item.quantity {
            return Err(AppError::ReturnInvalid(format!(
                "SKU {}: devolvendo {}, restam {}",
                item.sku_code, line.quantity, item.quantity
            )));
        }
        returned_qty.insert(line.sku_id, line.quantity);
        returned.push(ReturnLine {
            sku_id: line.sku_id,
            quantity: line.quantity,
            unit_price: item.unit_price,
        });
    }

    let remaining: Vec<ReturnLine> = current
        .iter()
        .filter_map(|item| {
            let left = item.quantity - returned_qty.get(&item.sku_id).copied().unwrap_or(0);
            (left > 0).then(|| ReturnLine {
                sku_id: item.sku_id,
                quantity: left,
                unit_price: item.unit_price,
            })
        })
        .collect();

    let new_total = payment_plan::items_total(remaining.iter().map(|l| (l.quantity, l.unit_price)));

    Ok(ReturnPlan {
        remaining,
        returned,
        new_total,
    })
}

/// Valida a troca de status de uma parcela e devolve a data de pagamento a gravar.
pub fn resolve_paid_date(
    current: PaymentStatus,
    change: &InstallmentStatusChange,
) -> Result<Option<NaiveDate>, AppError> {
    match current {
        PaymentStatus::Reversal => {
            return Err(AppError::Validation(
                "Parcelas de estorno não podem ser alteradas.".into(),
            ));
        }
        PaymentStatus::Cancel => {
            return Err(AppError::Validation(
                "Parcelas canceladas não podem ser alteradas.".into(),
            ));
        }
        _ => {}
    }
    match change.status {
        PaymentStatus::Paid => change
            .paid_date
            .map(Some)
            .ok_or_else(|| AppError::Validation("Informe a data de pagamento.".into())),
        PaymentStatus::Reversal => Err(AppError::Validation(
            "O status REVERSAL é exclusivo das devoluções.".into(),
        )),
        _ => Ok(None),
    }
}

// ---
// Serviço
// ---

#[derive(Clone)]
pub struct SalesService {
    pool: PgPool,
    sales_repo: SalesRepository,
    catalog_repo: CatalogRepository,
    inventory_repo: InventoryRepository,
    customer_repo: CustomerRepository,
    user_repo: UserRepository,
    inventory: InventoryService,
    clock: Arc<dyn Clock>,
    codes: Arc<dyn CodeGenerator>,
}

impl SalesService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        sales_repo: SalesRepository,
        catalog_repo: CatalogRepository,
        inventory_repo: InventoryRepository,
        customer_repo: CustomerRepository,
        user_repo: UserRepository,
        inventory: InventoryService,
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
    ) -> Self {
        Self {
            pool,
            sales_repo,
            catalog_repo,
            inventory_repo,
            customer_repo,
            user_repo,
            inventory,
            clock,
            codes,
        }
    }

    // =========================================================================
    //  VENDA
    // =========================================================================

    pub async fn do_sale(&self, ctx: &TenantContext, input: NewSale) -> Result<SaleDetail, AppError> {
        let tenant_id = ctx.tenant_id;
        let now = self.clock.now();
        let today = self.clock.today();

        let mut tx = self.pool.begin().await?;

        self.customer_repo
            .find_by_id(&mut *tx, tenant_id, input.customer_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Cliente".into()))?;
        self.user_repo
            .find_by_id(&mut *tx, tenant_id, ctx.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Vendedor".into()))?;

        let inventory_id = access::user_inventory(
            &mut tx,
            &self.inventory_repo,
            ctx,
            input.inventory_id,
            InventoryPurpose::SaleOrigin,
        )
        .await?;

        let ids: Vec<Uuid> = input.items.iter().map(|i| i.sku_id).collect();
        let catalog: HashMap<Uuid, Sku> = self
            .catalog_repo
            .find_skus_by_ids(&mut *tx, tenant_id, &ids, None)
            .await?
            .into_iter()
            .map(|sku| (sku.id, sku))
            .collect();
        let stock: HashMap<Uuid, i32> = self
            .inventory_repo
            .lock_bins(&mut *tx, tenant_id, inventory_id, &ids)
            .await?
            .into_iter()
            .map(|bin| (bin.sku_id, bin.quantity))
            .collect();

        let draft = build_sale(&input, &catalog, &stock, today)?;

        let code = self.codes.sale_code(now);
        let sale = self
            .sales_repo
            .insert_sale(&mut *tx, tenant_id, &code, now, ctx.user_id, input.customer_id)
            .await?;
        let version = self
            .sales_repo
            .insert_version(&mut *tx, tenant_id, sale.id, 1, now)
            .await?;
        let items = self
            .sales_repo
            .insert_items(
                &mut *tx,
                tenant_id,
                version.id,
                &draft.sku_ids,
                &draft.quantities,
                &draft.unit_prices,
            )
            .await?;
        let payments = self
            .insert_payments(&mut tx, tenant_id, version.id, &draft.payments)
            .await?;

        let movement = StockMovement {
            kind: InventoryTransactionType::Out,
            skus: input.items.clone(),
            inventory_origin_id: Some(inventory_id),
            inventory_destination_id: None,
            justification: format!("Vendido em {}", today.format("%d/%m/%Y")),
            sale_id: Some(sale.id),
        };
        self.inventory.do_transaction(&mut tx, ctx, &movement).await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            user_id = %ctx.user_id,
            sale_id = %sale.id,
            code = %sale.code,
            total = %draft.total,
            "🧾 Venda registrada"
        );

        Ok(SaleDetail {
            sale,
            current: SaleVersionDetail {
                version,
                items,
                payments,
                total: draft.total,
            },
            returns: Vec::new(),
        })
    }

    // =========================================================================
    //  DEVOLUÇÃO
    // =========================================================================

    pub async fn do_return(
        &self,
        ctx: &TenantContext,
        sale_id: Uuid,
        input: NewReturn,
    ) -> Result<SaleDetail, AppError> {
        let tenant_id = ctx.tenant_id;
        let now = self.clock.now();
        let today = self.clock.today();

        let mut tx = self.pool.begin().await?;

        let sale = self
            .sales_repo
            .lock_sale(&mut *tx, tenant_id, sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Venda".into()))?;
        access::ensure_can_see_sale(ctx, sale.user_id)?;

        let destination_id = access::user_inventory(
            &mut tx,
            &self.inventory_repo,
            ctx,
            input.inventory_destination_id,
            InventoryPurpose::ReturnDestination,
        )
        .await?;

        let from = self
            .sales_repo
            .find_version(&mut *tx, tenant_id, sale.id, sale.last_version)
            .await?
            .ok_or_else(|| AppError::NotFound("Versão da venda".into()))?;
        let current_items = self
            .sales_repo
            .items_by_version(&mut *tx, tenant_id, from.id)
            .await?;
        let previous = self
            .sales_repo
            .installments_by_version(&mut *tx, tenant_id, from.id)
            .await?;

        let plan = plan_return(&current_items, &input.items)?;
        let new_payments = payment_plan::recompute_payments(&previous, plan.new_total, today);

        let next = sale.last_version + 1;
        let to = self
            .sales_repo
            .insert_version(&mut *tx, tenant_id, sale.id, next, now)
            .await?;

        let items = if plan.remaining.is_empty() {
            Vec::new()
        } else {
            let (sku_ids, quantities, prices) = columns(&plan.remaining);
            self.sales_repo
                .insert_items(&mut *tx, tenant_id, to.id, &sku_ids, &quantities, &prices)
                .await?
        };
        let payments = self
            .insert_payments(&mut tx, tenant_id, to.id, &new_payments)
            .await?;

        let sales_return = self
            .sales_repo
            .insert_return(
                &mut *tx,
                tenant_id,
                sale.id,
                from.id,
                to.id,
                input.returner_name.trim(),
                input.reason.trim(),
                ctx.user_id,
                now,
            )
            .await?;
        let (sku_ids, quantities, prices) = columns(&plan.returned);
        self.sales_repo
            .insert_return_items(&mut *tx, tenant_id, sales_return.id, &sku_ids, &quantities, &prices)
            .await?;

        self.sales_repo
            .cancel_open_installments(&mut *tx, tenant_id, from.id)
            .await?;
        self.sales_repo
            .bump_last_version(&mut *tx, tenant_id, sale.id, next)
            .await?;

        let movement = StockMovement {
            kind: InventoryTransactionType::In,
            skus: input.items.clone(),
            inventory_origin_id: None,
            inventory_destination_id: Some(destination_id),
            justification: format!(
                "Devolvido em {} por {}",
                today.format("%d/%m/%Y"),
                input.returner_name.trim()
            ),
            sale_id: Some(sale.id),
        };
        self.inventory.do_transaction(&mut tx, ctx, &movement).await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            user_id = %ctx.user_id,
            sale_id = %sale.id,
            return_id = %sales_return.id,
            version = next,
            new_total = %plan.new_total,
            "↩️ Devolução registrada"
        );

        let returns = self.sales_repo.returns_by_sale(tenant_id, sale.id).await?;
        Ok(SaleDetail {
            sale: crate::models::sales::Sale {
                last_version: next,
                ..sale
            },
            current: SaleVersionDetail {
                version: to,
                items,
                payments,
                total: plan.new_total,
            },
            returns,
        })
    }

    async fn insert_payments(
        &self,
        conn: &mut PgConnection,
        tenant_id: Uuid,
        sale_version_id: Uuid,
        planned: &[PlannedPayment],
    ) -> Result<Vec<PaymentWithInstallments>, AppError> {
        let mut payments = Vec::with_capacity(planned.len());
        for plan in planned {
            let payment = self
                .sales_repo
                .insert_payment(&mut *conn, tenant_id, sale_version_id, plan.payment_type)
                .await?;
            let installments = self
                .sales_repo
                .insert_installments(&mut *conn, tenant_id, payment.id, &plan.installments)
                .await?;
            payments.push(PaymentWithInstallments {
                payment,
                installments,
            });
        }
        Ok(payments)
    }

    // =========================================================================
    //  PARCELAS
    // =========================================================================

    pub async fn change_installment_status(
        &self,
        ctx: &TenantContext,
        sale_id: Uuid,
        installment_id: Uuid,
        change: InstallmentStatusChange,
    ) -> Result<PaymentDate, AppError> {
        let tenant_id = ctx.tenant_id;
        let mut tx = self.pool.begin().await?;

        // Mesma trava das devoluções: a versão corrente não muda durante a troca.
        let sale = self
            .sales_repo
            .lock_sale(&mut *tx, tenant_id, sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Venda".into()))?;
        access::ensure_can_see_sale(ctx, sale.user_id)?;

        let (installment, version) = self
            .sales_repo
            .find_installment_of_sale(&mut *tx, tenant_id, sale.id, installment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Parcela".into()))?;
        if version != sale.last_version {
            return Err(AppError::Validation(format!(
                "A parcela pertence à versão {}, substituída pela versão {}.",
                version, sale.last_version
            )));
        }

        let paid_date = resolve_paid_date(installment.status, &change)?;
        let updated = self
            .sales_repo
            .update_installment_status(&mut *tx, tenant_id, installment.id, change.status, paid_date)
            .await?;

        tx.commit().await?;

        tracing::info!(
            tenant_id = %tenant_id,
            user_id = %ctx.user_id,
            sale_id = %sale.id,
            installment_id = %updated.id,
            status = updated.status.as_str(),
            "💳 Status da parcela alterado"
        );
        Ok(updated)
    }

    // =========================================================================
    //  CONSULTAS
    // =========================================================================

    pub async fn get_sales(&self, ctx: &TenantContext) -> Result<Vec<SaleSummary>, AppError> {
        let seller = (!access::is_admin(ctx)).then_some(ctx.user_id);
        self.sales_repo.list_summaries(ctx.tenant_id, seller).await
    }

    pub async fn get_sale_by_id(&self, ctx: &TenantContext, sale_id: Uuid) -> Result<SaleDetail, AppError> {
        let sale = self.visible_sale(ctx, sale_id).await?;
        let current = self
            .version_detail(ctx.tenant_id, sale.id, sale.last_version)
            .await?;
        let returns = self.sales_repo.returns_by_sale(ctx.tenant_id, sale.id).await?;

        Ok(SaleDetail {
            sale,
            current,
            returns,
        })
    }

    pub async fn get_version(
        &self,
        ctx: &TenantContext,
        sale_id: Uuid,
        version: i32,
    ) -> Result<SaleVersionDetail, AppError> {
        let sale = self.visible_sale(ctx, sale_id).await?;
        self.version_detail(ctx.tenant_id, sale.id, version).await
    }

    pub async fn get_returns(
        &self,
        ctx: &TenantContext,
        sale_id: Uuid,
    ) -> Result<Vec<SalesReturnDetail>, AppError> {
        let sale = self.visible_sale(ctx, sale_id).await?;
        self.sales_repo.returns_by_sale(ctx.tenant_id, sale.id).await
    }

    async fn visible_sale(
        &self,
        ctx: &TenantContext,
        sale_id: Uuid,
    ) -> Result<crate::models::sales::Sale, AppError> {
        let sale = self
            .sales_repo
            .find_sale(&self.pool, ctx.tenant_id, sale_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Venda".into()))?;
        access::ensure_can_see_sale(ctx, sale.user_id)?;
        Ok(sale)
    }

    // Itens e pagamentos de uma única versão.
    async fn version_detail(
        &self,
        tenant_id: Uuid,
        sale_id: Uuid,
        version: i32,
    ) -> Result<SaleVersionDetail, AppError> {
        let version = self
            .sales_repo
            .find_version(&self.pool, tenant_id, sale_id, version)
            .await?
            .ok_or_else(|| AppError::NotFound("Versão da venda".into()))?;
        let items = self
            .sales_repo
            .items_by_version(&self.pool, tenant_id, version.id)
            .await?;
        let payments = self
            .sales_repo
            .payments_by_version(tenant_id, version.id)
            .await?;
        let total = payment_plan::items_total(items.iter().map(|i| (i.quantity, i.unit_price)));

        Ok(SaleVersionDetail {
            version,
            items,
            payments,
            total,
        })
    }
}
