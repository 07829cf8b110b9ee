// src/services/inventory_service.rs

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{clock::Clock, error::AppError},
    db::{inventory_repo::LedgerEntry, CatalogRepository, InventoryRepository},
    models::{
        catalog::Sku,
        inventory::{
            Inventory, InventoryItem, InventoryItemView, InventoryTransaction,
            InventoryTransactionType, SkuQuantity, StockMovement, TransactionSearch,
        },
        tenancy::TenantContext,
    },
    services::access,
};

/// Movimentação validada: um SKU por posição, na ordem do pedido.
#[derive(Debug, Clone, PartialEq)]
pub struct MovementPlan {
    pub sku_ids: Vec<Uuid>,
    pub quantities: Vec<i32>,
    pub codes: Vec<String>,
}

// ---
// Validações puras
// ---

/// Formato da movimentação conforme o tipo.
pub fn check_shape(movement: &StockMovement) -> Result<(), AppError> {
    let origin = movement.inventory_origin_id;
    let destination = movement.inventory_destination_id;

    match movement.kind {
        InventoryTransactionType::In if destination.is_none() || origin.is_some() => {
            return Err(AppError::Validation(
                "Entrada exige apenas o estoque de destino.".into(),
            ));
        }
        InventoryTransactionType::Out if origin.is_none() || destination.is_some() => {
            return Err(AppError::Validation(
                "Saída exige apenas o estoque de origem.".into(),
            ));
        }
        InventoryTransactionType::Transfer => match (origin, destination) {
            (Some(o), Some(d)) if o == d => return Err(AppError::TransferSameInventory),
            (Some(_), Some(_)) => {}
            _ => {
                return Err(AppError::Validation(
                    "Transferência exige origem e destino.".into(),
                ));
            }
        },
        _ => {}
    }

    if movement.skus.is_empty() {
        return Err(AppError::Validation("Informe ao menos um SKU.".into()));
    }
    if movement.skus.iter().any(|s| s.quantity <= 0) {
        return Err(AppError::Validation(
            "A quantidade deve ser maior que zero.".into(),
        ));
    }
    Ok(())
}

fn code_of(catalog: &HashMap<Uuid, Sku>, sku_id: Uuid) -> String {
    catalog
        .get(&sku_id)
        .map(|sku| sku.code.clone())
        .unwrap_or_else(|| sku_id.to_string())
}

/// SKUs repetidos no mesmo pedido, identificados pelo código.
pub fn check_duplicates(
    skus: &[SkuQuantity],
    catalog: &HashMap<Uuid, Sku>,
) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    let mut duplicated: Vec<String> = skus
        .iter()
        .filter(|s| !seen.insert(s.sku_id))
        .map(|s| code_of(catalog, s.sku_id))
        .collect();

    if duplicated.is_empty() {
        return Ok(());
    }
    duplicated.sort();
    duplicated.dedup();
    Err(AppError::SkusDuplicated(duplicated))
}

/// Confere existência dos SKUs e, quando há origem, a linha e o saldo de cada um.
pub fn plan_movement(
    movement: &StockMovement,
    catalog: &HashMap<Uuid, Sku>,
    origin_bins: &[InventoryItem],
) -> Result<MovementPlan, AppError> {
    let missing: Vec<Uuid> = movement
        .skus
        .iter()
        .map(|s| s.sku_id)
        .filter(|id| !catalog.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(AppError::SkusNotFound(missing));
    }

    if movement.kind.takes_from_origin() {
        let bins: HashMap<Uuid, i32> = origin_bins.iter().map(|b| (b.sku_id, b.quantity)).collect();

        let without_bin: Vec<String> = movement
            .skus
            .iter()
            .filter(|s| !bins.contains_key(&s.sku_id))
            .map(|s| code_of(catalog, s.sku_id))
            .collect();
        if !without_bin.is_empty() {
            return Err(AppError::OriginItemNotFound(without_bin));
        }

        let insufficient: Vec<String> = movement
            .skus
            .iter()
            .filter(|s| bins.get(&s.sku_id).copied().unwrap_or(0) < s.quantity)
            .map(|s| code_of(catalog, s.sku_id))
            .collect();
        if !insufficient.is_empty() {
            return Err(AppError::QuantityInsufficient(insufficient));
        }
    }

    Ok(MovementPlan {
        sku_ids: movement.skus.iter().map(|s| s.sku_id).collect(),
        quantities: movement.skus.iter().map(|s| s.quantity).collect(),
        codes: movement
            .skus
            .iter()
            .map(|s| code_of(catalog, s.sku_id))
            .collect(),
    })
}

// ---
// Serviço
// ---

#[derive(Clone)]
pub struct InventoryService {
    pool: PgPool,
    inventory_repo: InventoryRepository,
    catalog_repo: CatalogRepository,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    pub fn new(
        pool: PgPool,
        inventory_repo: InventoryRepository,
        catalog_repo: CatalogRepository,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            inventory_repo,
            catalog_repo,
            clock,
        }
    }

    /// Aplica uma movimentação dentro da transação do chamador.
    ///
    /// Nunca abre transação própria: qualquer erro deixa a transação do chamador
    /// para ser desfeita. As linhas de origem ficam travadas (FOR UPDATE) desde a
    /// conferência de saldo até o fim da transação.
    pub async fn do_transaction(
        &self,
        conn: &mut PgConnection,
        ctx: &TenantContext,
        movement: &StockMovement,
    ) -> Result<Vec<InventoryTransaction>, AppError> {
        check_shape(movement)?;
        let tenant_id = ctx.tenant_id;

        let ids: Vec<Uuid> = movement.skus.iter().map(|s| s.sku_id).collect();
        let catalog: HashMap<Uuid, Sku> = self
            .catalog_repo
            .find_skus_by_ids(&mut *conn, tenant_id, &ids, None)
            .await?
            .into_iter()
            .map(|sku| (sku.id, sku))
            .collect();

        check_duplicates(&movement.skus, &catalog)?;

        for inventory_id in [movement.inventory_origin_id, movement.inventory_destination_id]
            .into_iter()
            .flatten()
        {
            self.inventory_repo
                .find_by_id(&mut *conn, tenant_id, inventory_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Estoque".into()))?;
        }

        let origin = movement
            .inventory_origin_id
            .filter(|_| movement.kind.takes_from_origin());
        let destination = movement
            .inventory_destination_id
            .filter(|_| movement.kind.puts_into_destination());

        let origin_bins = match origin {
            Some(origin_id) => {
                self.inventory_repo
                    .lock_bins(&mut *conn, tenant_id, origin_id, &ids)
                    .await?
            }
            None => Vec::new(),
        };

        let plan = plan_movement(movement, &catalog, &origin_bins)?;

        if let Some(destination_id) = destination {
            self.inventory_repo
                .ensure_bins(&mut *conn, tenant_id, destination_id, &plan.sku_ids)
                .await?;
            self.inventory_repo
                .lock_bins(&mut *conn, tenant_id, destination_id, &plan.sku_ids)
                .await?;
        }

        if let Some(origin_id) = origin {
            let deltas: Vec<i32> = plan.quantities.iter().map(|q| -q).collect();
            self.inventory_repo
                .apply_deltas(&mut *conn, tenant_id, origin_id, &plan.sku_ids, &deltas, || {
                    AppError::QuantityInsufficient(plan.codes.clone())
                })
                .await?;
        }

        if let Some(destination_id) = destination {
            self.inventory_repo
                .apply_deltas(
                    &mut *conn,
                    tenant_id,
                    destination_id,
                    &plan.sku_ids,
                    &plan.quantities,
                    || AppError::QuantityInsufficient(plan.codes.clone()),
                )
                .await?;
        }

        let entry = LedgerEntry {
            kind: movement.kind,
            date: self.clock.now(),
            inventory_in_id: destination,
            inventory_out_id: origin,
            sale_id: movement.sale_id,
            justification: &movement.justification,
            sku_ids: plan.sku_ids,
            quantities: plan.quantities,
        };

        self.inventory_repo
            .insert_ledger(&mut *conn, tenant_id, &entry)
            .await
    }

    /// Movimentação avulsa (somente administradores), na sua própria transação.
    pub async fn transact(
        &self,
        ctx: &TenantContext,
        movement: StockMovement,
    ) -> Result<Vec<InventoryTransaction>, AppError> {
        access::require_admin(ctx)?;

        // Referência de venda só é aceita quando a movimentação nasce de uma venda.
        let movement = StockMovement {
            sale_id: None,
            ..movement
        };

        let mut tx = self.pool.begin().await?;
        let rows = self.do_transaction(&mut tx, ctx, &movement).await?;
        tx.commit().await?;

        tracing::info!(
            tenant_id = %ctx.tenant_id,
            user_id = %ctx.user_id,
            kind = movement.kind.as_str(),
            skus = rows.len(),
            "📦 Movimentação de estoque registrada"
        );
        Ok(rows)
    }

    // ---
    // Leituras
    // ---

    pub async fn list_inventories(&self, ctx: &TenantContext) -> Result<Vec<Inventory>, AppError> {
        if access::is_admin(ctx) {
            return self.inventory_repo.list(ctx.tenant_id).await;
        }
        let own = self
            .inventory_repo
            .find_by_user(&self.pool, ctx.tenant_id, ctx.user_id)
            .await?;
        Ok(own.into_iter().collect())
    }

    pub async fn list_items(
        &self,
        ctx: &TenantContext,
        inventory_id: Uuid,
    ) -> Result<Vec<InventoryItemView>, AppError> {
        let inventory = self
            .inventory_repo
            .find_by_id(&self.pool, ctx.tenant_id, inventory_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Estoque".into()))?;

        if !access::is_admin(ctx) && inventory.user_id != Some(ctx.user_id) {
            return Err(AppError::PermissionDenied(
                "Você só pode consultar o seu próprio estoque.".into(),
            ));
        }

        self.inventory_repo
            .list_items(ctx.tenant_id, inventory_id)
            .await
    }

    /// Revendedores só enxergam as movimentações do próprio estoque.
    pub async fn list_transactions(
        &self,
        ctx: &TenantContext,
        mut search: TransactionSearch,
    ) -> Result<Vec<InventoryTransaction>, AppError> {
        if !access::is_admin(ctx) {
            let own = self
                .inventory_repo
                .find_by_user(&self.pool, ctx.tenant_id, ctx.user_id)
                .await?
                .ok_or(AppError::NoInventory)?;

            match search.inventory_id {
                Some(requested) if requested != own.id => {
                    return Err(AppError::PermissionDenied(
                        "Você só pode consultar o seu próprio estoque.".into(),
                    ));
                }
                _ => search.inventory_id = Some(own.id),
            }
        }

        self.inventory_repo
            .list_transactions(ctx.tenant_id, &search)
            .await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::common::error::ErrorKind;
    use crate::common::money::dec;
    use chrono::Utc;

    pub(crate) fn sku(code: &str, price: &str) -> Sku {
        Sku {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Camiseta".into(),
            code: code.into(),
            color: String::new(),
            size: String::new(),
            cost: None,
            price: dec(price),
            quantity: 0,
            display_name: String::new(),
        }
    }

    pub(crate) fn bin(inventory_id: Uuid, sku_id: Uuid, quantity: i32) -> InventoryItem {
        InventoryItem {
            id: Uuid::new_v4(),
            inventory_id,
            sku_id,
            quantity,
            updated_at: Utc::now(),
        }
    }

    fn catalog(skus: &[&Sku]) -> HashMap<Uuid, Sku> {
        skus.iter().map(|s| (s.id, (*s).clone())).collect()
    }

    fn movement(
        kind: InventoryTransactionType,
        skus: &[(Uuid, i32)],
        origin: Option<Uuid>,
        destination: Option<Uuid>,
    ) -> StockMovement {
        StockMovement {
            kind,
            skus: skus
                .iter()
                .map(|(sku_id, quantity)| SkuQuantity {
                    sku_id: *sku_id,
                    quantity: *quantity,
                })
                .collect(),
            inventory_origin_id: origin,
            inventory_destination_id: destination,
            justification: String::new(),
            sale_id: None,
        }
    }

    #[test]
    fn test_transfer_to_same_inventory_is_rejected() {
        let inventory = Uuid::new_v4();
        let m = movement(
            InventoryTransactionType::Transfer,
            &[(Uuid::new_v4(), 1)],
            Some(inventory),
            Some(inventory),
        );
        assert!(matches!(check_shape(&m), Err(AppError::TransferSameInventory)));
    }

    #[test]
    fn test_shape_requires_inventories_by_type() {
        let sku_id = Uuid::new_v4();
        let in_without_destination =
            movement(InventoryTransactionType::In, &[(sku_id, 1)], None, None);
        assert!(check_shape(&in_without_destination).is_err());

        let out_with_destination = movement(
            InventoryTransactionType::Out,
            &[(sku_id, 1)],
            Some(Uuid::new_v4()),
            Some(Uuid::new_v4()),
        );
        assert!(check_shape(&out_with_destination).is_err());

        let empty = movement(InventoryTransactionType::In, &[], None, Some(Uuid::new_v4()));
        assert_eq!(check_shape(&empty).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_duplicates_are_reported_by_code() {
        let a = sku("A", "10.00");
        let b = sku("B", "10.00");
        let requested = [
            SkuQuantity { sku_id: a.id, quantity: 1 },
            SkuQuantity { sku_id: b.id, quantity: 1 },
            SkuQuantity { sku_id: a.id, quantity: 2 },
        ];
        match check_duplicates(&requested, &catalog(&[&a, &b])) {
            Err(AppError::SkusDuplicated(codes)) => assert_eq!(codes, vec!["A".to_string()]),
            other => panic!("esperado SkusDuplicated, veio {:?}", other),
        }
    }

    #[test]
    fn test_unknown_sku_is_not_found() {
        let a = sku("A", "10.00");
        let ghost = Uuid::new_v4();
        let m = movement(
            InventoryTransactionType::In,
            &[(a.id, 1), (ghost, 1)],
            None,
            Some(Uuid::new_v4()),
        );
        match plan_movement(&m, &catalog(&[&a]), &[]) {
            Err(AppError::SkusNotFound(ids)) => assert_eq!(ids, vec![ghost]),
            other => panic!("esperado SkusNotFound, veio {:?}", other),
        }
    }

    #[test]
    fn test_out_without_origin_bin() {
        let a = sku("A", "10.00");
        let origin = Uuid::new_v4();
        let m = movement(InventoryTransactionType::Out, &[(a.id, 1)], Some(origin), None);
        let err = plan_movement(&m, &catalog(&[&a]), &[]).unwrap_err();
        assert!(matches!(err, AppError::OriginItemNotFound(ref codes) if codes == &["A"]));
    }

    #[test]
    fn test_insufficient_stock_cites_sku() {
        // Saldo 1, pedido 2.
        let a = sku("A", "10.00");
        let origin = Uuid::new_v4();
        let m = movement(InventoryTransactionType::Out, &[(a.id, 2)], Some(origin), None);
        let err = plan_movement(&m, &catalog(&[&a]), &[bin(origin, a.id, 1)]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::QuantityInsufficient);
        assert!(err.to_string().contains('A'));
    }

    #[test]
    fn test_transfer_plan() {
        // P:{A:5}, R:{} -> TRANSFER 3 de A
        let a = sku("A", "10.00");
        let primary = Uuid::new_v4();
        let reseller = Uuid::new_v4();
        let m = movement(
            InventoryTransactionType::Transfer,
            &[(a.id, 3)],
            Some(primary),
            Some(reseller),
        );
        assert!(check_shape(&m).is_ok());

        let plan = plan_movement(&m, &catalog(&[&a]), &[bin(primary, a.id, 5)]).unwrap();
        assert_eq!(plan.sku_ids, vec![a.id]);
        assert_eq!(plan.quantities, vec![3]);
        assert_eq!(plan.codes, vec!["A".to_string()]);
    }

    #[test]
    fn test_in_ignores_origin_bins() {
        let a = sku("A", "10.00");
        let m = movement(InventoryTransactionType::In, &[(a.id, 7)], None, Some(Uuid::new_v4()));
        let plan = plan_movement(&m, &catalog(&[&a]), &[]).unwrap();
        assert_eq!(plan.quantities, vec![7]);
    }
}
