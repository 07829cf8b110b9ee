// src/services/access.rs
//
// Predicados de acesso derivados do contexto da requisição.

use sqlx::PgConnection;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::InventoryRepository,
    models::tenancy::{Role, TenantContext},
};

pub fn role(ctx: &TenantContext) -> Role {
    ctx.role
}

pub fn can_write(ctx: &TenantContext) -> bool {
    ctx.billing.can_write
}

pub fn is_admin(ctx: &TenantContext) -> bool {
    role(ctx) == Role::Admin
}

pub fn require_admin(ctx: &TenantContext) -> Result<(), AppError> {
    if is_admin(ctx) {
        return Ok(());
    }
    Err(AppError::PermissionDenied(
        "Apenas administradores podem realizar esta operação.".into(),
    ))
}

/// Administrador vê qualquer venda da empresa; revendedor só as próprias.
pub fn can_see_sale(ctx: &TenantContext, seller_id: Uuid) -> bool {
    is_admin(ctx) || ctx.user_id == seller_id
}

pub fn ensure_can_see_sale(ctx: &TenantContext, seller_id: Uuid) -> Result<(), AppError> {
    if can_see_sale(ctx, seller_id) {
        return Ok(());
    }
    Err(AppError::PermissionDenied(
        "Você só pode acessar as suas próprias vendas.".into(),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryPurpose {
    /// Saída de uma venda: o administrador usa o principal quando não informa outro.
    SaleOrigin,
    /// Entrada de uma devolução: o administrador precisa informar o destino.
    ReturnDestination,
}

/// Escolhe o estoque em que o usuário opera.
///
/// O estoque de revendedor do próprio usuário tem precedência; sem ele, só o
/// administrador opera, sobre o estoque pedido ou o principal conforme `purpose`.
pub fn choose_inventory(
    ctx: &TenantContext,
    own_reseller: Option<Uuid>,
    requested: Option<Uuid>,
    primary: Option<Uuid>,
    purpose: InventoryPurpose,
) -> Result<Uuid, AppError> {
    if let Some(own) = own_reseller {
        return Ok(own);
    }
    if !is_admin(ctx) {
        return Err(AppError::NoInventory);
    }
    let chosen = match purpose {
        InventoryPurpose::SaleOrigin => requested.or(primary),
        InventoryPurpose::ReturnDestination => requested,
    };
    chosen.ok_or(AppError::NoInventory)
}

/// Resolve o estoque de operação dentro da transação do chamador.
pub async fn user_inventory(
    conn: &mut PgConnection,
    inventory_repo: &InventoryRepository,
    ctx: &TenantContext,
    requested: Option<Uuid>,
    purpose: InventoryPurpose,
) -> Result<Uuid, AppError> {
    let own = inventory_repo
        .find_by_user(&mut *conn, ctx.tenant_id, ctx.user_id)
        .await?
        .map(|inventory| inventory.id);

    if own.is_none() && is_admin(ctx) {
        if let Some(id) = requested {
            // O estoque informado precisa ser da mesma empresa.
            inventory_repo
                .find_by_id(&mut *conn, ctx.tenant_id, id)
                .await?
                .ok_or_else(|| AppError::NotFound("Estoque".into()))?;
        }
    }

    let primary = if own.is_none() && requested.is_none() && purpose == InventoryPurpose::SaleOrigin
    {
        inventory_repo
            .find_primary(&mut *conn, ctx.tenant_id)
            .await?
            .map(|inventory| inventory.id)
    } else {
        None
    };

    choose_inventory(ctx, own, requested, primary, purpose)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::tenancy::BillingContext;

    pub(crate) fn ctx(role: Role) -> TenantContext {
        TenantContext {
            tenant_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            username: "Ana".into(),
            role,
            billing: BillingContext { can_write: true },
        }
    }

    #[test]
    fn test_reseller_uses_own_inventory() {
        let own = Uuid::new_v4();
        let chosen = choose_inventory(
            &ctx(Role::Reseller),
            Some(own),
            Some(Uuid::new_v4()),
            None,
            InventoryPurpose::ReturnDestination,
        )
        .unwrap();
        assert_eq!(chosen, own);
    }

    #[test]
    fn test_reseller_without_inventory_is_rejected() {
        let err = choose_inventory(
            &ctx(Role::Reseller),
            None,
            None,
            Some(Uuid::new_v4()),
            InventoryPurpose::SaleOrigin,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NoInventory));
    }

    #[test]
    fn test_admin_sale_defaults_to_primary() {
        let primary = Uuid::new_v4();
        let chosen = choose_inventory(
            &ctx(Role::Admin),
            None,
            None,
            Some(primary),
            InventoryPurpose::SaleOrigin,
        )
        .unwrap();
        assert_eq!(chosen, primary);
    }

    #[test]
    fn test_admin_return_requires_destination() {
        let admin = ctx(Role::Admin);
        let err = choose_inventory(&admin, None, None, None, InventoryPurpose::ReturnDestination)
            .unwrap_err();
        assert!(matches!(err, AppError::NoInventory));

        let requested = Uuid::new_v4();
        let chosen = choose_inventory(
            &admin,
            None,
            Some(requested),
            None,
            InventoryPurpose::ReturnDestination,
        )
        .unwrap();
        assert_eq!(chosen, requested);
    }

    #[test]
    fn test_sale_visibility() {
        let reseller = ctx(Role::Reseller);
        assert!(can_see_sale(&reseller, reseller.user_id));
        assert!(!can_see_sale(&reseller, Uuid::new_v4()));
        assert!(ensure_can_see_sale(&reseller, Uuid::new_v4()).is_err());
        assert!(can_see_sale(&ctx(Role::Admin), Uuid::new_v4()));
    }

    #[test]
    fn test_require_admin() {
        assert!(require_admin(&ctx(Role::Admin)).is_ok());
        let err = require_admin(&ctx(Role::Reseller)).unwrap_err();
        assert_eq!(err.kind(), crate::common::error::ErrorKind::PermissionDenied);
    }
}
