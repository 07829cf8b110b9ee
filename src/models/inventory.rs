// src/models/inventory.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "inventory_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryType {
    Primary,
    Reseller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "inventory_transaction_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InventoryTransactionType {
    In,
    Out,
    Transfer,
}

impl InventoryTransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            InventoryTransactionType::In => "IN",
            InventoryTransactionType::Out => "OUT",
            InventoryTransactionType::Transfer => "TRANSFER",
        }
    }

    pub fn takes_from_origin(self) -> bool {
        matches!(self, InventoryTransactionType::Out | InventoryTransactionType::Transfer)
    }

    pub fn puts_into_destination(self) -> bool {
        matches!(self, InventoryTransactionType::In | InventoryTransactionType::Transfer)
    }
}

// --- Estoques (principal e de revendedores) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: InventoryType,
    pub user_id: Option<Uuid>,
    /// Nome do revendedor dono do estoque
    pub owner_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Linha de estoque (bin) ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

// Linha de estoque com os dados do SKU, para listagem
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItemView {
    pub id: Uuid,
    pub inventory_id: Uuid,
    pub sku_id: Uuid,
    pub sku_code: String,
    pub product_name: String,
    pub color: String,
    pub size: String,
    pub quantity: i32,

    #[sqlx(skip)]
    pub display_name: String,
}

// --- Livro-razão de movimentações ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryTransaction {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: InventoryTransactionType,
    pub date: DateTime<Utc>,
    pub quantity: i32,
    pub sku_id: Uuid,
    pub inventory_in_id: Option<Uuid>,
    pub inventory_out_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
    pub justification: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkuQuantity {
    pub sku_id: Uuid,
    #[validate(range(min = 1, message = "A quantidade deve ser maior que zero."))]
    pub quantity: i32,
}

/// Pedido de movimentação de estoque.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_movement_shape"))]
pub struct StockMovement {
    #[serde(rename = "type")]
    pub kind: InventoryTransactionType,
    #[validate(length(min = 1, message = "Informe ao menos um SKU."), nested)]
    pub skus: Vec<SkuQuantity>,
    pub inventory_origin_id: Option<Uuid>,
    pub inventory_destination_id: Option<Uuid>,
    #[serde(default)]
    #[validate(length(max = 500, message = "Justificativa muito longa."))]
    pub justification: String,
    /// Venda que originou a movimentação. Nunca vem do cliente.
    #[serde(skip)]
    pub sale_id: Option<Uuid>,
}

/// IN exige só destino, OUT exige só origem, TRANSFER exige ambos.
fn validate_movement_shape(movement: &StockMovement) -> Result<(), ValidationError> {
    let origin = movement.inventory_origin_id.is_some();
    let destination = movement.inventory_destination_id.is_some();

    let valid = match movement.kind {
        InventoryTransactionType::In => destination && !origin,
        InventoryTransactionType::Out => origin && !destination,
        InventoryTransactionType::Transfer => origin && destination,
    };

    if valid {
        return Ok(());
    }

    let mut err = ValidationError::new("movement_shape");
    err.message = Some(
        match movement.kind {
            InventoryTransactionType::In => "Entrada exige apenas o estoque de destino.",
            InventoryTransactionType::Out => "Saída exige apenas o estoque de origem.",
            InventoryTransactionType::Transfer => "Transferência exige origem e destino.",
        }
        .into(),
    );
    Err(err)
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionSearch {
    pub inventory_id: Option<Uuid>,
    pub sku_id: Option<Uuid>,
    pub sale_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(kind: InventoryTransactionType, origin: bool, destination: bool) -> StockMovement {
        StockMovement {
            kind,
            skus: vec![SkuQuantity { sku_id: Uuid::new_v4(), quantity: 1 }],
            inventory_origin_id: origin.then(Uuid::new_v4),
            inventory_destination_id: destination.then(Uuid::new_v4),
            justification: String::new(),
            sale_id: None,
        }
    }

    #[test]
    fn test_shape_by_type() {
        use InventoryTransactionType::*;
        assert!(movement(In, false, true).validate().is_ok());
        assert!(movement(In, true, true).validate().is_err());
        assert!(movement(Out, true, false).validate().is_ok());
        assert!(movement(Out, false, false).validate().is_err());
        assert!(movement(Transfer, true, true).validate().is_ok());
        assert!(movement(Transfer, true, false).validate().is_err());
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let mut m = movement(InventoryTransactionType::In, false, true);
        m.skus[0].quantity = 0;
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_wire_names() {
        let json = serde_json::to_string(&InventoryTransactionType::Transfer).unwrap();
        assert_eq!(json, "\"TRANSFER\"");
        let parsed: StockMovement = serde_json::from_str(
            r#"{"type":"OUT","skus":[{"skuId":"00000000-0000-0000-0000-000000000001","quantity":2}],
                "inventoryOriginId":"00000000-0000-0000-0000-000000000002"}"#,
        )
        .unwrap();
        assert_eq!(parsed.kind, InventoryTransactionType::Out);
        assert!(parsed.sale_id.is_none());
    }
}
