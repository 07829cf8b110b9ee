// src/models/catalog.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// --- Categorias ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

// --- Produtos ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub category_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- SKUs ---
// Linha da tabela 'skus' junto com o nome do produto e o saldo agregado.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sku {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub code: String,
    pub color: String,
    pub size: String,
    pub cost: Option<Decimal>,
    pub price: Decimal,
    /// Soma dos saldos (ou o saldo de um estoque, quando filtrado).
    pub quantity: i32,

    #[sqlx(skip)]
    pub display_name: String,
}

impl Sku {
    pub fn with_display_name(mut self) -> Self {
        self.display_name = display_name(&self.product_name, &self.color, &self.size);
        self
    }
}

/// "produto - cor - tamanho", omitindo partes vazias.
pub fn display_name(product_name: &str, color: &str, size: &str) -> String {
    let mut name = product_name.trim().to_string();
    for part in [color.trim(), size.trim()] {
        if !part.is_empty() {
            name.push_str(" - ");
            name.push_str(part);
        }
    }
    name
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub category_name: Option<String>,
    pub skus: Vec<Sku>,
}

// ---
// Payloads
// ---
pub(crate) fn validate_not_negative(val: &Decimal) -> Result<(), ValidationError> {
    if val.is_sign_negative() {
        let mut err = ValidationError::new("range");
        err.message = Some("O valor não pode ser negativo.".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SkuPayload {
    #[validate(length(min = 1, max = 60, message = "O código do SKU é obrigatório."))]
    pub code: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub size: String,
    #[validate(custom(function = "validate_not_negative"))]
    pub cost: Option<Decimal>,
    #[validate(custom(function = "validate_not_negative"))]
    pub price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductPayload {
    #[validate(length(min = 1, max = 200, message = "O nome do produto é obrigatório."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub skus: Vec<SkuPayload>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductPayload {
    #[validate(length(min = 1, max = 200, message = "O nome do produto é obrigatório."))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryPayload {
    #[validate(length(min = 1, max = 100, message = "O nome da categoria é obrigatório."))]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct SkuSearch {
    pub search: Option<String>,
    /// Quando informado, `quantity` passa a ser o saldo neste estoque
    pub inventory_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductSearch {
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::money::dec;

    #[test]
    fn test_display_name_skips_empty_parts() {
        assert_eq!(display_name("Camiseta", "Azul", "M"), "Camiseta - Azul - M");
        assert_eq!(display_name("Camiseta", "", "M"), "Camiseta - M");
        assert_eq!(display_name("Camiseta", " ", ""), "Camiseta");
    }

    #[test]
    fn test_sku_payload_rejects_negative_price() {
        let payload = SkuPayload {
            code: "CAM-AZ-M".into(),
            color: "Azul".into(),
            size: "M".into(),
            cost: Some(dec("5.00")),
            price: dec("-1.00"),
        };
        let errors = payload.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("price"));
    }

    #[test]
    fn test_product_payload_validates_nested_skus() {
        let payload = CreateProductPayload {
            name: "Camiseta".into(),
            description: String::new(),
            category_id: None,
            category_name: Some("Roupas".into()),
            skus: vec![SkuPayload {
                code: String::new(),
                color: String::new(),
                size: String::new(),
                cost: None,
                price: dec("10.00"),
            }],
        };
        assert!(payload.validate().is_err());
    }
}
