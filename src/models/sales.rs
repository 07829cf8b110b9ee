// src/models/sales.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::catalog::validate_not_negative;
use crate::models::inventory::SkuQuantity;

// A ordem de declaração define a ordem dos pagamentos devolvidos.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "payment_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Cash,
    Pix,
    DebitCard,
    CreditCard,
    CreditStore,
    Return,
}

impl PaymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentType::Cash => "CASH",
            PaymentType::Pix => "PIX",
            PaymentType::DebitCard => "DEBIT_CARD",
            PaymentType::CreditCard => "CREDIT_CARD",
            PaymentType::CreditStore => "CREDIT_STORE",
            PaymentType::Return => "RETURN",
        }
    }

    /// À vista: exatamente uma parcela.
    pub fn is_single_installment(self) -> bool {
        matches!(self, PaymentType::Cash | PaymentType::Pix | PaymentType::DebitCard)
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Delayed,
    Cancel,
    Reversal,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Delayed => "DELAYED",
            PaymentStatus::Cancel => "CANCEL",
            PaymentStatus::Reversal => "REVERSAL",
        }
    }

    /// Liquidadas: preservadas entre versões.
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Reversal)
    }

    /// Em aberto: redistribuídas em uma devolução.
    pub fn is_open(self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Delayed)
    }
}

// ---
// Registros persistidos
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub code: String,
    pub date: DateTime<Utc>,
    pub user_id: Uuid,
    pub customer_id: Uuid,
    pub last_version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleVersion {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: Uuid,
    pub sale_version_id: Uuid,
    pub sku_id: Uuid,
    pub sku_code: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub sale_version_id: Uuid,
    pub payment_type: PaymentType,
}

// Parcela
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDate {
    pub id: Uuid,
    pub payment_id: Uuid,
    pub installment_number: i32,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub installment_value: Decimal,
    pub status: PaymentStatus,
}

/// Parcela de uma versão junto com a forma de pagamento a que pertence.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ScheduledInstallment {
    pub payment_type: PaymentType,
    pub installment_number: i32,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub installment_value: Decimal,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWithInstallments {
    #[serde(flatten)]
    pub payment: Payment,
    pub installments: Vec<PaymentDate>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesReturn {
    pub id: Uuid,
    pub sale_id: Uuid,
    pub from_version_id: Uuid,
    pub to_version_id: Uuid,
    pub returner_name: String,
    pub reason: String,
    pub created_by_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesReturnItem {
    pub id: Uuid,
    pub sales_return_id: Uuid,
    pub sku_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SalesReturnDetail {
    #[serde(flatten)]
    pub sales_return: SalesReturn,
    pub items: Vec<SalesReturnItem>,
}

// ---
// Leituras compostas
// ---
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleSummary {
    pub id: Uuid,
    pub code: String,
    pub date: DateTime<Utc>,
    pub user_id: Uuid,
    pub seller_name: String,
    pub customer_id: Uuid,
    pub customer_name: String,
    pub last_version: i32,
    /// Total dos itens da última versão
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleVersionDetail {
    pub version: SaleVersion,
    pub items: Vec<SaleItem>,
    pub payments: Vec<PaymentWithInstallments>,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    pub sale: Sale,
    pub current: SaleVersionDetail,
    pub returns: Vec<SalesReturnDetail>,
}

// ---
// Entradas
// ---
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewInstallment {
    pub due_date: NaiveDate,
    #[validate(custom(function = "validate_not_negative"))]
    pub value: Decimal,
    /// Aceito por compatibilidade; não é persistido.
    #[serde(default)]
    pub informed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewPayment {
    #[serde(rename = "type")]
    pub payment_type: PaymentType,
    #[validate(length(min = 1, message = "Informe ao menos uma parcela."), nested)]
    pub installments: Vec<NewInstallment>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewSale {
    pub customer_id: Uuid,
    /// Estoque de origem (apenas administradores; padrão: estoque principal)
    pub inventory_id: Option<Uuid>,
    #[validate(length(min = 1, message = "A venda precisa de ao menos um item."), nested)]
    pub items: Vec<SkuQuantity>,
    #[validate(length(min = 1, message = "Informe ao menos uma forma de pagamento."), nested)]
    pub payments: Vec<NewPayment>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewReturn {
    #[validate(length(min = 1, max = 200, message = "Informe quem está devolvendo."))]
    pub returner_name: String,
    #[serde(default)]
    #[validate(length(max = 500, message = "Motivo muito longo."))]
    pub reason: String,
    #[validate(length(min = 1, message = "Informe ao menos um item devolvido."), nested)]
    pub items: Vec<SkuQuantity>,
    pub inventory_destination_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstallmentStatusChange {
    pub status: PaymentStatus,
    pub paid_date: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_type_order_follows_declaration() {
        let mut types = vec![
            PaymentType::Return,
            PaymentType::CreditStore,
            PaymentType::Cash,
            PaymentType::CreditCard,
            PaymentType::Pix,
            PaymentType::DebitCard,
        ];
        types.sort();
        let names: Vec<_> = types.iter().map(|t| t.as_str()).collect();
        assert_eq!(
            names,
            ["CASH", "PIX", "DEBIT_CARD", "CREDIT_CARD", "CREDIT_STORE", "RETURN"]
        );
    }

    #[test]
    fn test_status_partitions() {
        assert!(PaymentStatus::Paid.is_settled());
        assert!(PaymentStatus::Reversal.is_settled());
        assert!(PaymentStatus::Delayed.is_open());
        assert!(!PaymentStatus::Cancel.is_open());
        assert!(!PaymentStatus::Cancel.is_settled());
    }

    #[test]
    fn test_new_sale_wire_format() {
        let sale: NewSale = serde_json::from_str(
            r#"{
                "customerId": "00000000-0000-0000-0000-000000000001",
                "items": [{"skuId": "00000000-0000-0000-0000-000000000002", "quantity": 2}],
                "payments": [{"type": "CREDIT_STORE", "installments": [
                    {"dueDate": "2025-02-01", "value": 10.0, "informed": true}
                ]}]
            }"#,
        )
        .unwrap();
        assert_eq!(sale.payments[0].payment_type, PaymentType::CreditStore);
        assert!(sale.inventory_id.is_none());
        assert!(sale.validate().is_ok());
    }
}
