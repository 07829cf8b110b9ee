// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::sales::PaymentType;

/// Categorias de erro visíveis na fronteira HTTP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Duplicate,
    QuantityInsufficient,
    PaymentImbalance,
    ReturnInvalid,
    Unauthorized,
    PermissionDenied,
    BillingBlocked,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::Validation
            | ErrorKind::Duplicate
            | ErrorKind::QuantityInsufficient
            | ErrorKind::PaymentImbalance
            | ErrorKind::ReturnInvalid => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied | ErrorKind::BillingBlocked => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("{0}")]
    Validation(String),

    #[error("{0} não encontrado")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    // --- Movimentação de estoque ---
    #[error("Transferência com origem e destino iguais")]
    TransferSameInventory,

    #[error("SKUs duplicados na requisição: {}", .0.join(", "))]
    SkusDuplicated(Vec<String>),

    #[error("SKUs não encontrados: {}", join_ids(.0))]
    SkusNotFound(Vec<Uuid>),

    #[error("SKUs sem saldo no estoque de origem: {}", .0.join(", "))]
    OriginItemNotFound(Vec<String>),

    #[error("Quantidade insuficiente em estoque: {}", .0.join(", "))]
    QuantityInsufficient(Vec<String>),

    #[error("Usuário não possui estoque para esta operação")]
    NoInventory,

    // --- Vendas ---
    #[error("Pagamento insuficiente: faltam {delta}")]
    PaymentMissing { delta: Decimal },

    #[error("Pagamento excede o total da venda em {delta}")]
    PaymentOver { delta: Decimal },

    #[error("Forma de pagamento repetida: {0}")]
    DuplicatePaymentType(PaymentType),

    #[error("Código de SKU já existe: {0}")]
    DuplicateCode(String),

    #[error("Devolução inválida: {0}")]
    ReturnInvalid(String),

    // --- Acesso ---
    #[error("{0}")]
    PermissionDenied(String),

    #[error("Assinatura sem permissão de escrita")]
    BillingBlocked,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_)
            | AppError::Validation(_)
            | AppError::TransferSameInventory
            | AppError::SkusDuplicated(_)
            | AppError::NoInventory
            | AppError::DuplicatePaymentType(_) => ErrorKind::Validation,
            AppError::NotFound(_) | AppError::SkusNotFound(_) | AppError::OriginItemNotFound(_) => {
                ErrorKind::NotFound
            }
            AppError::Duplicate(_) | AppError::DuplicateCode(_) => ErrorKind::Duplicate,
            AppError::QuantityInsufficient(_) => ErrorKind::QuantityInsufficient,
            AppError::PaymentMissing { .. } | AppError::PaymentOver { .. } => {
                ErrorKind::PaymentImbalance
            }
            AppError::ReturnInvalid(_) => ErrorKind::ReturnInvalid,
            AppError::InvalidCredentials | AppError::InvalidToken | AppError::JwtError(_) => {
                ErrorKind::Unauthorized
            }
            AppError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AppError::BillingBlocked => ErrorKind::BillingBlocked,
            AppError::DatabaseError(_)
            | AppError::InternalServerError(_)
            | AppError::BcryptError(_) => ErrorKind::Internal,
        }
    }

    /// Mensagem enviada ao cliente. Erros internos nunca vazam detalhes.
    fn public_message(&self) -> String {
        match self {
            AppError::ValidationError(errors) => {
                let mut messages: Vec<String> = errors
                    .field_errors()
                    .into_iter()
                    .flat_map(|(field, field_errors)| {
                        field_errors.iter().map(move |e| match &e.message {
                            Some(m) => m.to_string(),
                            None => format!("Campo '{}' inválido.", field),
                        })
                    })
                    .collect();
                messages.sort();
                if messages.is_empty() {
                    "Um ou mais campos são inválidos.".to_string()
                } else {
                    messages.join(" ")
                }
            }
            AppError::JwtError(_) => "Token de autenticação inválido ou ausente.".to_string(),
            e if e.kind() == ErrorKind::Internal => "Ocorreu um erro inesperado.".to_string(),
            e => e.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        match kind {
            ErrorKind::Internal => tracing::error!("Erro Interno do Servidor: {:?}", self),
            ErrorKind::Unauthorized | ErrorKind::PermissionDenied | ErrorKind::BillingBlocked => {
                tracing::info!("Acesso negado: {}", self)
            }
            _ => tracing::warn!("Requisição rejeitada: {}", self),
        }

        let body = Json(json!({ "message": self.public_message() }));
        (kind.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::money::dec;

    #[test]
    fn test_kind_status_mapping() {
        assert_eq!(AppError::TransferSameInventory.kind().status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("Venda".into()).kind().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::QuantityInsufficient(vec!["A".into()]).kind(),
            ErrorKind::QuantityInsufficient
        );
        assert_eq!(AppError::BillingBlocked.kind().status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::PermissionDenied("x".into()).kind().status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::InvalidToken.kind().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::DuplicateCode("A".into()).kind(),
            ErrorKind::Duplicate
        );
    }

    #[test]
    fn test_payment_imbalance_carries_delta() {
        let err = AppError::PaymentMissing { delta: dec("0.01") };
        assert_eq!(err.kind(), ErrorKind::PaymentImbalance);
        assert!(err.to_string().contains("0.01"));
    }

    #[test]
    fn test_internal_errors_do_not_leak() {
        let err = AppError::InternalServerError(anyhow::anyhow!("senha do banco: xyz"));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert_eq!(err.public_message(), "Ocorreu um erro inesperado.");
    }

    #[test]
    fn test_skus_listed_in_message() {
        let err = AppError::SkusDuplicated(vec!["A-1".into(), "B-2".into()]);
        assert_eq!(err.to_string(), "SKUs duplicados na requisição: A-1, B-2");
    }
}
