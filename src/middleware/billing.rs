// src/middleware/billing.rs
//
// Bloqueia escrita de empresas sem assinatura válida.

use axum::{
    extract::{OriginalUri, Request},
    http::Method,
    middleware::Next,
    response::Response,
};

use crate::{common::error::AppError, models::tenancy::TenantContext, services::access};

// Rotas que continuam liberadas mesmo sem permissão de escrita
const BYPASS_PREFIXES: [&str; 2] = ["/api/billing/", "/api/dashboard/"];

pub fn requires_write_access(method: &Method, path: &str) -> bool {
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return false;
    }
    !BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
}

/// Deve rodar depois do `auth_guard`, que injeta o contexto.
pub async fn billing_guard(
    OriginalUri(uri): OriginalUri,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if requires_write_access(request.method(), uri.path()) {
        let ctx = request
            .extensions()
            .get::<TenantContext>()
            .ok_or(AppError::InvalidToken)?;

        if !access::can_write(ctx) {
            tracing::warn!(
                tenant_id = %ctx.tenant_id,
                path = uri.path(),
                "Escrita bloqueada pela assinatura"
            );
            return Err(AppError::BillingBlocked);
        }
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_never_need_billing() {
        assert!(!requires_write_access(&Method::GET, "/api/sales"));
        assert!(!requires_write_access(&Method::HEAD, "/api/sales"));
        assert!(!requires_write_access(&Method::OPTIONS, "/api/sales"));
    }

    #[test]
    fn test_writes_need_billing() {
        assert!(requires_write_access(&Method::POST, "/api/sales"));
        assert!(requires_write_access(&Method::PATCH, "/api/sales/1/installments/2"));
        assert!(requires_write_access(&Method::DELETE, "/api/customers/1"));
    }

    #[test]
    fn test_billing_and_dashboard_bypass() {
        assert!(!requires_write_access(&Method::POST, "/api/billing/checkout"));
        assert!(!requires_write_access(&Method::POST, "/api/dashboard/widgets"));
        assert!(requires_write_access(&Method::POST, "/api/billingx"));
    }
}
