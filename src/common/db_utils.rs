// src/common/db_utils.rs

use crate::common::error::AppError;

// ---
// Tradução centralizada de violações de restrição do Postgres
// ---

/// Converte violação de chave única no erro de domínio escolhido pelo chamador.
/// Qualquer outro erro segue como `DatabaseError`.
pub(crate) fn map_unique_violation<F>(e: sqlx::Error, on_duplicate: F) -> AppError
where
    F: FnOnce() -> AppError,
{
    if is_unique_violation(&e) {
        return on_duplicate();
    }
    e.into()
}

pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}

/// Verdadeiro quando o erro é a violação do CHECK nomeado.
pub(crate) fn is_check_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e {
        sqlx::Error::Database(db_err) => {
            db_err.is_check_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

/// Busca sem resultado vira `NotFound` com o nome da entidade.
pub(crate) fn not_found_as<T>(
    result: Result<Option<T>, AppError>,
    entity: &str,
) -> Result<T, AppError> {
    result?.ok_or_else(|| AppError::NotFound(entity.to_string()))
}

/// Padrão ILIKE para buscas livres; vazio vira `None`.
pub(crate) fn like_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::error::ErrorKind;

    #[test]
    fn test_non_database_errors_pass_through() {
        let err = map_unique_violation(sqlx::Error::RowNotFound, || {
            AppError::Duplicate("não deveria".into())
        });
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!is_check_violation(&sqlx::Error::PoolTimedOut, "x"));
    }

    #[test]
    fn test_missing_row_becomes_not_found() {
        let err = not_found_as::<()>(Ok(None), "Venda").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Venda não encontrado");

        assert_eq!(not_found_as(Ok(Some(7)), "Venda").unwrap(), 7);
        let db = not_found_as::<()>(Err(sqlx::Error::PoolTimedOut.into()), "Venda").unwrap_err();
        assert_eq!(db.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_like_pattern() {
        assert_eq!(like_pattern(Some(" azul ")), Some("%azul%".to_string()));
        assert_eq!(like_pattern(Some("  ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
