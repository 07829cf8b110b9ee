// src/common/codegen.rs

use chrono::{DateTime, Utc};
use svix_ksuid::{Ksuid, KsuidLike};
use time::OffsetDateTime;

/// Prefixo dos códigos de venda.
pub const SALE_CODE_PREFIX: &str = "V-";

pub trait CodeGenerator: Send + Sync {
    fn sale_code(&self, now: DateTime<Utc>) -> String;
}

/// Códigos "V-" + KSUID: 27 caracteres base62, ordenáveis pelo tempo.
#[derive(Debug, Clone, Copy, Default)]
pub struct KsuidGenerator;

impl CodeGenerator for KsuidGenerator {
    fn sale_code(&self, now: DateTime<Utc>) -> String {
        format!("{}{}", SALE_CODE_PREFIX, ksuid_at(now, None).to_base62())
    }
}

// Fora da faixa do KSUID, o crate usa o instante atual.
fn ksuid_at(now: DateTime<Utc>, payload: Option<[u8; 16]>) -> Ksuid {
    Ksuid::new(OffsetDateTime::from_unix_timestamp(now.timestamp()).ok(), payload.as_ref().map(|p| p.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_sale_code_shape() {
        let code = KsuidGenerator.sale_code(Utc::now());
        let id = code.strip_prefix(SALE_CODE_PREFIX).unwrap();
        assert_eq!(id.len(), 27);
        assert!(id.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert_ne!(code, KsuidGenerator.sale_code(Utc::now()));
    }

    #[test]
    fn test_ksuid_carries_sale_time() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 12, 30, 0).unwrap();
        assert_eq!(ksuid_at(now, None).timestamp_seconds(), now.timestamp());
    }

    #[test]
    fn test_codes_are_time_ordered() {
        let earlier = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 1).unwrap();
        assert!(
            ksuid_at(earlier, Some([0xff; 16])).to_base62()
                < ksuid_at(later, Some([0u8; 16])).to_base62()
        );
    }
}
