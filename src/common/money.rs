// src/common/money.rs

use rust_decimal::{Decimal, RoundingStrategy};

/// Arredonda para 2 casas, com empate longe do zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Soma arredondada de uma sequência de valores.
pub fn sum2<I>(values: I) -> Decimal
where
    I: IntoIterator<Item = Decimal>,
{
    round2(values.into_iter().sum())
}

fn cent() -> Decimal {
    Decimal::new(1, 2)
}

/// Divide `total` em `n` parcelas quase iguais, em centavos inteiros.
///
/// As primeiras parcelas recebem um centavo a mais, de modo que a soma é
/// exatamente `round2(total)` e a diferença máxima entre duas parcelas é 0,01.
/// A conta fica toda em `Decimal`, sem conversão para inteiro.
pub fn split_amount(total: Decimal, n: usize) -> Vec<Decimal> {
    if n == 0 {
        return Vec::new();
    }

    let total = round2(total);
    let parts = Decimal::from(n);
    let step = parts * cent();

    let mut extra = total % step;
    if extra < Decimal::ZERO {
        extra += step;
    }
    let base = (total - extra) / parts;

    (0..n)
        .map(|i| {
            let mut part = if Decimal::from(i) * cent() < extra {
                base + cent()
            } else {
                base
            };
            part.rescale(2);
            part
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn dec(s: &str) -> Decimal {
    s.parse().expect("decimal literal")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(dec("10.005")), dec("10.01"));
        assert_eq!(round2(dec("10.004")), dec("10.00"));
        assert_eq!(round2(dec("-10.005")), dec("-10.01"));
        assert_eq!(round2(dec("0.125")), dec("0.13"));
    }

    #[test]
    fn test_split_amount_exact_division() {
        assert_eq!(split_amount(dec("20.00"), 2), vec![dec("10.00"), dec("10.00")]);
    }

    #[test]
    fn test_split_amount_remainder_goes_to_earliest() {
        assert_eq!(
            split_amount(dec("10.00"), 3),
            vec![dec("3.34"), dec("3.33"), dec("3.33")]
        );
        assert_eq!(
            split_amount(dec("100.02"), 4),
            vec![dec("25.01"), dec("25.01"), dec("25.00"), dec("25.00")]
        );
    }

    #[test]
    fn test_split_amount_zero_parts() {
        assert!(split_amount(dec("10.00"), 0).is_empty());
    }

    #[test]
    fn test_split_amount_large_total_is_not_zeroed() {
        // Acima de i64::MAX centavos.
        let total = dec("100000000000000000.03");
        let parts = split_amount(total, 2);
        assert_eq!(parts, vec![dec("50000000000000000.02"), dec("50000000000000000.01")]);
        assert_eq!(parts.iter().copied().sum::<Decimal>(), total);
    }

    #[test]
    fn test_split_amount_keeps_two_decimals() {
        let parts = split_amount(dec("10"), 4);
        assert!(parts.iter().all(|p| p.scale() == 2));
        assert_eq!(parts, vec![dec("2.50"); 4]);
    }

    proptest! {
        #[test]
        fn prop_split_amount_sums_exactly(cents in 0i64..10_000_000, n in 1usize..48) {
            let total = Decimal::new(cents, 2);
            let parts = split_amount(total, n);

            prop_assert_eq!(parts.len(), n);
            prop_assert_eq!(parts.iter().copied().sum::<Decimal>(), round2(total));

            let max = parts.iter().max().copied().unwrap_or_default();
            let min = parts.iter().min().copied().unwrap_or_default();
            prop_assert!(max - min <= dec("0.01"));

            // O centavo extra fica sempre nas primeiras parcelas.
            for pair in parts.windows(2) {
                prop_assert!(pair[0] >= pair[1]);
            }
        }
    }
}
