//! Money and tax arithmetic using rust_decimal for precision
//!
//! Amounts are stored/serialized as `f64`; every computation goes
//! through `Decimal` and is rounded to 2 decimal places half-up before
//! leaving this module. Tax is computed once at the document level from
//! the sum of line amounts, never per line.

use crate::error::{DomainError, DomainResult};
use rust_decimal::prelude::*;
use shared::document::{DocumentSnapshot, LigneSet, Paiement};

/// Rounding for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed amount on a single line or payment
pub const MAX_MONTANT: f64 = 10_000_000_000.0;
/// Maximum allowed quantity per line
pub const MAX_QUANTITE: f64 = 1_000_000.0;

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Round a Decimal to 2 decimal places half-up
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
pub fn require_finite(value: f64, field: &'static str) -> DomainResult<()> {
    if !value.is_finite() {
        return Err(DomainError::validation(
            field,
            format!("must be a finite number, got {value}"),
        ));
    }
    Ok(())
}

/// Validate a tax rate in percent (0-100)
pub fn validate_taux(value: f64, field: &'static str) -> DomainResult<()> {
    require_finite(value, field)?;
    if !(0.0..=100.0).contains(&value) {
        return Err(DomainError::validation(
            field,
            format!("must be between 0 and 100, got {value}"),
        ));
    }
    Ok(())
}

/// Validate a quantity (positive, bounded)
pub fn validate_quantite(value: f64) -> DomainResult<()> {
    require_finite(value, "quantite")?;
    if value <= 0.0 {
        return Err(DomainError::validation(
            "quantite",
            format!("must be positive, got {value}"),
        ));
    }
    if value > MAX_QUANTITE {
        return Err(DomainError::validation(
            "quantite",
            format!("exceeds maximum allowed ({MAX_QUANTITE}), got {value}"),
        ));
    }
    Ok(())
}

/// Validate a unit price (non-negative, bounded)
pub fn validate_prix_unitaire(value: f64) -> DomainResult<()> {
    require_finite(value, "prix_unitaire")?;
    if value < 0.0 {
        return Err(DomainError::validation(
            "prix_unitaire",
            format!("must be non-negative, got {value}"),
        ));
    }
    if value > MAX_MONTANT {
        return Err(DomainError::validation(
            "prix_unitaire",
            format!("exceeds maximum allowed ({MAX_MONTANT}), got {value}"),
        ));
    }
    Ok(())
}

/// Validate a payment or movement amount (strictly positive, bounded)
pub fn validate_montant(value: f64, field: &'static str) -> DomainResult<()> {
    require_finite(value, field)?;
    if value <= 0.0 {
        return Err(DomainError::validation(
            field,
            format!("must be positive, got {value}"),
        ));
    }
    if value > MAX_MONTANT {
        return Err(DomainError::validation(
            field,
            format!("exceeds maximum allowed ({MAX_MONTANT}), got {value}"),
        ));
    }
    Ok(())
}

// ============================================================================
// Tax computation
// ============================================================================

/// Document-level tax amounts derived from montant_ht
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxBreakdown {
    pub montant_tva: f64,
    pub montant_css: f64,
    pub montant_ttc: f64,
}

/// Compute TVA/CSS/TTC from a pre-tax total and percent rates.
///
/// Each amount is rounded to 2 decimal places half-up independently;
/// TTC is the sum of the three rounded components.
pub fn compute_taxes(montant_ht: f64, taux_tva: f64, taux_css: f64) -> TaxBreakdown {
    let ht = to_decimal(montant_ht);
    let tva = round_money(ht * to_decimal(taux_tva) / Decimal::ONE_HUNDRED);
    let css = round_money(ht * to_decimal(taux_css) / Decimal::ONE_HUNDRED);
    let ttc = round_money(ht) + tva + css;
    TaxBreakdown {
        montant_tva: to_f64(tva),
        montant_css: to_f64(css),
        montant_ttc: to_f64(ttc),
    }
}

/// Line amount: quantite × prix_unitaire, rounded to 2 decimal places
pub fn ligne_montant(quantite: f64, prix_unitaire: f64) -> f64 {
    to_f64(to_decimal(quantite) * to_decimal(prix_unitaire))
}

/// Pre-tax total of a line-item tree with precise accumulation
pub fn montant_ht_total(lignes: &LigneSet) -> f64 {
    let total: Decimal = lignes.leaf_amounts().iter().map(|m| to_decimal(*m)).sum();
    to_f64(total)
}

/// Recompute every derived total on a document from its line items and
/// snapshotted rates. Idempotent.
pub fn recalculate_totals(snapshot: &mut DocumentSnapshot) {
    let ht = montant_ht_total(&snapshot.lignes);
    let taxes = compute_taxes(ht, snapshot.taux_tva, snapshot.taux_css);
    snapshot.montant_ht = ht;
    snapshot.montant_tva = taxes.montant_tva;
    snapshot.montant_css = taxes.montant_css;
    snapshot.montant_ttc = taxes.montant_ttc;
}

// ============================================================================
// Payment arithmetic
// ============================================================================

/// Sum payment amounts with precise arithmetic
pub fn sum_paiements(paiements: &[Paiement]) -> Decimal {
    paiements.iter().map(|p| to_decimal(p.montant)).sum()
}

/// Outstanding amount of an invoice, clamped at zero
pub fn reste_a_payer(snapshot: &DocumentSnapshot) -> Decimal {
    (to_decimal(snapshot.montant_ttc) - sum_paiements(&snapshot.paiements)).max(Decimal::ZERO)
}

/// Whether `paye` settles `du` (within 0.01 tolerance)
pub fn is_settled(paye: Decimal, du: Decimal) -> bool {
    paye >= du - MONEY_TOLERANCE
}

/// Compare two monetary values for equality (within 0.01 tolerance)
pub fn money_eq(a: f64, b: f64) -> bool {
    (to_decimal(a) - to_decimal(b)).abs() < MONEY_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::document::LigneOperation;

    fn ligne(quantite: f64, prix: f64) -> LigneOperation {
        LigneOperation {
            ligne_id: "l".to_string(),
            type_operation: "Transport".to_string(),
            date_debut: None,
            date_fin: None,
            lieu: None,
            quantite,
            prix_unitaire: prix,
            montant_ht: ligne_montant(quantite, prix),
        }
    }

    #[test]
    fn test_decimal_precision() {
        // Classic floating point problem: 0.1 + 0.2 != 0.3
        let sum = to_decimal(0.1) + to_decimal(0.2);
        assert_eq!(to_f64(sum), 0.3);
    }

    #[test]
    fn test_rounding_half_up() {
        assert_eq!(to_f64(Decimal::new(5, 3)), 0.01); // 0.005 rounds up
        assert_eq!(to_f64(Decimal::new(4, 3)), 0.0); // 0.004 rounds down
    }

    #[test]
    fn test_compute_taxes_reference_scenario() {
        // quantite=2, prix=500000, TVA 18%, CSS 1%
        let ht = ligne_montant(2.0, 500_000.0);
        assert_eq!(ht, 1_000_000.0);

        let taxes = compute_taxes(ht, 18.0, 1.0);
        assert_eq!(taxes.montant_tva, 180_000.0);
        assert_eq!(taxes.montant_css, 10_000.0);
        assert_eq!(taxes.montant_ttc, 1_190_000.0);
    }

    #[test]
    fn test_compute_taxes_zero_rates() {
        let taxes = compute_taxes(1_000.0, 0.0, 0.0);
        assert_eq!(taxes.montant_tva, 0.0);
        assert_eq!(taxes.montant_css, 0.0);
        assert_eq!(taxes.montant_ttc, 1_000.0);
    }

    #[test]
    fn test_compute_taxes_fractional_rounding() {
        // 33.33 at 18% = 5.9994 → 6.00 half-up
        let taxes = compute_taxes(33.33, 18.0, 1.0);
        assert_eq!(taxes.montant_tva, 6.0);
        assert_eq!(taxes.montant_css, 0.33);
        assert_eq!(taxes.montant_ttc, 39.66);
    }

    #[test]
    fn test_ttc_invariant_formula() {
        // ttc == round(ht * (1 + tva/100 + css/100)) component-wise
        for (ht, tva, css) in [
            (1_000_000.0, 18.0, 1.0),
            (123_456.78, 19.25, 0.5),
            (0.01, 18.0, 1.0),
            (0.0, 18.0, 1.0),
        ] {
            let t = compute_taxes(ht, tva, css);
            let expected = to_f64(
                round_money(to_decimal(ht))
                    + round_money(to_decimal(ht) * to_decimal(tva) / Decimal::ONE_HUNDRED)
                    + round_money(to_decimal(ht) * to_decimal(css) / Decimal::ONE_HUNDRED),
            );
            assert_eq!(t.montant_ttc, expected, "ht={ht} tva={tva} css={css}");
        }
    }

    #[test]
    fn test_montant_ht_total_accumulates_precisely() {
        // 100 lines at 0.01 must sum to exactly 1.00
        let lignes = LigneSet::Independant((0..100).map(|_| ligne(1.0, 0.01)).collect());
        assert_eq!(montant_ht_total(&lignes), 1.0);
    }

    #[test]
    fn test_validate_quantite_bounds() {
        assert!(validate_quantite(1.0).is_ok());
        assert!(validate_quantite(0.0).is_err());
        assert!(validate_quantite(-2.0).is_err());
        assert!(validate_quantite(f64::NAN).is_err());
        assert!(validate_quantite(MAX_QUANTITE + 1.0).is_err());
    }

    #[test]
    fn test_validate_prix_unitaire_bounds() {
        assert!(validate_prix_unitaire(0.0).is_ok());
        assert!(validate_prix_unitaire(-1.0).is_err());
        assert!(validate_prix_unitaire(f64::INFINITY).is_err());
        assert!(validate_prix_unitaire(MAX_MONTANT + 1.0).is_err());
    }

    #[test]
    fn test_validate_montant_strictly_positive() {
        assert!(validate_montant(1.0, "montant").is_ok());
        assert!(validate_montant(0.0, "montant").is_err());
        assert!(validate_montant(f64::NAN, "montant").is_err());
    }

    #[test]
    fn test_is_settled_tolerance() {
        assert!(is_settled(to_decimal(100.0), to_decimal(100.0)));
        assert!(is_settled(to_decimal(99.995), to_decimal(100.0)));
        assert!(!is_settled(to_decimal(99.98), to_decimal(100.0)));
    }

    #[test]
    fn test_money_eq() {
        assert!(money_eq(100.0, 100.0));
        assert!(money_eq(100.004, 100.006));
        assert!(!money_eq(100.0, 100.02));
    }
}
