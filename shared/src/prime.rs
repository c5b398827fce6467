//! External prime records (OPS/CNV operations databases)
//!
//! Primes are owned by two independent read-only upstream systems.
//! Local reconciliation state is never written upstream: a cash movement
//! whose reference is `{SYSTEM}-PRIME-{id}` means "already decaissée".

use serde::{Deserialize, Serialize};

/// Upstream operations system owning prime records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrimeSystem {
    /// Trucking operations
    Ops,
    /// Conventional cargo
    Cnv,
}

impl PrimeSystem {
    /// Code used in persisted reference keys; must never change
    pub fn code(&self) -> &'static str {
        match self {
            PrimeSystem::Ops => "OPS",
            PrimeSystem::Cnv => "CNV",
        }
    }

    /// Cash-ledger category for payouts of this system's primes
    pub fn categorie_caisse(&self) -> &'static str {
        match self {
            PrimeSystem::Ops => crate::caisse::CATEGORIE_PRIME_OPS,
            PrimeSystem::Cnv => crate::caisse::CATEGORIE_PRIME_CNV,
        }
    }
}

/// Deterministic payout reference: `{SYSTEM}-PRIME-{id}`
pub fn prime_reference(system: PrimeSystem, prime_id: i64) -> String {
    format!("{}-PRIME-{}", system.code(), prime_id)
}

/// Prime record as read from an upstream system
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalPrime {
    pub prime_id: i64,
    pub montant: f64,
    /// Upstream status string ("payee" on OPS, "paye" on CNV)
    pub statut: String,
    pub beneficiaire: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telephone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_paiement: Option<i64>,
}

impl ExternalPrime {
    /// Whether the prime was paid upstream and is eligible for payout
    pub fn est_payee(&self) -> bool {
        matches!(self.statut.as_str(), "payee" | "paye")
    }
}

/// One prime with its local reconciliation state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrimePendingView {
    pub prime: ExternalPrime,
    /// A movement with this prime's reference already exists
    pub decaisse: bool,
}

/// Reconciliation listing; `degraded` is set when the upstream was
/// unreachable and the listing comes from the last snapshot (or is empty)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrimeListing {
    pub system: PrimeSystem,
    pub primes: Vec<PrimePendingView>,
    pub degraded: bool,
    /// Snapshot age (millis timestamp of the last successful refresh)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refreshed_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prime_reference_format() {
        assert_eq!(prime_reference(PrimeSystem::Ops, 77), "OPS-PRIME-77");
        assert_eq!(prime_reference(PrimeSystem::Cnv, 12), "CNV-PRIME-12");
    }

    #[test]
    fn test_est_payee() {
        let mut p = ExternalPrime {
            prime_id: 1,
            montant: 50_000.0,
            statut: "payee".to_string(),
            beneficiaire: "B".to_string(),
            telephone: None,
            date_paiement: None,
        };
        assert!(p.est_payee());
        p.statut = "paye".to_string();
        assert!(p.est_payee());
        p.statut = "en_attente".to_string();
        assert!(!p.est_payee());
    }
}
