//! Cash/bank ledger movements
//!
//! The ledger is append-only: the running balance is computed on read,
//! never stored. Movements emitted by other flows (invoice payments,
//! refunds, prime payouts) carry a unique `reference` used as an
//! idempotency key and belong to system-owned categories.

use serde::{Deserialize, Serialize};

/// Movement direction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MouvementType {
    Entree,
    Sortie,
}

/// Physical ledger a movement belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceCaisse {
    #[default]
    Caisse,
    Banque,
}

/// Categories recorded by the engine itself; not accepted from callers
/// and not deletable directly
pub const CATEGORIE_PAIEMENT_FACTURE: &str = "Paiement facture";
pub const CATEGORIE_REMBOURSEMENT_FACTURE: &str = "Remboursement facture";
pub const CATEGORIE_PRIME_OPS: &str = "Décaissement prime OPS";
pub const CATEGORIE_PRIME_CNV: &str = "Décaissement prime CNV";

/// Free categories offered to callers (the catalogue is advisory;
/// unknown labels are accepted as long as they are not system-owned)
pub const CATEGORIES_CAISSE: &[&str] = &[
    "Apport",
    "Autre",
    "Carburant",
    "Entretien",
    "Fournitures",
    "Loyer",
    "Salaires",
];

/// Whether a category is reserved for engine-emitted movements
pub fn is_system_category(categorie: &str) -> bool {
    matches!(
        categorie,
        CATEGORIE_PAIEMENT_FACTURE
            | CATEGORIE_REMBOURSEMENT_FACTURE
            | CATEGORIE_PRIME_OPS
            | CATEGORIE_PRIME_CNV
    )
}

/// One ledger movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MouvementCaisse {
    /// Snowflake ID
    pub mouvement_id: i64,
    pub mouvement_type: MouvementType,
    pub categorie: String,
    pub montant: f64,
    /// Idempotency key for engine-emitted movements; unique when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banque_id: Option<String>,
    pub source: SourceCaisse,
    pub date_mouvement: i64,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Caller-facing movement input (ids and references assigned by flows)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MouvementInput {
    pub mouvement_type: MouvementType,
    pub categorie: String,
    pub montant: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banque_id: Option<String>,
    #[serde(default)]
    pub source: SourceCaisse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Read-side scoping of the ledger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MouvementFilter {
    /// Inclusive lower bound (millis)
    pub depuis: Option<i64>,
    /// Inclusive upper bound (millis)
    pub jusqua: Option<i64>,
    pub source: Option<SourceCaisse>,
    pub categorie: Option<String>,
}

impl MouvementFilter {
    pub fn matches(&self, m: &MouvementCaisse) -> bool {
        if let Some(depuis) = self.depuis
            && m.date_mouvement < depuis
        {
            return false;
        }
        if let Some(jusqua) = self.jusqua
            && m.date_mouvement > jusqua
        {
            return false;
        }
        if let Some(source) = self.source
            && m.source != source
        {
            return false;
        }
        if let Some(ref categorie) = self.categorie
            && &m.categorie != categorie
        {
            return false;
        }
        true
    }
}
