//! Commercial document aggregates: Devis, OrdreTravail, Facture
//!
//! A document snapshot carries its full line-item tree, its tax-rate
//! snapshot and (for invoices) its embedded payments and cancellation
//! record. Totals are derived by the engine and never hand-edited.

use serde::{Deserialize, Serialize};

// ============================================================================
// Document kind and line-item shape
// ============================================================================

/// Lifecycle stage of a commercial document
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Devis,
    OrdreTravail,
    Facture,
}

impl DocumentKind {
    /// Numbering prefix for this kind (`DEV-2025-0001`, ...)
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::Devis => "DEV",
            DocumentKind::OrdreTravail => "OT",
            DocumentKind::Facture => "FAC",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Devis => "Devis",
            DocumentKind::OrdreTravail => "Ordre de travail",
            DocumentKind::Facture => "Facture",
        }
    }
}

/// Billing shape of a document, dictating its line-item tree
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeDocument {
    /// Per-container billing: containers owning their own operations
    Conteneur,
    /// Bulk-cargo billing: weighed/measured lots
    Lot,
    /// Flat operation lines, no grouping
    #[default]
    Independant,
}

// ============================================================================
// Statuses
// ============================================================================

/// Devis status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DevisStatut {
    #[default]
    Brouillon,
    Envoye,
    Accepte,
    Refuse,
    Expire,
    Converti,
    Annule,
}

/// OrdreTravail status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrdreStatut {
    #[default]
    EnAttente,
    EnCours,
    Termine,
    Facture,
    Annule,
}

/// Facture status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FactureStatut {
    #[default]
    Brouillon,
    Envoyee,
    PartiellementPayee,
    Payee,
    Annulee,
}

/// Per-variant document status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "statut", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatut {
    Devis(DevisStatut),
    OrdreTravail(OrdreStatut),
    Facture(FactureStatut),
}

impl DocumentStatut {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentStatut::Devis(_) => DocumentKind::Devis,
            DocumentStatut::OrdreTravail(_) => DocumentKind::OrdreTravail,
            DocumentStatut::Facture(_) => DocumentKind::Facture,
        }
    }

    /// Terminal statuses admit no further mutation of any sort
    pub fn is_terminal(&self) -> bool {
        match self {
            DocumentStatut::Devis(s) => matches!(
                s,
                DevisStatut::Converti | DevisStatut::Annule | DevisStatut::Refuse | DevisStatut::Expire
            ),
            DocumentStatut::OrdreTravail(s) => {
                matches!(s, OrdreStatut::Facture | OrdreStatut::Annule)
            }
            DocumentStatut::Facture(s) => {
                matches!(s, FactureStatut::Payee | FactureStatut::Annulee)
            }
        }
    }

    /// Whether line items may still be replaced in this status
    pub fn lignes_modifiables(&self) -> bool {
        match self {
            DocumentStatut::Devis(s) => matches!(s, DevisStatut::Brouillon),
            DocumentStatut::OrdreTravail(s) => {
                matches!(s, OrdreStatut::EnAttente | OrdreStatut::EnCours)
            }
            DocumentStatut::Facture(s) => !matches!(s, FactureStatut::Payee | FactureStatut::Annulee),
        }
    }

    /// Human-readable status label (French, as printed on documents)
    pub fn label(&self) -> &'static str {
        match self {
            DocumentStatut::Devis(s) => match s {
                DevisStatut::Brouillon => "Brouillon",
                DevisStatut::Envoye => "Envoyé",
                DevisStatut::Accepte => "Accepté",
                DevisStatut::Refuse => "Refusé",
                DevisStatut::Expire => "Expiré",
                DevisStatut::Converti => "Converti",
                DevisStatut::Annule => "Annulé",
            },
            DocumentStatut::OrdreTravail(s) => match s {
                OrdreStatut::EnAttente => "En attente",
                OrdreStatut::EnCours => "En cours",
                OrdreStatut::Termine => "Terminé",
                OrdreStatut::Facture => "Facturé",
                OrdreStatut::Annule => "Annulé",
            },
            DocumentStatut::Facture(s) => match s {
                FactureStatut::Brouillon => "Brouillon",
                FactureStatut::Envoyee => "Envoyée",
                FactureStatut::PartiellementPayee => "Partiellement payée",
                FactureStatut::Payee => "Payée",
                FactureStatut::Annulee => "Annulée",
            },
        }
    }
}

// ============================================================================
// Line items
// ============================================================================

/// Flat operation line (also the leaf of a container group)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LigneOperation {
    /// Line ID (assigned by the engine)
    pub ligne_id: String,
    /// Operation kind (free catalogue: "Transport", "Manutention", ...)
    pub type_operation: String,
    /// Operation start date (millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_debut: Option<i64>,
    /// Operation end date (millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<i64>,
    /// Place of execution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lieu: Option<String>,
    pub quantite: f64,
    pub prix_unitaire: f64,
    /// Derived: quantite × prix_unitaire, rounded to 2 dp
    pub montant_ht: f64,
}

/// Container group owning its own operation lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConteneurGroup {
    pub conteneur_id: String,
    /// Container number as painted (e.g. MSKU1234567)
    pub numero_conteneur: String,
    /// Container type (DRY, REEFER, OPEN TOP, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_conteneur: Option<String>,
    /// Size in feet (20/40/45)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
    /// Shipping-line reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armateur_id: Option<String>,
    pub operations: Vec<LigneOperation>,
}

/// Bulk-cargo lot line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LotItem {
    pub lot_id: String,
    pub designation: String,
    pub quantite: f64,
    /// Weight in kg
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poids: Option<f64>,
    /// Volume in m³
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub prix_unitaire: f64,
    /// Derived: quantite × prix_unitaire, rounded to 2 dp
    pub montant_ht: f64,
}

/// Line-item tree of a document, shaped by its `TypeDocument`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", content = "items", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LigneSet {
    Independant(Vec<LigneOperation>),
    Conteneur(Vec<ConteneurGroup>),
    Lot(Vec<LotItem>),
}

impl LigneSet {
    pub fn type_document(&self) -> TypeDocument {
        match self {
            LigneSet::Independant(_) => TypeDocument::Independant,
            LigneSet::Conteneur(_) => TypeDocument::Conteneur,
            LigneSet::Lot(_) => TypeDocument::Lot,
        }
    }

    /// Number of billable leaf items (operations and lots; container
    /// headers themselves carry no amount)
    pub fn leaf_count(&self) -> usize {
        match self {
            LigneSet::Independant(lignes) => lignes.len(),
            LigneSet::Conteneur(groups) => groups.iter().map(|g| g.operations.len()).sum(),
            LigneSet::Lot(lots) => lots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count() == 0
    }

    /// Iterate the montant_ht of every billable leaf
    pub fn leaf_amounts(&self) -> Vec<f64> {
        match self {
            LigneSet::Independant(lignes) => lignes.iter().map(|l| l.montant_ht).collect(),
            LigneSet::Conteneur(groups) => groups
                .iter()
                .flat_map(|g| g.operations.iter().map(|o| o.montant_ht))
                .collect(),
            LigneSet::Lot(lots) => lots.iter().map(|l| l.montant_ht).collect(),
        }
    }
}

// ============================================================================
// Payments and cancellation
// ============================================================================

/// Payment mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModePaiement {
    Especes,
    Cheque,
    Virement,
    MobileMoney,
}

impl ModePaiement {
    /// Cash-equivalent modes feed the cash ledger on payment
    pub fn is_cash(&self) -> bool {
        matches!(self, ModePaiement::Especes)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ModePaiement::Especes => "Espèces",
            ModePaiement::Cheque => "Chèque",
            ModePaiement::Virement => "Virement",
            ModePaiement::MobileMoney => "Mobile Money",
        }
    }
}

/// Payment applied to one Facture (embedded in its snapshot)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Paiement {
    pub paiement_id: String,
    pub montant: f64,
    pub mode: ModePaiement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banque_id: Option<String>,
    /// Free reference (cheque number, transfer reference)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub date_paiement: i64,
    pub user_id: String,
}

/// Cancellation record (at most one per Facture)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annulation {
    pub motif: String,
    pub user_id: String,
    pub date_annulation: i64,
    /// Cumulated refunds issued since cancellation
    #[serde(default)]
    pub montant_rembourse: f64,
}

// ============================================================================
// Document snapshot
// ============================================================================

/// Full state of a commercial document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSnapshot {
    /// Document ID (assigned by the engine)
    pub document_id: String,
    /// Unique number: `{PREFIX}-{YEAR}-{4-digit-seq}`
    pub numero: String,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitaire_id: Option<String>,
    pub type_document: TypeDocument,
    /// Document date (millis)
    pub date_document: i64,
    pub statut: DocumentStatut,
    /// TVA rate in percent, snapshotted at creation, immutable afterward
    pub taux_tva: f64,
    /// CSS rate in percent, snapshotted at creation, immutable afterward
    pub taux_css: f64,
    /// Version of the rate configuration the snapshot was taken from
    #[serde(default)]
    pub taux_version: u32,
    pub lignes: LigneSet,
    /// Derived totals — recomputed by the engine, never hand-edited
    pub montant_ht: f64,
    pub montant_tva: f64,
    pub montant_css: f64,
    pub montant_ttc: f64,
    /// Payments received (Facture only; empty for other kinds)
    #[serde(default)]
    pub paiements: Vec<Paiement>,
    /// Cancellation record (Facture only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annulation: Option<Annulation>,
    /// Conversion links
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converti_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converti_de: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl DocumentSnapshot {
    pub fn kind(&self) -> DocumentKind {
        self.statut.kind()
    }

    /// Sum of recorded payments (plain sum; the engine recomputes
    /// with decimal precision where it matters)
    pub fn montant_paye(&self) -> f64 {
        self.paiements.iter().map(|p| p.montant).sum()
    }

    /// Outstanding amount, clamped at zero
    pub fn reste_a_payer(&self) -> f64 {
        (self.montant_ttc - self.montant_paye()).max(0.0)
    }

    pub fn est_annulee(&self) -> bool {
        matches!(self.statut, DocumentStatut::Facture(FactureStatut::Annulee))
    }
}

// ============================================================================
// Creation inputs (ids and derived amounts are assigned by the engine)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationInput {
    pub type_operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_debut: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lieu: Option<String>,
    pub quantite: f64,
    pub prix_unitaire: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConteneurInput {
    pub numero_conteneur: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_conteneur: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taille: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub armateur_id: Option<String>,
    pub operations: Vec<OperationInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LotInput {
    pub designation: String,
    pub quantite: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poids: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    pub prix_unitaire: f64,
}

/// Line-item input tree, mirroring [`LigneSet`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", content = "items", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LigneSetInput {
    Independant(Vec<OperationInput>),
    Conteneur(Vec<ConteneurInput>),
    Lot(Vec<LotInput>),
}

impl LigneSetInput {
    pub fn type_document(&self) -> TypeDocument {
        match self {
            LigneSetInput::Independant(_) => TypeDocument::Independant,
            LigneSetInput::Conteneur(_) => TypeDocument::Conteneur,
            LigneSetInput::Lot(_) => TypeDocument::Lot,
        }
    }
}

/// Document creation header
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentHeaderInput {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transitaire_id: Option<String>,
    /// Document date (millis); defaults to now when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_document: Option<i64>,
}

/// One allocation of a grouped (multi-invoice) payment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationInput {
    pub facture_id: String,
    pub montant: f64,
}
