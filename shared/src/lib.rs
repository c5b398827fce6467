//! Shared domain types for the transit back-office
//!
//! Serde types exchanged between the core engine and its consumers
//! (HTTP layer, exports, UI): commercial documents and their line items,
//! payments, cash movements, bank credits, monthly tax rows and external
//! prime records, plus id/time utilities.

pub mod caisse;
pub mod credit;
pub mod document;
pub mod fiscal;
pub mod prime;
pub mod util;

// Re-exports
pub use caisse::{MouvementCaisse, MouvementFilter, MouvementType, SourceCaisse};
pub use credit::{CreditBancaire, CreditStatut, EcheanceCredit, RemboursementCredit};
pub use document::{
    Annulation, DocumentKind, DocumentSnapshot, DocumentStatut, LigneSet, ModePaiement, Paiement,
    TypeDocument,
};
pub use fiscal::{TaxeMensuelle, TypeTaxe};
pub use prime::{ExternalPrime, PrimeSystem, prime_reference};
pub use serde::{Deserialize, Serialize};
