//! Monthly tax accrual rows

use serde::{Deserialize, Serialize};

/// Accrued tax kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeTaxe {
    Tva,
    Css,
}

impl TypeTaxe {
    pub fn code(&self) -> &'static str {
        match self {
            TypeTaxe::Tva => "TVA",
            TypeTaxe::Css => "CSS",
        }
    }
}

/// Per-(year, month, tax-type) accumulation, recomputed from invoices
/// and frozen once the period is closed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxeMensuelle {
    pub annee: u32,
    /// 1-12
    pub mois: u32,
    pub type_taxe: TypeTaxe,
    pub montant_ht_total: f64,
    pub montant_taxe_total: f64,
    /// HT total of zero-rated invoices in the period
    pub montant_exonere: f64,
    pub nombre_documents: u32,
    /// Once true, the period refuses recomputation until reopened
    #[serde(default)]
    pub cloture: bool,
    pub updated_at: i64,
}
