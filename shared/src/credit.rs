//! Bank credits and their amortization schedule

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditStatut {
    #[default]
    Actif,
    Solde,
    EnDefaut,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EcheanceStatut {
    #[default]
    EnAttente,
    Payee,
}

/// One scheduled installment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EcheanceCredit {
    /// 1-based installment number
    pub numero_echeance: u32,
    pub date_echeance: i64,
    pub montant: f64,
    pub statut: EcheanceStatut,
}

/// One reimbursement against the credit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemboursementCredit {
    pub remboursement_id: String,
    pub montant: f64,
    pub date_remboursement: i64,
    /// Installment this reimbursement settles, when designated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numero_echeance: Option<u32>,
    pub user_id: String,
}

/// Bank credit with its embedded schedule and reimbursements
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditBancaire {
    pub credit_id: String,
    pub libelle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub banque_id: Option<String>,
    pub montant_principal: f64,
    /// Annual interest rate in percent
    pub taux_interet: f64,
    pub duree_mois: u32,
    /// Derived: principal × taux/100 × (durée/12)
    pub montant_interet: f64,
    /// Derived: principal + intérêts
    pub montant_total: f64,
    pub date_debut: i64,
    pub statut: CreditStatut,
    pub echeances: Vec<EcheanceCredit>,
    pub remboursements: Vec<RemboursementCredit>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl CreditBancaire {
    /// Sum of recorded reimbursements (plain sum; the engine recomputes
    /// with decimal precision where it matters)
    pub fn montant_rembourse(&self) -> f64 {
        self.remboursements.iter().map(|r| r.montant).sum()
    }

    /// Outstanding amount, clamped at zero
    pub fn reste_a_rembourser(&self) -> f64 {
        (self.montant_total - self.montant_rembourse()).max(0.0)
    }

    pub fn est_solde(&self) -> bool {
        self.statut == CreditStatut::Solde
    }
}
