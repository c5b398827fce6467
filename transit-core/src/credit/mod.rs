//! Bank credit amortization
//!
//! Simple interest over the loan term: intérêts = principal × taux/100
//! × (durée/12). The schedule carries `durée` equal installments
//! rounded to 2 decimal places; the final installment absorbs the
//! rounding remainder so the schedule sums exactly to montant_total.

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::documents::money::{
    round_money, to_decimal, to_f64, validate_montant, validate_taux, MONEY_TOLERANCE,
};
use crate::error::{DomainError, DomainResult};
use crate::storage::OfficeStore;
use chrono::Months;
use rust_decimal::Decimal;
use shared::credit::{
    CreditBancaire, CreditStatut, EcheanceCredit, EcheanceStatut, RemboursementCredit,
};
use shared::util::now_millis;
use std::sync::Arc;

pub struct CreditManager {
    store: OfficeStore,
    audit: Arc<dyn AuditSink>,
}

/// Creation input for a bank credit
#[derive(Debug, Clone)]
pub struct CreditInput {
    pub libelle: String,
    pub banque_id: Option<String>,
    pub montant_principal: f64,
    /// Annual interest rate in percent
    pub taux_interet: f64,
    pub duree_mois: u32,
    pub date_debut: i64,
}

impl CreditManager {
    pub fn new(store: OfficeStore, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn create_credit(&self, input: CreditInput, user_id: &str) -> DomainResult<CreditBancaire> {
        if input.libelle.trim().is_empty() {
            return Err(DomainError::validation("libelle", "must not be empty"));
        }
        validate_montant(input.montant_principal, "montant_principal")?;
        validate_taux(input.taux_interet, "taux_interet")?;
        if input.duree_mois == 0 || input.duree_mois > 360 {
            return Err(DomainError::validation(
                "duree_mois",
                format!("must be between 1 and 360, got {}", input.duree_mois),
            ));
        }

        // intérêts = principal × taux/100 × (durée/12)
        let principal = to_decimal(input.montant_principal);
        let interet = round_money(
            principal * to_decimal(input.taux_interet) / Decimal::ONE_HUNDRED
                * Decimal::from(input.duree_mois)
                / Decimal::from(12u32),
        );
        let total = round_money(principal) + interet;

        let now = now_millis();
        let credit = CreditBancaire {
            credit_id: uuid::Uuid::new_v4().to_string(),
            libelle: input.libelle.trim().to_string(),
            banque_id: input.banque_id,
            montant_principal: input.montant_principal,
            taux_interet: input.taux_interet,
            duree_mois: input.duree_mois,
            montant_interet: to_f64(interet),
            montant_total: to_f64(total),
            date_debut: input.date_debut,
            statut: CreditStatut::Actif,
            echeances: build_schedule(total, input.duree_mois, input.date_debut),
            remboursements: vec![],
            created_at: now,
            updated_at: now,
        };

        let txn = self.store.begin_write()?;
        self.store.store_credit(&txn, &credit)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            credit_id = %credit.credit_id,
            montant_total = credit.montant_total,
            duree_mois = credit.duree_mois,
            "Credit created"
        );
        self.audit.record(
            AuditEntry::new(AuditAction::CreditCreated, "credit", &credit.credit_id)
                .with_summary(format!(
                    "Crédit {} — total {:.2} sur {} mois",
                    credit.libelle, credit.montant_total, credit.duree_mois
                ))
                .with_user(user_id),
        );
        Ok(credit)
    }

    /// Record a reimbursement; optionally settles a designated
    /// installment. The credit flips to Soldé exactly when the
    /// cumulative reimbursed amount reaches montant_total.
    pub fn rembourser(
        &self,
        credit_id: &str,
        montant: f64,
        numero_echeance: Option<u32>,
        user_id: &str,
    ) -> DomainResult<CreditBancaire> {
        validate_montant(montant, "montant")?;

        let txn = self.store.begin_write()?;
        let mut credit = self
            .store
            .get_credit_txn(&txn, credit_id)?
            .ok_or_else(|| DomainError::not_found("Credit", credit_id))?;

        if credit.statut == CreditStatut::Solde {
            return Err(DomainError::RefundExceedsPaid { remboursable: 0.0 });
        }

        let rembourse: Decimal = credit
            .remboursements
            .iter()
            .map(|r| to_decimal(r.montant))
            .sum();
        let reste = to_decimal(credit.montant_total) - rembourse;
        if to_decimal(montant) > reste + MONEY_TOLERANCE {
            return Err(DomainError::RefundExceedsPaid {
                remboursable: to_f64(reste),
            });
        }

        if let Some(numero) = numero_echeance {
            let echeance = credit
                .echeances
                .iter_mut()
                .find(|e| e.numero_echeance == numero)
                .ok_or_else(|| DomainError::not_found("Echeance", numero.to_string()))?;
            echeance.statut = EcheanceStatut::Payee;
        }

        let now = now_millis();
        credit.remboursements.push(RemboursementCredit {
            remboursement_id: uuid::Uuid::new_v4().to_string(),
            montant,
            date_remboursement: now,
            numero_echeance,
            user_id: user_id.to_string(),
        });
        if rembourse + to_decimal(montant) >= to_decimal(credit.montant_total) - MONEY_TOLERANCE {
            credit.statut = CreditStatut::Solde;
        }
        credit.updated_at = now;

        self.store.store_credit(&txn, &credit)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.audit.record(
            AuditEntry::new(AuditAction::CreditReimbursed, "credit", credit_id)
                .with_summary(format!(
                    "Remboursement {montant:.2} sur {} — statut {:?}",
                    credit.libelle, credit.statut
                ))
                .with_user(user_id),
        );
        Ok(credit)
    }

    /// Flag a credit in default (administrative decision)
    pub fn marquer_en_defaut(&self, credit_id: &str, user_id: &str) -> DomainResult<CreditBancaire> {
        let txn = self.store.begin_write()?;
        let mut credit = self
            .store
            .get_credit_txn(&txn, credit_id)?
            .ok_or_else(|| DomainError::not_found("Credit", credit_id))?;
        if credit.statut == CreditStatut::Solde {
            return Err(DomainError::DocumentLocked {
                numero: credit.libelle.clone(),
                statut: "Soldé".to_string(),
            });
        }
        credit.statut = CreditStatut::EnDefaut;
        credit.updated_at = now_millis();
        self.store.store_credit(&txn, &credit)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::warn!(credit_id = %credit_id, user_id, "Credit flagged in default");
        Ok(credit)
    }

    pub fn get_credit(&self, credit_id: &str) -> DomainResult<Option<CreditBancaire>> {
        Ok(self.store.get_credit(credit_id)?)
    }

    pub fn list_credits(&self) -> DomainResult<Vec<CreditBancaire>> {
        Ok(self.store.list_credits()?)
    }
}

/// Equal installments (total/durée rounded to 2 dp) at monthly
/// intervals; the final one absorbs the rounding remainder
fn build_schedule(total: Decimal, duree_mois: u32, date_debut: i64) -> Vec<EcheanceCredit> {
    let installment = round_money(total / Decimal::from(duree_mois));
    let start = chrono::DateTime::from_timestamp_millis(date_debut).unwrap_or_default();

    (1..=duree_mois)
        .map(|numero| {
            let montant = if numero == duree_mois {
                total - installment * Decimal::from(duree_mois - 1)
            } else {
                installment
            };
            let date_echeance = start
                .checked_add_months(Months::new(numero))
                .map(|d| d.timestamp_millis())
                .unwrap_or(date_debut);
            EcheanceCredit {
                numero_echeance: numero,
                date_echeance,
                montant: to_f64(montant),
                statut: EcheanceStatut::EnAttente,
            }
        })
        .collect()
}
