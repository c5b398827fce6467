//! Monthly tax accrual
//!
//! One row per (year, month, tax type), recomputed idempotently from
//! the invoices dated in the period. Closing a month freezes both of
//! its rows: recomputation refuses until an administrator reopens it.

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::documents::money::{to_decimal, to_f64};
use crate::error::{DomainError, DomainResult};
use crate::storage::OfficeStore;
use redb::WriteTransaction;
use rust_decimal::Decimal;
use shared::document::{DocumentKind, DocumentSnapshot};
use shared::fiscal::{TaxeMensuelle, TypeTaxe};
use shared::util::{now_millis, year_month_of};
use std::sync::Arc;

pub struct FiscalManager {
    store: OfficeStore,
    audit: Arc<dyn AuditSink>,
}

impl FiscalManager {
    pub fn new(store: OfficeStore, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Recompute both tax rows of a period from the invoices dated in
    /// it, replacing any previous accumulation. Refuses on a closed
    /// period.
    pub fn recalculer_mois(
        &self,
        annee: u32,
        mois: u32,
        user_id: &str,
    ) -> DomainResult<Vec<TaxeMensuelle>> {
        valider_periode(annee, mois)?;

        let txn = self.store.begin_write()?;
        self.verifier_ouverte(&txn, annee, mois)?;
        let rows = self.recompute_in_txn(&txn, annee, mois, false)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(annee, mois, documents = rows[0].nombre_documents, "Month recalculated");
        self.audit.record(
            AuditEntry::new(AuditAction::MonthRecalculated, "taxe_mensuelle", periode_id(annee, mois))
                .with_summary(format!("Recalcul {mois:02}/{annee}"))
                .with_user(user_id),
        );
        Ok(rows)
    }

    /// Close a period: recomputes one last time, then freezes both rows
    pub fn cloturer_mois(
        &self,
        annee: u32,
        mois: u32,
        user_id: &str,
    ) -> DomainResult<Vec<TaxeMensuelle>> {
        valider_periode(annee, mois)?;

        let txn = self.store.begin_write()?;
        self.verifier_ouverte(&txn, annee, mois)?;
        let rows = self.recompute_in_txn(&txn, annee, mois, true)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(annee, mois, "Month closed");
        self.audit.record(
            AuditEntry::new(AuditAction::MonthClosed, "taxe_mensuelle", periode_id(annee, mois))
                .with_summary(format!("Clôture {mois:02}/{annee}"))
                .with_user(user_id),
        );
        Ok(rows)
    }

    /// Administrative reopen of a closed period
    pub fn rouvrir_mois(
        &self,
        annee: u32,
        mois: u32,
        user_id: &str,
    ) -> DomainResult<Vec<TaxeMensuelle>> {
        valider_periode(annee, mois)?;

        let txn = self.store.begin_write()?;
        let mut rows = Vec::new();
        for type_taxe in [TypeTaxe::Tva, TypeTaxe::Css] {
            let mut row = self
                .store
                .get_taxe_txn(&txn, annee, mois, type_taxe)?
                .ok_or_else(|| DomainError::not_found("TaxeMensuelle", periode_id(annee, mois)))?;
            row.cloture = false;
            row.updated_at = now_millis();
            self.store.store_taxe(&txn, &row)?;
            rows.push(row);
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::warn!(annee, mois, user_id, "Closed month reopened");
        self.audit.record(
            AuditEntry::new(AuditAction::MonthReopened, "taxe_mensuelle", periode_id(annee, mois))
                .with_summary(format!("Réouverture {mois:02}/{annee}"))
                .with_user(user_id),
        );
        Ok(rows)
    }

    pub fn get_taxe(
        &self,
        annee: u32,
        mois: u32,
        type_taxe: TypeTaxe,
    ) -> DomainResult<Option<TaxeMensuelle>> {
        Ok(self.store.get_taxe(annee, mois, type_taxe)?)
    }

    pub fn list_taxes(&self, annee: u32) -> DomainResult<Vec<TaxeMensuelle>> {
        Ok(self.store.list_taxes(annee)?)
    }

    fn verifier_ouverte(&self, txn: &WriteTransaction, annee: u32, mois: u32) -> DomainResult<()> {
        for type_taxe in [TypeTaxe::Tva, TypeTaxe::Css] {
            if let Some(row) = self.store.get_taxe_txn(txn, annee, mois, type_taxe)?
                && row.cloture
            {
                return Err(DomainError::PeriodClosed { annee, mois });
            }
        }
        Ok(())
    }

    fn recompute_in_txn(
        &self,
        txn: &WriteTransaction,
        annee: u32,
        mois: u32,
        cloture: bool,
    ) -> DomainResult<Vec<TaxeMensuelle>> {
        let factures: Vec<DocumentSnapshot> = self
            .store
            .list_documents_txn(txn)?
            .into_iter()
            .filter(|d| {
                d.kind() == DocumentKind::Facture
                    && !d.est_annulee()
                    && year_month_of(d.date_document) == (annee, mois)
            })
            .collect();

        let now = now_millis();
        let mut rows = Vec::new();
        for type_taxe in [TypeTaxe::Tva, TypeTaxe::Css] {
            let mut ht_total = Decimal::ZERO;
            let mut taxe_total = Decimal::ZERO;
            let mut exonere = Decimal::ZERO;
            for facture in &factures {
                let (taux, montant_taxe) = match type_taxe {
                    TypeTaxe::Tva => (facture.taux_tva, facture.montant_tva),
                    TypeTaxe::Css => (facture.taux_css, facture.montant_css),
                };
                ht_total += to_decimal(facture.montant_ht);
                taxe_total += to_decimal(montant_taxe);
                if taux == 0.0 {
                    exonere += to_decimal(facture.montant_ht);
                }
            }
            let row = TaxeMensuelle {
                annee,
                mois,
                type_taxe,
                montant_ht_total: to_f64(ht_total),
                montant_taxe_total: to_f64(taxe_total),
                montant_exonere: to_f64(exonere),
                nombre_documents: factures.len() as u32,
                cloture,
                updated_at: now,
            };
            self.store.store_taxe(txn, &row)?;
            rows.push(row);
        }
        Ok(rows)
    }
}

fn valider_periode(annee: u32, mois: u32) -> DomainResult<()> {
    if !(1..=12).contains(&mois) {
        return Err(DomainError::validation(
            "mois",
            format!("must be between 1 and 12, got {mois}"),
        ));
    }
    if !(2000..=2100).contains(&annee) {
        return Err(DomainError::validation(
            "annee",
            format!("must be between 2000 and 2100, got {annee}"),
        ));
    }
    Ok(())
}

fn periode_id(annee: u32, mois: u32) -> String {
    format!("{annee}-{mois:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullAuditSink;
    use crate::config::TauxSnapshot;
    use crate::documents::DocumentsManager;
    use shared::document::{
        DocumentHeaderInput, DocumentStatut, FactureStatut, LigneSetInput, OperationInput,
    };

    // 2025-03-10 and 2025-04-10, both 12:00 UTC
    const MARS: i64 = 1_741_608_000_000;
    const AVRIL: i64 = 1_744_286_400_000;

    fn managers() -> (DocumentsManager, FiscalManager) {
        let store = OfficeStore::open_in_memory().unwrap();
        let audit: Arc<dyn AuditSink> = Arc::new(NullAuditSink);
        (
            DocumentsManager::new(store.clone(), audit.clone()),
            FiscalManager::new(store, audit),
        )
    }

    fn facture(documents: &DocumentsManager, date: i64, ht: f64, taux_tva: f64) -> String {
        let snapshot = documents
            .create_document(
                DocumentKind::Facture,
                DocumentHeaderInput {
                    client_id: "client-1".to_string(),
                    transitaire_id: None,
                    date_document: Some(date),
                },
                LigneSetInput::Independant(vec![OperationInput {
                    type_operation: "Transport".to_string(),
                    date_debut: None,
                    date_fin: None,
                    lieu: None,
                    quantite: 1.0,
                    prix_unitaire: ht,
                }]),
                TauxSnapshot {
                    taux_tva,
                    taux_css: 1.0,
                    version: 1,
                },
                "u1",
            )
            .unwrap();
        snapshot.document_id
    }

    #[test]
    fn test_recalcul_accumulates_invoices_of_the_month() {
        let (documents, fiscal) = managers();
        facture(&documents, MARS, 1_000_000.0, 18.0);
        facture(&documents, MARS, 500_000.0, 18.0);
        facture(&documents, AVRIL, 700_000.0, 18.0); // other month

        let rows = fiscal.recalculer_mois(2025, 3, "u1").unwrap();
        let tva = rows.iter().find(|r| r.type_taxe == TypeTaxe::Tva).unwrap();
        assert_eq!(tva.montant_ht_total, 1_500_000.0);
        assert_eq!(tva.montant_taxe_total, 270_000.0);
        assert_eq!(tva.nombre_documents, 2);
        assert_eq!(tva.montant_exonere, 0.0);

        let css = rows.iter().find(|r| r.type_taxe == TypeTaxe::Css).unwrap();
        assert_eq!(css.montant_taxe_total, 15_000.0);
    }

    #[test]
    fn test_recalcul_is_idempotent_and_replaces() {
        let (documents, fiscal) = managers();
        facture(&documents, MARS, 1_000_000.0, 18.0);
        fiscal.recalculer_mois(2025, 3, "u1").unwrap();

        // New invoice lands in the month, recompute replaces the row
        facture(&documents, MARS, 500_000.0, 18.0);
        let rows = fiscal.recalculer_mois(2025, 3, "u1").unwrap();
        let tva = rows.iter().find(|r| r.type_taxe == TypeTaxe::Tva).unwrap();
        assert_eq!(tva.montant_ht_total, 1_500_000.0);
        assert_eq!(tva.nombre_documents, 2);
    }

    #[test]
    fn test_cancelled_invoices_excluded() {
        let (documents, fiscal) = managers();
        let id = facture(&documents, MARS, 1_000_000.0, 18.0);
        facture(&documents, MARS, 500_000.0, 18.0);

        documents
            .transition(&id, DocumentStatut::Facture(FactureStatut::Envoyee), "u1")
            .unwrap();
        documents.cancel_facture(&id, "Erreur", "u1").unwrap();

        let rows = fiscal.recalculer_mois(2025, 3, "u1").unwrap();
        let tva = rows.iter().find(|r| r.type_taxe == TypeTaxe::Tva).unwrap();
        assert_eq!(tva.montant_ht_total, 500_000.0);
        assert_eq!(tva.nombre_documents, 1);
    }

    #[test]
    fn test_zero_rated_invoices_count_as_exonere() {
        let (documents, fiscal) = managers();
        facture(&documents, MARS, 1_000_000.0, 0.0);
        facture(&documents, MARS, 500_000.0, 18.0);

        let rows = fiscal.recalculer_mois(2025, 3, "u1").unwrap();
        let tva = rows.iter().find(|r| r.type_taxe == TypeTaxe::Tva).unwrap();
        assert_eq!(tva.montant_ht_total, 1_500_000.0);
        assert_eq!(tva.montant_exonere, 1_000_000.0);
        assert_eq!(tva.montant_taxe_total, 90_000.0);
    }

    #[test]
    fn test_closed_month_refuses_recalcul_until_reopened() {
        let (documents, fiscal) = managers();
        facture(&documents, MARS, 1_000_000.0, 18.0);

        fiscal.cloturer_mois(2025, 3, "u1").unwrap();
        let err = fiscal.recalculer_mois(2025, 3, "u1").unwrap_err();
        assert!(matches!(err, DomainError::PeriodClosed { annee: 2025, mois: 3 }));

        // Double close is a conflict too
        let err = fiscal.cloturer_mois(2025, 3, "u1").unwrap_err();
        assert!(matches!(err, DomainError::PeriodClosed { .. }));

        // Reopen, recompute works again
        fiscal.rouvrir_mois(2025, 3, "u1").unwrap();
        fiscal.recalculer_mois(2025, 3, "u1").unwrap();
    }

    #[test]
    fn test_cloture_freezes_latest_figures() {
        let (documents, fiscal) = managers();
        facture(&documents, MARS, 1_000_000.0, 18.0);

        let rows = fiscal.cloturer_mois(2025, 3, "u1").unwrap();
        let tva = rows.iter().find(|r| r.type_taxe == TypeTaxe::Tva).unwrap();
        assert!(tva.cloture);
        assert_eq!(tva.montant_ht_total, 1_000_000.0);

        let stored = fiscal.get_taxe(2025, 3, TypeTaxe::Tva).unwrap().unwrap();
        assert!(stored.cloture);
    }

    #[test]
    fn test_invalid_period_rejected() {
        let (_, fiscal) = managers();
        assert!(fiscal.recalculer_mois(2025, 0, "u1").is_err());
        assert!(fiscal.recalculer_mois(2025, 13, "u1").is_err());
        assert!(fiscal.recalculer_mois(1990, 5, "u1").is_err());
    }

    #[test]
    fn test_rouvrir_missing_period() {
        let (_, fiscal) = managers();
        let err = fiscal.rouvrir_mois(2025, 6, "u1").unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
