//! GlobalPayment action
//!
//! Splits one announced payment across several invoices of the same
//! client. The whole batch is validated before anything is recorded and
//! applied inside one transaction: either every allocation lands or
//! none does.

use crate::documents::actions::apply_payment::{apply_to_snapshot, emit_paiement_mouvement};
use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::money::{to_decimal, validate_montant, MONEY_TOLERANCE};
use crate::error::{DomainError, DomainResult};
use rust_decimal::Decimal;
use shared::caisse::MouvementCaisse;
use shared::document::{AllocationInput, DocumentSnapshot, ModePaiement, Paiement};

#[derive(Debug, Clone)]
pub struct GlobalPaymentAction {
    pub client_id: String,
    /// Total announced by the caller; must equal the allocation sum
    pub montant_total: f64,
    pub mode: ModePaiement,
    pub banque_id: Option<String>,
    pub allocations: Vec<AllocationInput>,
}

impl GlobalPaymentAction {
    /// Returns, per allocation, the updated invoice and its payment,
    /// plus the ledger movements emitted for cash batches
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<(Vec<(DocumentSnapshot, Paiement)>, Vec<MouvementCaisse>)> {
        // 1. Static validation before touching anything
        if self.allocations.is_empty() {
            return Err(DomainError::validation(
                "allocations",
                "must contain at least one allocation",
            ));
        }
        validate_montant(self.montant_total, "montant_total")?;
        let mut somme = Decimal::ZERO;
        for allocation in &self.allocations {
            validate_montant(allocation.montant, "allocations.montant")?;
            somme += to_decimal(allocation.montant);
        }
        if (somme - to_decimal(self.montant_total)).abs() > MONEY_TOLERANCE {
            return Err(DomainError::AllocationMismatch {
                announced: self.montant_total,
                allocated: crate::documents::money::to_f64(somme),
            });
        }

        // 2. Apply sequentially against in-memory snapshots; a repeated
        //    facture_id sees the cumulative effect of earlier
        //    allocations, and any rejection aborts the whole batch
        //    (nothing commits)
        let mut loaded: Vec<DocumentSnapshot> = Vec::new();
        let mut results: Vec<(usize, Paiement)> = Vec::new();
        for allocation in &self.allocations {
            let index = match loaded
                .iter()
                .position(|d| d.document_id == allocation.facture_id)
            {
                Some(index) => index,
                None => {
                    let snapshot = ctx.load_document(&allocation.facture_id)?;
                    if snapshot.client_id != self.client_id {
                        return Err(DomainError::validation(
                            "allocations",
                            format!(
                                "facture {} does not belong to client {}",
                                snapshot.numero, self.client_id
                            ),
                        ));
                    }
                    loaded.push(snapshot);
                    loaded.len() - 1
                }
            };
            let paiement = apply_to_snapshot(
                &mut loaded[index],
                allocation.montant,
                self.mode,
                self.banque_id.clone(),
                None,
                metadata,
            )?;
            results.push((index, paiement));
        }

        // 3. Persist every touched invoice and emit cash movements
        let mut mouvements = Vec::new();
        if self.mode.is_cash() {
            for (_, paiement) in &results {
                mouvements.push(emit_paiement_mouvement(ctx, paiement, metadata)?);
            }
        }
        for snapshot in &loaded {
            ctx.store.store_document(ctx.txn, snapshot)?;
        }

        let results = results
            .into_iter()
            .map(|(index, paiement)| (loaded[index].clone(), paiement))
            .collect();
        Ok((results, mouvements))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TauxSnapshot;
    use crate::documents::actions::{CreateDocumentAction, TransitionAction};
    use crate::storage::OfficeStore;
    use shared::document::{
        DocumentHeaderInput, DocumentKind, DocumentStatut, FactureStatut, LigneSetInput,
        OperationInput,
    };

    fn meta() -> ActionMetadata {
        ActionMetadata {
            user_id: "u1".to_string(),
            timestamp: 1_735_732_800_000,
        }
    }

    /// Facture envoyée for `client` with the given HT at 18% + 1%
    fn sent_facture(store: &OfficeStore, client: &str, ht: f64) -> DocumentSnapshot {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let facture = CreateDocumentAction {
            kind: DocumentKind::Facture,
            header: DocumentHeaderInput {
                client_id: client.to_string(),
                transitaire_id: None,
                date_document: Some(1_735_732_800_000),
            },
            lignes: LigneSetInput::Independant(vec![OperationInput {
                type_operation: "Transport".to_string(),
                date_debut: None,
                date_fin: None,
                lieu: None,
                quantite: 1.0,
                prix_unitaire: ht,
            }]),
            taux: TauxSnapshot {
                taux_tva: 18.0,
                taux_css: 1.0,
                version: 1,
            },
        }
        .execute(&ctx, &meta())
        .unwrap();
        TransitionAction {
            document_id: facture.document_id.clone(),
            nouveau_statut: DocumentStatut::Facture(FactureStatut::Envoyee),
        }
        .execute(&ctx, &meta())
        .unwrap();
        txn.commit().unwrap();
        store.get_document(&facture.document_id).unwrap().unwrap()
    }

    fn run(
        store: &OfficeStore,
        action: &GlobalPaymentAction,
    ) -> DomainResult<(Vec<(DocumentSnapshot, Paiement)>, Vec<MouvementCaisse>)> {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let result = action.execute(&ctx, &meta());
        if result.is_ok() {
            txn.commit().unwrap();
        }
        result
    }

    #[test]
    fn test_batch_settles_two_invoices() {
        let store = OfficeStore::open_in_memory().unwrap();
        // TTC = 119,000 each
        let f1 = sent_facture(&store, "client-1", 100_000.0);
        let f2 = sent_facture(&store, "client-1", 100_000.0);

        let (results, mouvements) = run(
            &store,
            &GlobalPaymentAction {
                client_id: "client-1".to_string(),
                montant_total: 178_500.0,
                mode: ModePaiement::Virement,
                banque_id: Some("banque-1".to_string()),
                allocations: vec![
                    AllocationInput {
                        facture_id: f1.document_id.clone(),
                        montant: 119_000.0,
                    },
                    AllocationInput {
                        facture_id: f2.document_id.clone(),
                        montant: 59_500.0,
                    },
                ],
            },
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert!(mouvements.is_empty());
        assert_eq!(
            results[0].0.statut,
            DocumentStatut::Facture(FactureStatut::Payee)
        );
        assert_eq!(
            results[1].0.statut,
            DocumentStatut::Facture(FactureStatut::PartiellementPayee)
        );
        assert_eq!(results[1].0.reste_a_payer(), 59_500.0);
    }

    #[test]
    fn test_announced_total_must_match() {
        let store = OfficeStore::open_in_memory().unwrap();
        let f1 = sent_facture(&store, "client-1", 100_000.0);

        let err = run(
            &store,
            &GlobalPaymentAction {
                client_id: "client-1".to_string(),
                montant_total: 120_000.0,
                mode: ModePaiement::Virement,
                banque_id: None,
                allocations: vec![AllocationInput {
                    facture_id: f1.document_id.clone(),
                    montant: 119_000.0,
                }],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::AllocationMismatch { .. }));
    }

    #[test]
    fn test_one_bad_allocation_aborts_whole_batch() {
        let store = OfficeStore::open_in_memory().unwrap();
        let f1 = sent_facture(&store, "client-1", 100_000.0);
        let f2 = sent_facture(&store, "client-1", 100_000.0);

        let err = run(
            &store,
            &GlobalPaymentAction {
                client_id: "client-1".to_string(),
                montant_total: 319_000.0,
                mode: ModePaiement::Especes,
                banque_id: None,
                allocations: vec![
                    AllocationInput {
                        facture_id: f1.document_id.clone(),
                        montant: 119_000.0,
                    },
                    AllocationInput {
                        facture_id: f2.document_id.clone(),
                        montant: 200_000.0, // exceeds its reste
                    },
                ],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Overpayment { .. }));

        // No partial application
        for id in [&f1.document_id, &f2.document_id] {
            let stored = store.get_document(id).unwrap().unwrap();
            assert!(stored.paiements.is_empty());
        }
        assert!(store.list_mouvements().unwrap().is_empty());
    }

    #[test]
    fn test_foreign_invoice_rejected() {
        let store = OfficeStore::open_in_memory().unwrap();
        let f1 = sent_facture(&store, "client-1", 100_000.0);
        let other = sent_facture(&store, "client-2", 100_000.0);

        let err = run(
            &store,
            &GlobalPaymentAction {
                client_id: "client-1".to_string(),
                montant_total: 238_000.0,
                mode: ModePaiement::Virement,
                banque_id: None,
                allocations: vec![
                    AllocationInput {
                        facture_id: f1.document_id.clone(),
                        montant: 119_000.0,
                    },
                    AllocationInput {
                        facture_id: other.document_id.clone(),
                        montant: 119_000.0,
                    },
                ],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_repeated_invoice_sees_cumulative_reste() {
        let store = OfficeStore::open_in_memory().unwrap();
        let f1 = sent_facture(&store, "client-1", 100_000.0); // TTC 119,000

        // Two allocations to the same invoice exceeding its TTC together
        let err = run(
            &store,
            &GlobalPaymentAction {
                client_id: "client-1".to_string(),
                montant_total: 130_000.0,
                mode: ModePaiement::Virement,
                banque_id: None,
                allocations: vec![
                    AllocationInput {
                        facture_id: f1.document_id.clone(),
                        montant: 100_000.0,
                    },
                    AllocationInput {
                        facture_id: f1.document_id.clone(),
                        montant: 30_000.0,
                    },
                ],
            },
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Overpayment { .. }));
    }

    #[test]
    fn test_cash_batch_emits_one_mouvement_per_allocation() {
        let store = OfficeStore::open_in_memory().unwrap();
        let f1 = sent_facture(&store, "client-1", 100_000.0);
        let f2 = sent_facture(&store, "client-1", 50_000.0);

        let (_, mouvements) = run(
            &store,
            &GlobalPaymentAction {
                client_id: "client-1".to_string(),
                montant_total: 100_000.0,
                mode: ModePaiement::Especes,
                banque_id: None,
                allocations: vec![
                    AllocationInput {
                        facture_id: f1.document_id.clone(),
                        montant: 60_000.0,
                    },
                    AllocationInput {
                        facture_id: f2.document_id.clone(),
                        montant: 40_000.0,
                    },
                ],
            },
        )
        .unwrap();
        assert_eq!(mouvements.len(), 2);
        assert_eq!(store.list_mouvements().unwrap().len(), 2);
    }
}
