//! ApplyPayment action
//!
//! Records one payment against one invoice, recomputes the invoice
//! status from the cumulative paid amount and, for cash payments,
//! emits the matching ledger entry in the same transaction.

use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::money::{
    is_settled, reste_a_payer, sum_paiements, to_decimal, validate_montant, MONEY_TOLERANCE,
};
use crate::documents::statuts::paiement_autorise;
use crate::error::{DomainError, DomainResult};
use rust_decimal::Decimal;
use shared::caisse::{MouvementCaisse, MouvementType, SourceCaisse, CATEGORIE_PAIEMENT_FACTURE};
use shared::document::{
    DocumentSnapshot, DocumentStatut, FactureStatut, ModePaiement, Paiement,
};
use shared::util::snowflake_id;

#[derive(Debug, Clone)]
pub struct ApplyPaymentAction {
    pub facture_id: String,
    pub montant: f64,
    pub mode: ModePaiement,
    pub banque_id: Option<String>,
    pub reference: Option<String>,
}

impl ApplyPaymentAction {
    /// Returns the updated invoice, the recorded payment and the ledger
    /// movement emitted for cash payments
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<(DocumentSnapshot, Paiement, Option<MouvementCaisse>)> {
        let mut snapshot = ctx.load_document(&self.facture_id)?;

        let paiement = apply_to_snapshot(
            &mut snapshot,
            self.montant,
            self.mode,
            self.banque_id.clone(),
            self.reference.clone(),
            metadata,
        )?;

        let mouvement = if self.mode.is_cash() {
            Some(emit_paiement_mouvement(ctx, &paiement, metadata)?)
        } else {
            None
        };

        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok((snapshot, paiement, mouvement))
    }
}

/// Validate and record a payment on a loaded invoice snapshot, then
/// recompute its status. Shared by single and grouped payments.
pub(crate) fn apply_to_snapshot(
    snapshot: &mut DocumentSnapshot,
    montant: f64,
    mode: ModePaiement,
    banque_id: Option<String>,
    reference: Option<String>,
    metadata: &ActionMetadata,
) -> DomainResult<Paiement> {
    // 1. Status gate: cancelled and draft invoices take no payments;
    //    a settled one rejects any positive amount with reste = 0
    match snapshot.statut {
        DocumentStatut::Facture(FactureStatut::Annulee) => {
            return Err(DomainError::AlreadyCancelled {
                numero: snapshot.numero.clone(),
            });
        }
        DocumentStatut::Facture(FactureStatut::Brouillon) => {
            return Err(DomainError::DocumentLocked {
                numero: snapshot.numero.clone(),
                statut: snapshot.statut.label().to_string(),
            });
        }
        DocumentStatut::Facture(FactureStatut::Payee) => {
            return Err(DomainError::Overpayment {
                reste_a_payer: crate::documents::money::to_f64(reste_a_payer(snapshot)),
            });
        }
        DocumentStatut::Facture(_) => {}
        _ => {
            return Err(DomainError::validation(
                "facture_id",
                format!("{} is not a facture", snapshot.numero),
            ));
        }
    }
    debug_assert!(paiement_autorise(snapshot.statut));

    // 2. Amount checks
    validate_montant(montant, "montant")?;
    let reste = reste_a_payer(snapshot);
    if to_decimal(montant) > reste + MONEY_TOLERANCE {
        return Err(DomainError::Overpayment {
            reste_a_payer: crate::documents::money::to_f64(reste),
        });
    }

    // 3. Record the payment
    let paiement = Paiement {
        paiement_id: uuid::Uuid::new_v4().to_string(),
        montant,
        mode,
        banque_id,
        reference,
        date_paiement: metadata.timestamp,
        user_id: metadata.user_id.clone(),
    };
    snapshot.paiements.push(paiement.clone());

    // 4. Recompute the invoice status from the cumulative amount
    recompute_statut(snapshot);
    snapshot.updated_at = metadata.timestamp;
    Ok(paiement)
}

/// Status from cumulative payments: Payée when settled, Partiellement
/// payée when anything was received, Envoyée otherwise
pub(crate) fn recompute_statut(snapshot: &mut DocumentSnapshot) {
    if snapshot.est_annulee() {
        return;
    }
    let paye = sum_paiements(&snapshot.paiements);
    let statut = if is_settled(paye, to_decimal(snapshot.montant_ttc)) && paye > Decimal::ZERO {
        FactureStatut::Payee
    } else if paye > Decimal::ZERO {
        FactureStatut::PartiellementPayee
    } else {
        FactureStatut::Envoyee
    };
    snapshot.statut = DocumentStatut::Facture(statut);
}

/// Ledger entry mirroring a cash payment; reference `PAY-{paiement_id}`
/// links the two so deleting the payment can find and remove it
pub(crate) fn emit_paiement_mouvement(
    ctx: &ActionContext<'_>,
    paiement: &Paiement,
    metadata: &ActionMetadata,
) -> DomainResult<MouvementCaisse> {
    let mouvement = MouvementCaisse {
        mouvement_id: snowflake_id(),
        mouvement_type: MouvementType::Entree,
        categorie: CATEGORIE_PAIEMENT_FACTURE.to_string(),
        montant: paiement.montant,
        reference: Some(paiement_reference(&paiement.paiement_id)),
        banque_id: paiement.banque_id.clone(),
        source: SourceCaisse::Caisse,
        date_mouvement: metadata.timestamp,
        user_id: metadata.user_id.clone(),
        note: None,
    };
    let reference = mouvement.reference.as_deref().unwrap_or_default();
    if !ctx
        .store
        .claim_reference(ctx.txn, reference, mouvement.mouvement_id)?
    {
        // Payment ids are fresh uuids; a taken reference means replay
        return Err(DomainError::AlreadyDecaisse {
            reference: reference.to_string(),
        });
    }
    ctx.store.store_mouvement(ctx.txn, &mouvement)?;
    Ok(mouvement)
}

/// Ledger reference of the movement mirroring a payment
pub fn paiement_reference(paiement_id: &str) -> String {
    format!("PAY-{paiement_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TauxSnapshot;
    use crate::documents::actions::{CreateDocumentAction, TransitionAction};
    use crate::storage::OfficeStore;
    use shared::document::{
        DocumentHeaderInput, DocumentKind, LigneSetInput, OperationInput,
    };

    fn meta() -> ActionMetadata {
        ActionMetadata {
            user_id: "u1".to_string(),
            timestamp: 1_735_732_800_000,
        }
    }

    /// Facture envoyée with TTC 1,190,000 (2 × 500,000 at 18% + 1%)
    fn create_sent_facture(store: &OfficeStore) -> DocumentSnapshot {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let facture = CreateDocumentAction {
            kind: DocumentKind::Facture,
            header: DocumentHeaderInput {
                client_id: "client-1".to_string(),
                transitaire_id: None,
                date_document: Some(1_735_732_800_000),
            },
            lignes: LigneSetInput::Independant(vec![OperationInput {
                type_operation: "Transport".to_string(),
                date_debut: None,
                date_fin: None,
                lieu: None,
                quantite: 2.0,
                prix_unitaire: 500_000.0,
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

    fn pay(
        store: &OfficeStore,
        facture_id: &str,
        montant: f64,
        mode: ModePaiement,
    ) -> DomainResult<(DocumentSnapshot, Paiement, Option<MouvementCaisse>)> {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let result = ApplyPaymentAction {
            facture_id: facture_id.to_string(),
            montant,
            mode,
            banque_id: None,
            reference: None,
        }
        .execute(&ctx, &meta());
        if result.is_ok() {
            txn.commit().unwrap();
        }
        result
    }

    #[test]
    fn test_payment_walk_to_settlement() {
        let store = OfficeStore::open_in_memory().unwrap();
        let facture = create_sent_facture(&store);
        assert_eq!(facture.montant_ttc, 1_190_000.0);

        let (s, _, _) = pay(&store, &facture.document_id, 500_000.0, ModePaiement::Virement).unwrap();
        assert_eq!(s.statut, DocumentStatut::Facture(FactureStatut::PartiellementPayee));
        assert_eq!(s.reste_a_payer(), 690_000.0);

        let (s, _, _) = pay(&store, &facture.document_id, 690_000.0, ModePaiement::Virement).unwrap();
        assert_eq!(s.statut, DocumentStatut::Facture(FactureStatut::Payee));
        assert_eq!(s.reste_a_payer(), 0.0);

        // A third payment of any positive amount is rejected, reste = 0
        let err = pay(&store, &facture.document_id, 1.0, ModePaiement::Virement).unwrap_err();
        match err {
            DomainError::Overpayment { reste_a_payer } => assert_eq!(reste_a_payer, 0.0),
            other => panic!("Expected Overpayment, got {other:?}"),
        }
    }

    #[test]
    fn test_overpayment_carries_reste() {
        let store = OfficeStore::open_in_memory().unwrap();
        let facture = create_sent_facture(&store);

        pay(&store, &facture.document_id, 1_000_000.0, ModePaiement::Cheque).unwrap();
        let err = pay(&store, &facture.document_id, 200_000.0, ModePaiement::Cheque).unwrap_err();
        match err {
            DomainError::Overpayment { reste_a_payer } => assert_eq!(reste_a_payer, 190_000.0),
            other => panic!("Expected Overpayment, got {other:?}"),
        }

        // The failed attempt persisted nothing
        let stored = store.get_document(&facture.document_id).unwrap().unwrap();
        assert_eq!(stored.paiements.len(), 1);
    }

    #[test]
    fn test_cash_payment_emits_linked_mouvement() {
        let store = OfficeStore::open_in_memory().unwrap();
        let facture = create_sent_facture(&store);

        let (_, paiement, mouvement) =
            pay(&store, &facture.document_id, 90_000.0, ModePaiement::Especes).unwrap();
        let mouvement = mouvement.expect("cash payment must emit a movement");

        assert_eq!(mouvement.mouvement_type, MouvementType::Entree);
        assert_eq!(mouvement.categorie, CATEGORIE_PAIEMENT_FACTURE);
        assert_eq!(mouvement.montant, 90_000.0);
        assert_eq!(
            mouvement.reference.as_deref(),
            Some(paiement_reference(&paiement.paiement_id).as_str())
        );
        assert_eq!(
            store
                .reference_lookup(&paiement_reference(&paiement.paiement_id))
                .unwrap(),
            Some(mouvement.mouvement_id)
        );
    }

    #[test]
    fn test_non_cash_payment_emits_no_mouvement() {
        let store = OfficeStore::open_in_memory().unwrap();
        let facture = create_sent_facture(&store);

        let (_, _, mouvement) =
            pay(&store, &facture.document_id, 90_000.0, ModePaiement::Virement).unwrap();
        assert!(mouvement.is_none());
        assert!(store.list_mouvements().unwrap().is_empty());
    }

    #[test]
    fn test_payment_on_draft_rejected() {
        let store = OfficeStore::open_in_memory().unwrap();
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store: &store };
        let facture = CreateDocumentAction {
            kind: DocumentKind::Facture,
            header: DocumentHeaderInput {
                client_id: "client-1".to_string(),
                transitaire_id: None,
                date_document: Some(1_735_732_800_000),
            },
            lignes: LigneSetInput::Independant(vec![OperationInput {
                type_operation: "Transport".to_string(),
                date_debut: None,
                date_fin: None,
                lieu: None,
                quantite: 1.0,
                prix_unitaire: 100.0,
            }]),
            taux: TauxSnapshot {
                taux_tva: 18.0,
                taux_css: 1.0,
                version: 1,
            },
        }
        .execute(&ctx, &meta())
        .unwrap();
        txn.commit().unwrap();

        let err = pay(&store, &facture.document_id, 50.0, ModePaiement::Especes).unwrap_err();
        assert!(matches!(err, DomainError::DocumentLocked { .. }));
    }

    #[test]
    fn test_invalid_amounts_rejected() {
        let store = OfficeStore::open_in_memory().unwrap();
        let facture = create_sent_facture(&store);

        for montant in [0.0, -10.0, f64::NAN] {
            let err = pay(&store, &facture.document_id, montant, ModePaiement::Especes).unwrap_err();
            assert!(matches!(err, DomainError::Validation { .. }), "montant={montant}");
        }
    }
}
