//! ReplaceLignes action
//!
//! Replaces a document's whole line-item set while it is still in a
//! mutable status, then recomputes totals with the rates snapshotted at
//! creation. The stored set is swapped atomically with the new one.

use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::money::recalculate_totals;
use crate::documents::reducer::input_to_lignes;
use crate::error::{DomainError, DomainResult};
use shared::document::{DocumentSnapshot, LigneSetInput};

#[derive(Debug, Clone)]
pub struct ReplaceLignesAction {
    pub document_id: String,
    pub lignes: LigneSetInput,
}

impl ReplaceLignesAction {
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<DocumentSnapshot> {
        let mut snapshot = ctx.load_document(&self.document_id)?;

        if !snapshot.statut.lignes_modifiables() {
            return Err(DomainError::DocumentLocked {
                numero: snapshot.numero.clone(),
                statut: snapshot.statut.label().to_string(),
            });
        }

        // The billing shape is fixed at creation
        if self.lignes.type_document() != snapshot.type_document {
            return Err(DomainError::validation(
                "lignes",
                format!(
                    "shape {:?} does not match document type {:?}",
                    self.lignes.type_document(),
                    snapshot.type_document
                ),
            ));
        }

        snapshot.lignes = input_to_lignes(&self.lignes)?;
        recalculate_totals(&mut snapshot);
        snapshot.updated_at = metadata.timestamp;
        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TauxSnapshot;
    use crate::documents::actions::CreateDocumentAction;
    use crate::storage::OfficeStore;
    use shared::document::{
        DevisStatut, DocumentHeaderInput, DocumentKind, DocumentStatut, LotInput, OperationInput,
    };

    fn create_devis(store: &OfficeStore) -> DocumentSnapshot {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let snapshot = CreateDocumentAction {
            kind: DocumentKind::Devis,
            header: DocumentHeaderInput {
                client_id: "client-1".to_string(),
                transitaire_id: None,
                date_document: None,
            },
            lignes: LigneSetInput::Independant(vec![OperationInput {
                type_operation: "Transport".to_string(),
                date_debut: None,
                date_fin: None,
                lieu: None,
                quantite: 1.0,
                prix_unitaire: 100_000.0,
            }]),
            taux: TauxSnapshot {
                taux_tva: 18.0,
                taux_css: 1.0,
                version: 1,
            },
        }
        .execute(&ctx, &ActionMetadata::new("u1"))
        .unwrap();
        txn.commit().unwrap();
        snapshot
    }

    #[test]
    fn test_replace_recomputes_totals_with_snapshotted_rates() {
        let store = OfficeStore::open_in_memory().unwrap();
        let devis = create_devis(&store);
        assert_eq!(devis.montant_ttc, 119_000.0);

        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store: &store };
        let updated = ReplaceLignesAction {
            document_id: devis.document_id.clone(),
            lignes: LigneSetInput::Independant(vec![OperationInput {
                type_operation: "Manutention".to_string(),
                date_debut: None,
                date_fin: None,
                lieu: None,
                quantite: 2.0,
                prix_unitaire: 500_000.0,
            }]),
        }
        .execute(&ctx, &ActionMetadata::new("u1"))
        .unwrap();
        txn.commit().unwrap();

        assert_eq!(updated.montant_ht, 1_000_000.0);
        assert_eq!(updated.montant_ttc, 1_190_000.0);
        assert_eq!(updated.taux_tva, 18.0);
        assert_eq!(updated.lignes.leaf_count(), 1);
    }

    #[test]
    fn test_replace_rejected_once_locked() {
        let store = OfficeStore::open_in_memory().unwrap();
        let mut devis = create_devis(&store);

        // Force a terminal status directly in storage
        devis.statut = DocumentStatut::Devis(DevisStatut::Converti);
        let txn = store.begin_write().unwrap();
        store.store_document(&txn, &devis).unwrap();
        txn.commit().unwrap();

        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store: &store };
        let err = ReplaceLignesAction {
            document_id: devis.document_id.clone(),
            lignes: LigneSetInput::Independant(vec![OperationInput {
                type_operation: "Transport".to_string(),
                date_debut: None,
                date_fin: None,
                lieu: None,
                quantite: 1.0,
                prix_unitaire: 1.0,
            }]),
        }
        .execute(&ctx, &ActionMetadata::new("u1"))
        .unwrap_err();
        assert!(matches!(err, DomainError::DocumentLocked { .. }));
    }

    #[test]
    fn test_replace_rejects_shape_change() {
        let store = OfficeStore::open_in_memory().unwrap();
        let devis = create_devis(&store);

        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store: &store };
        let err = ReplaceLignesAction {
            document_id: devis.document_id.clone(),
            lignes: LigneSetInput::Lot(vec![LotInput {
                designation: "Riz".to_string(),
                quantite: 10.0,
                poids: None,
                volume: None,
                prix_unitaire: 100.0,
            }]),
        }
        .execute(&ctx, &ActionMetadata::new("u1"))
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation { .. }));
    }

    #[test]
    fn test_replace_missing_document() {
        let store = OfficeStore::open_in_memory().unwrap();
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store: &store };
        let err = ReplaceLignesAction {
            document_id: "missing".to_string(),
            lignes: LigneSetInput::Independant(vec![]),
        }
        .execute(&ctx, &ActionMetadata::new("u1"))
        .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }
}
