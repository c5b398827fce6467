//! Convert action: Devis → OrdreTravail → Facture
//!
//! Creates the next-stage document with a deep copy of the source's
//! line tree and tax-rate snapshot, recomputes its totals independently
//! and flips the source to its converted terminal status — all within
//! the caller's single write transaction, so a half-converted pair is
//! never observable.

use crate::documents::actions::create_document::allocate_numero;
use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::money::recalculate_totals;
use crate::documents::reducer::clone_lignes_with_new_ids;
use crate::error::{DomainError, DomainResult};
use shared::document::{
    DevisStatut, DocumentKind, DocumentSnapshot, DocumentStatut, FactureStatut, OrdreStatut,
};
use shared::util::year_of;

#[derive(Debug, Clone)]
pub struct ConvertAction {
    pub source_id: String,
}

impl ConvertAction {
    /// Returns (updated source, new target)
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<(DocumentSnapshot, DocumentSnapshot)> {
        let mut source = ctx.load_document(&self.source_id)?;

        // 1. Check the source is conversion-eligible and not yet converted
        let (target_kind, converted_statut) = match source.statut {
            DocumentStatut::Devis(DevisStatut::Converti) => {
                return Err(DomainError::AlreadyConverted {
                    numero: source.numero.clone(),
                });
            }
            DocumentStatut::Devis(DevisStatut::Accepte) => (
                DocumentKind::OrdreTravail,
                DocumentStatut::Devis(DevisStatut::Converti),
            ),
            DocumentStatut::OrdreTravail(OrdreStatut::Facture) => {
                return Err(DomainError::AlreadyConverted {
                    numero: source.numero.clone(),
                });
            }
            DocumentStatut::OrdreTravail(OrdreStatut::Termine) => (
                DocumentKind::Facture,
                DocumentStatut::OrdreTravail(OrdreStatut::Facture),
            ),
            _ => {
                return Err(DomainError::DocumentLocked {
                    numero: source.numero.clone(),
                    statut: source.statut.label().to_string(),
                });
            }
        };
        if source.converti_en.is_some() {
            return Err(DomainError::AlreadyConverted {
                numero: source.numero.clone(),
            });
        }

        // 2. Build the target: fresh ids, same quantities/prices/rates
        let target_id = uuid::Uuid::new_v4().to_string();
        let year = year_of(metadata.timestamp);
        let numero = allocate_numero(ctx, target_kind, year, &target_id)?;
        let initial_statut = match target_kind {
            DocumentKind::OrdreTravail => DocumentStatut::OrdreTravail(OrdreStatut::EnAttente),
            DocumentKind::Facture => DocumentStatut::Facture(FactureStatut::Brouillon),
            DocumentKind::Devis => unreachable!("conversion never targets a Devis"),
        };
        let mut target = DocumentSnapshot {
            document_id: target_id,
            numero,
            client_id: source.client_id.clone(),
            transitaire_id: source.transitaire_id.clone(),
            type_document: source.type_document,
            date_document: metadata.timestamp,
            statut: initial_statut,
            taux_tva: source.taux_tva,
            taux_css: source.taux_css,
            taux_version: source.taux_version,
            lignes: clone_lignes_with_new_ids(&source.lignes),
            montant_ht: 0.0,
            montant_tva: 0.0,
            montant_css: 0.0,
            montant_ttc: 0.0,
            paiements: vec![],
            annulation: None,
            converti_en: None,
            converti_de: Some(source.document_id.clone()),
            created_at: metadata.timestamp,
            updated_at: metadata.timestamp,
        };
        // Recomputed independently; identical lines and rates make this
        // equal the source's totals under the shared rounding
        recalculate_totals(&mut target);

        // 3. Flip the source and link both sides
        source.statut = converted_statut;
        source.converti_en = Some(target.document_id.clone());
        source.updated_at = metadata.timestamp;

        ctx.store.store_document(ctx.txn, &target)?;
        ctx.store.store_document(ctx.txn, &source)?;
        Ok((source, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TauxSnapshot;
    use crate::documents::actions::{CreateDocumentAction, TransitionAction};
    use crate::storage::OfficeStore;
    use shared::document::{
        ConteneurInput, DocumentHeaderInput, LigneSetInput, OperationInput,
    };

    // 2025-01-01 12:00:00 UTC, so numbering lands in year 2025
    fn meta() -> ActionMetadata {
        ActionMetadata {
            user_id: "u1".to_string(),
            timestamp: 1_735_732_800_000,
        }
    }

    fn create_accepted_devis(store: &OfficeStore) -> DocumentSnapshot {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let meta = meta();
        let devis = CreateDocumentAction {
            kind: DocumentKind::Devis,
            header: DocumentHeaderInput {
                client_id: "client-1".to_string(),
                transitaire_id: Some("transit-9".to_string()),
                date_document: None,
            },
            lignes: LigneSetInput::Conteneur(vec![ConteneurInput {
                numero_conteneur: "MSKU1234567".to_string(),
                type_conteneur: Some("DRY".to_string()),
                taille: Some("40".to_string()),
                armateur_id: None,
                operations: vec![
                    OperationInput {
                        type_operation: "Transport".to_string(),
                        date_debut: None,
                        date_fin: None,
                        lieu: Some("Port".to_string()),
                        quantite: 1.0,
                        prix_unitaire: 750_000.0,
                    },
                    OperationInput {
                        type_operation: "Manutention".to_string(),
                        date_debut: None,
                        date_fin: None,
                        lieu: None,
                        quantite: 2.0,
                        prix_unitaire: 125_000.0,
                    },
                ],
            }]),
            taux: TauxSnapshot {
                taux_tva: 18.0,
                taux_css: 1.0,
                version: 1,
            },
        }
        .execute(&ctx, &meta)
        .unwrap();
        for statut in [DevisStatut::Envoye, DevisStatut::Accepte] {
            TransitionAction {
                document_id: devis.document_id.clone(),
                nouveau_statut: DocumentStatut::Devis(statut),
            }
            .execute(&ctx, &meta)
            .unwrap();
        }
        txn.commit().unwrap();
        store.get_document(&devis.document_id).unwrap().unwrap()
    }

    fn convert(store: &OfficeStore, source_id: &str) -> DomainResult<(DocumentSnapshot, DocumentSnapshot)> {
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store };
        let result = ConvertAction {
            source_id: source_id.to_string(),
        }
        .execute(&ctx, &meta());
        if result.is_ok() {
            txn.commit().unwrap();
        }
        result
    }

    #[test]
    fn test_devis_to_ordre_preserves_totals_and_lines() {
        let store = OfficeStore::open_in_memory().unwrap();
        let devis = create_accepted_devis(&store);
        assert_eq!(devis.montant_ttc, 1_190_000.0);

        let (source, ordre) = convert(&store, &devis.document_id).unwrap();

        assert_eq!(source.statut, DocumentStatut::Devis(DevisStatut::Converti));
        assert_eq!(source.converti_en.as_deref(), Some(ordre.document_id.as_str()));
        assert_eq!(ordre.converti_de.as_deref(), Some(source.document_id.as_str()));
        assert_eq!(ordre.statut, DocumentStatut::OrdreTravail(OrdreStatut::EnAttente));
        assert_eq!(ordre.numero, "OT-2025-0001");
        assert_eq!(ordre.montant_ht, devis.montant_ht);
        assert_eq!(ordre.montant_tva, devis.montant_tva);
        assert_eq!(ordre.montant_css, devis.montant_css);
        assert_eq!(ordre.montant_ttc, devis.montant_ttc);
        assert_eq!(ordre.lignes.leaf_count(), devis.lignes.leaf_count());
        assert_eq!(ordre.taux_version, devis.taux_version);
    }

    #[test]
    fn test_end_to_end_chain_preserves_ttc() {
        let store = OfficeStore::open_in_memory().unwrap();
        let devis = create_accepted_devis(&store);

        let (_, ordre) = convert(&store, &devis.document_id).unwrap();

        // Walk the OT to Terminé then convert to Facture
        {
            let txn = store.begin_write().unwrap();
            let ctx = ActionContext { txn: &txn, store: &store };
            let meta = meta();
            for statut in [OrdreStatut::EnCours, OrdreStatut::Termine] {
                TransitionAction {
                    document_id: ordre.document_id.clone(),
                    nouveau_statut: DocumentStatut::OrdreTravail(statut),
                }
                .execute(&ctx, &meta)
                .unwrap();
            }
            txn.commit().unwrap();
        }
        let (ordre, facture) = convert(&store, &ordre.document_id).unwrap();

        assert_eq!(ordre.statut, DocumentStatut::OrdreTravail(OrdreStatut::Facture));
        assert_eq!(facture.statut, DocumentStatut::Facture(FactureStatut::Brouillon));
        assert_eq!(facture.numero, "FAC-2025-0001");
        assert_eq!(facture.montant_ttc, devis.montant_ttc);
        assert_eq!(facture.lignes.leaf_count(), devis.lignes.leaf_count());
    }

    #[test]
    fn test_double_conversion_rejected() {
        let store = OfficeStore::open_in_memory().unwrap();
        let devis = create_accepted_devis(&store);

        convert(&store, &devis.document_id).unwrap();
        let err = convert(&store, &devis.document_id).unwrap_err();
        assert!(matches!(err, DomainError::AlreadyConverted { .. }));

        // Exactly one OT was created
        let count = store
            .list_documents()
            .unwrap()
            .iter()
            .filter(|d| d.kind() == DocumentKind::OrdreTravail)
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_conversion_requires_eligible_status() {
        let store = OfficeStore::open_in_memory().unwrap();

        // A fresh Brouillon devis is not convertible
        let txn = store.begin_write().unwrap();
        let ctx = ActionContext { txn: &txn, store: &store };
        let devis = CreateDocumentAction {
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

        let err = convert(&store, &devis.document_id).unwrap_err();
        assert!(matches!(err, DomainError::DocumentLocked { .. }));
    }

    #[test]
    fn test_failed_conversion_leaves_no_trace() {
        let store = OfficeStore::open_in_memory().unwrap();
        let devis = create_accepted_devis(&store);
        convert(&store, &devis.document_id).unwrap();
        let before = store.list_documents().unwrap().len();

        let _ = convert(&store, &devis.document_id).unwrap_err();
        assert_eq!(store.list_documents().unwrap().len(), before);
    }
}
