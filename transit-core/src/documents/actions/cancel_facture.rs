//! CancelFacture action
//!
//! Writes the single Annulation record and flips the invoice to
//! Annulée atomically. Prior payments are never deleted here;
//! reimbursing them is the explicit refund flow.

use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::error::{DomainError, DomainResult};
use shared::document::{Annulation, DocumentSnapshot, DocumentStatut, FactureStatut};

#[derive(Debug, Clone)]
pub struct CancelFactureAction {
    pub facture_id: String,
    pub motif: String,
}

impl CancelFactureAction {
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<DocumentSnapshot> {
        if self.motif.trim().is_empty() {
            return Err(DomainError::validation("motif", "must not be empty"));
        }

        let mut snapshot = ctx.load_document(&self.facture_id)?;
        match snapshot.statut {
            DocumentStatut::Facture(FactureStatut::Annulee) => {
                return Err(DomainError::AlreadyCancelled {
                    numero: snapshot.numero.clone(),
                });
            }
            // A settled invoice cannot be cancelled
            DocumentStatut::Facture(FactureStatut::Payee) => {
                return Err(DomainError::DocumentLocked {
                    numero: snapshot.numero.clone(),
                    statut: snapshot.statut.label().to_string(),
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

        snapshot.annulation = Some(Annulation {
            motif: self.motif.trim().to_string(),
            user_id: metadata.user_id.clone(),
            date_annulation: metadata.timestamp,
            montant_rembourse: 0.0,
        });
        snapshot.statut = DocumentStatut::Facture(FactureStatut::Annulee);
        snapshot.updated_at = metadata.timestamp;
        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok(snapshot)
    }
}
