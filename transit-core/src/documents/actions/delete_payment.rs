//! DeletePayment action
//!
//! Administrative correction: removes a recorded payment, removes the
//! ledger movement it emitted (cash payments) and recomputes the
//! invoice status from the remaining payment sum — one transaction.

use crate::documents::actions::apply_payment::{paiement_reference, recompute_statut};
use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::error::{DomainError, DomainResult};
use shared::document::{DocumentSnapshot, Paiement};

#[derive(Debug, Clone)]
pub struct DeletePaymentAction {
    pub facture_id: String,
    pub paiement_id: String,
}

impl DeletePaymentAction {
    /// Returns the updated invoice and the removed payment
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<(DocumentSnapshot, Paiement)> {
        let mut snapshot = ctx.load_document(&self.facture_id)?;

        // Corrections happen on live invoices; a cancelled one keeps its
        // payment history intact (refunds are the explicit flow)
        if snapshot.est_annulee() {
            return Err(DomainError::AlreadyCancelled {
                numero: snapshot.numero.clone(),
            });
        }

        let position = snapshot
            .paiements
            .iter()
            .position(|p| p.paiement_id == self.paiement_id)
            .ok_or_else(|| DomainError::not_found("Paiement", &self.paiement_id))?;
        let paiement = snapshot.paiements.remove(position);

        // Reverse the linked ledger entry, if the payment produced one
        let reference = paiement_reference(&paiement.paiement_id);
        if let Some(mouvement_id) = ctx.store.reference_lookup_txn(ctx.txn, &reference)? {
            ctx.store.remove_mouvement(ctx.txn, mouvement_id)?;
            ctx.store.release_reference(ctx.txn, &reference)?;
        }

        recompute_statut(&mut snapshot);
        snapshot.updated_at = metadata.timestamp;
        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok((snapshot, paiement))
    }
}
