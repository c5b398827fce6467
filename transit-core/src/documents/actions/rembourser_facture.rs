//! RembourserFacture action
//!
//! Explicit refund flow for a cancelled invoice: emits a cash-ledger
//! Sortie and tracks the cumulated refunded amount on the Annulation
//! record. Refunds never exceed what was actually received.

use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::money::{
    sum_paiements, to_decimal, to_f64, validate_montant, MONEY_TOLERANCE,
};
use crate::error::{DomainError, DomainResult};
use shared::caisse::{
    MouvementCaisse, MouvementType, SourceCaisse, CATEGORIE_REMBOURSEMENT_FACTURE,
};
use shared::document::{DocumentSnapshot, ModePaiement};
use shared::util::snowflake_id;

#[derive(Debug, Clone)]
pub struct RembourserFactureAction {
    pub facture_id: String,
    pub montant: f64,
    pub mode: ModePaiement,
    pub banque_id: Option<String>,
}

impl RembourserFactureAction {
    /// Returns the updated invoice and the emitted Sortie movement
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<(DocumentSnapshot, MouvementCaisse)> {
        let mut snapshot = ctx.load_document(&self.facture_id)?;

        // Refunds only exist for cancelled invoices
        let Some(annulation) = snapshot.annulation.clone() else {
            return Err(DomainError::DocumentLocked {
                numero: snapshot.numero.clone(),
                statut: snapshot.statut.label().to_string(),
            });
        };

        validate_montant(self.montant, "montant")?;
        let remboursable =
            sum_paiements(&snapshot.paiements) - to_decimal(annulation.montant_rembourse);
        if to_decimal(self.montant) > remboursable + MONEY_TOLERANCE {
            return Err(DomainError::RefundExceedsPaid {
                remboursable: to_f64(remboursable),
            });
        }

        // One reference per refund, sequential within the invoice
        let numero_remboursement = next_refund_seq(ctx, &snapshot.document_id)?;
        let mouvement = MouvementCaisse {
            mouvement_id: snowflake_id(),
            mouvement_type: MouvementType::Sortie,
            categorie: CATEGORIE_REMBOURSEMENT_FACTURE.to_string(),
            montant: self.montant,
            reference: Some(refund_reference(&snapshot.document_id, numero_remboursement)),
            banque_id: self.banque_id.clone(),
            source: if self.mode.is_cash() {
                SourceCaisse::Caisse
            } else {
                SourceCaisse::Banque
            },
            date_mouvement: metadata.timestamp,
            user_id: metadata.user_id.clone(),
            note: Some(format!("Remboursement {}", snapshot.numero)),
        };
        let reference = mouvement.reference.as_deref().unwrap_or_default();
        if !ctx
            .store
            .claim_reference(ctx.txn, reference, mouvement.mouvement_id)?
        {
            return Err(DomainError::AlreadyDecaisse {
                reference: reference.to_string(),
            });
        }
        ctx.store.store_mouvement(ctx.txn, &mouvement)?;

        snapshot.annulation = Some(shared::document::Annulation {
            montant_rembourse: to_f64(
                to_decimal(annulation.montant_rembourse) + to_decimal(self.montant),
            ),
            ..annulation
        });
        snapshot.updated_at = metadata.timestamp;
        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok((snapshot, mouvement))
    }
}

/// Refund reference: `REMB-{facture_id}-{n}`
pub fn refund_reference(facture_id: &str, seq: u32) -> String {
    format!("REMB-{facture_id}-{seq}")
}

/// First free refund sequence for an invoice (claimed references are
/// checked inside the transaction, so concurrent refunds serialize)
fn next_refund_seq(ctx: &ActionContext<'_>, facture_id: &str) -> DomainResult<u32> {
    let mut seq = 1;
    while ctx
        .store
        .reference_lookup_txn(ctx.txn, &refund_reference(facture_id, seq))?
        .is_some()
    {
        seq += 1;
    }
    Ok(seq)
}
