//! Transition action
//!
//! Applies a caller-requested status change after checking it against
//! the static per-variant transition tables. Payment- and
//! cancellation-driven statuses are reached through their own flows.

use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::statuts::verifier_transition;
use crate::error::DomainResult;
use shared::document::{DocumentSnapshot, DocumentStatut};

#[derive(Debug, Clone)]
pub struct TransitionAction {
    pub document_id: String,
    pub nouveau_statut: DocumentStatut,
}

impl TransitionAction {
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<DocumentSnapshot> {
        let mut snapshot = ctx.load_document(&self.document_id)?;
        verifier_transition(snapshot.statut, self.nouveau_statut)?;
        snapshot.statut = self.nouveau_statut;
        snapshot.updated_at = metadata.timestamp;
        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok(snapshot)
    }
}
