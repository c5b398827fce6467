//! Legal status transitions per document variant
//!
//! Every transition request is checked against these tables; anything
//! not listed fails with a conflict naming the current and requested
//! states. Payment-driven Facture moves (Envoyée ⇄ Partiellement payée
//! → Payée) are applied by the payment actions, not requestable here.

use crate::error::{DomainError, DomainResult};
use shared::document::{DevisStatut, DocumentStatut, FactureStatut, OrdreStatut};

/// Whether `from → to` is a legal Devis transition
fn devis_autorise(from: DevisStatut, to: DevisStatut) -> bool {
    use DevisStatut::*;
    matches!(
        (from, to),
        (Brouillon, Envoye)
            | (Brouillon, Annule)
            | (Envoye, Accepte)
            | (Envoye, Refuse)
            | (Envoye, Expire)
            | (Envoye, Annule)
            | (Accepte, Converti)
            | (Accepte, Annule)
    )
}

/// Whether `from → to` is a legal OrdreTravail transition
fn ordre_autorise(from: OrdreStatut, to: OrdreStatut) -> bool {
    use OrdreStatut::*;
    matches!(
        (from, to),
        (EnAttente, EnCours)
            | (EnCours, Termine)
            | (Termine, Facture)
            | (EnAttente, Annule)
            | (EnCours, Annule)
            | (Termine, Annule)
    )
}

/// Whether `from → to` is a legal Facture transition.
///
/// PartiellementPayee and Payee are reached through payment recording
/// only; Annulee through the cancellation flow only.
fn facture_autorise(from: FactureStatut, to: FactureStatut) -> bool {
    use FactureStatut::*;
    matches!((from, to), (Brouillon, Envoyee))
}

/// Validate a requested transition against the per-variant tables
pub fn verifier_transition(current: DocumentStatut, requested: DocumentStatut) -> DomainResult<()> {
    let autorise = match (current, requested) {
        (DocumentStatut::Devis(from), DocumentStatut::Devis(to)) => devis_autorise(from, to),
        (DocumentStatut::OrdreTravail(from), DocumentStatut::OrdreTravail(to)) => {
            ordre_autorise(from, to)
        }
        (DocumentStatut::Facture(from), DocumentStatut::Facture(to)) => facture_autorise(from, to),
        // Cross-variant moves are never legal
        _ => false,
    };
    if autorise {
        Ok(())
    } else {
        Err(DomainError::IllegalTransition {
            current: current.label().to_string(),
            requested: requested.label().to_string(),
        })
    }
}

/// Statuses a payment may be recorded in
pub fn paiement_autorise(statut: DocumentStatut) -> bool {
    matches!(
        statut,
        DocumentStatut::Facture(FactureStatut::Envoyee)
            | DocumentStatut::Facture(FactureStatut::PartiellementPayee)
    )
}
