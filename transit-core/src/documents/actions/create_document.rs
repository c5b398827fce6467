//! CreateDocument action
//!
//! Allocates a numero, snapshots the tax rates, reduces the line-item
//! input and persists the new aggregate with derived totals.

use crate::config::TauxSnapshot;
use crate::documents::actions::{ActionContext, ActionMetadata};
use crate::documents::money::{recalculate_totals, validate_taux};
use crate::documents::numbering;
use crate::documents::reducer::input_to_lignes;
use crate::error::{DomainError, DomainResult};
use shared::document::{
    DevisStatut, DocumentHeaderInput, DocumentKind, DocumentSnapshot, DocumentStatut,
    FactureStatut, LigneSetInput, OrdreStatut,
};
use shared::util::year_of;

/// A fresh counter can still collide with a manually migrated numero;
/// allocation skips forward instead of reusing the taken number.
const MAX_NUMERO_ATTEMPTS: u32 = 32;

#[derive(Debug, Clone)]
pub struct CreateDocumentAction {
    pub kind: DocumentKind,
    pub header: DocumentHeaderInput,
    pub lignes: LigneSetInput,
    pub taux: TauxSnapshot,
}

fn initial_statut(kind: DocumentKind) -> DocumentStatut {
    match kind {
        DocumentKind::Devis => DocumentStatut::Devis(DevisStatut::Brouillon),
        DocumentKind::OrdreTravail => DocumentStatut::OrdreTravail(OrdreStatut::EnAttente),
        DocumentKind::Facture => DocumentStatut::Facture(FactureStatut::Brouillon),
    }
}

impl CreateDocumentAction {
    pub fn execute(
        &self,
        ctx: &ActionContext<'_>,
        metadata: &ActionMetadata,
    ) -> DomainResult<DocumentSnapshot> {
        // 1. Validate header and rate snapshot
        if self.header.client_id.trim().is_empty() {
            return Err(DomainError::validation("client_id", "must not be empty"));
        }
        validate_taux(self.taux.taux_tva, "taux_tva")?;
        validate_taux(self.taux.taux_css, "taux_css")?;

        // 2. Reduce and validate the line-item tree
        let lignes = input_to_lignes(&self.lignes)?;

        // 3. Allocate a unique numero for (kind, year)
        let date_document = self.header.date_document.unwrap_or(metadata.timestamp);
        let year = year_of(date_document);
        let document_id = uuid::Uuid::new_v4().to_string();
        let numero = allocate_numero(ctx, self.kind, year, &document_id)?;

        // 4. Build and persist the aggregate
        let mut snapshot = DocumentSnapshot {
            document_id,
            numero,
            client_id: self.header.client_id.trim().to_string(),
            transitaire_id: self.header.transitaire_id.clone(),
            type_document: lignes.type_document(),
            date_document,
            statut: initial_statut(self.kind),
            taux_tva: self.taux.taux_tva,
            taux_css: self.taux.taux_css,
            taux_version: self.taux.version,
            lignes,
            montant_ht: 0.0,
            montant_tva: 0.0,
            montant_css: 0.0,
            montant_ttc: 0.0,
            paiements: vec![],
            annulation: None,
            converti_en: None,
            converti_de: None,
            created_at: metadata.timestamp,
            updated_at: metadata.timestamp,
        };
        recalculate_totals(&mut snapshot);
        ctx.store.store_document(ctx.txn, &snapshot)?;
        Ok(snapshot)
    }
}

/// Allocate the next free numero, retrying past collisions with
/// pre-existing numbers rather than ever reusing one
pub(crate) fn allocate_numero(
    ctx: &ActionContext<'_>,
    kind: DocumentKind,
    year: u32,
    document_id: &str,
) -> DomainResult<String> {
    for _ in 0..MAX_NUMERO_ATTEMPTS {
        let numero = numbering::next_numero(ctx.store, ctx.txn, kind, year)?;
        if ctx.store.claim_numero(ctx.txn, &numero, document_id)? {
            return Ok(numero);
        }
        tracing::warn!(numero = %numero, "Numero already claimed, skipping forward");
    }
    Err(DomainError::validation(
        "numero",
        format!("could not allocate a free number for {} {year}", kind.prefix()),
    ))
}
