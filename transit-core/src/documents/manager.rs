//! DocumentsManager - document lifecycle orchestration
//!
//! Owns the write transaction around each operation:
//!
//! ```text
//! operation(args, user)
//!     ├─ 1. Begin write transaction
//!     ├─ 2. Execute action (validate → mutate → store)
//!     ├─ 3. Commit (or drop the transaction on any error)
//!     ├─ 4. Emit audit entry (fire-and-forget)
//!     └─ 5. Return the updated snapshot(s)
//! ```
//!
//! Domain checks all run before the first write; a failed action leaves
//! the transaction uncommitted, so readers never observe partial state.

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::config::TauxSnapshot;
use crate::documents::actions::{
    ActionContext, ActionMetadata, ApplyPaymentAction, CancelFactureAction, ConvertAction,
    CreateDocumentAction, DeletePaymentAction, GlobalPaymentAction, RembourserFactureAction,
    ReplaceLignesAction, TransitionAction,
};
use crate::error::DomainResult;
use crate::storage::OfficeStore;
use shared::caisse::MouvementCaisse;
use shared::document::{
    AllocationInput, DocumentHeaderInput, DocumentKind, DocumentSnapshot, DocumentStatut,
    LigneSetInput, ModePaiement, Paiement,
};
use std::sync::Arc;

pub struct DocumentsManager {
    store: OfficeStore,
    audit: Arc<dyn AuditSink>,
}

impl DocumentsManager {
    pub fn new(store: OfficeStore, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    // ========== Lifecycle ==========

    pub fn create_document(
        &self,
        kind: DocumentKind,
        header: DocumentHeaderInput,
        lignes: LigneSetInput,
        taux: TauxSnapshot,
        user_id: &str,
    ) -> DomainResult<DocumentSnapshot> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let snapshot = CreateDocumentAction { kind, header, lignes, taux }.execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            numero = %snapshot.numero,
            montant_ttc = snapshot.montant_ttc,
            "Document created"
        );
        self.audit.record(
            AuditEntry::new(AuditAction::DocumentCreated, "document", &snapshot.document_id)
                .with_summary(format!("Création {} ({})", snapshot.numero, kind.label()))
                .with_user(user_id),
        );
        Ok(snapshot)
    }

    pub fn replace_lignes(
        &self,
        document_id: &str,
        lignes: LigneSetInput,
        user_id: &str,
    ) -> DomainResult<DocumentSnapshot> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let snapshot = ReplaceLignesAction {
            document_id: document_id.to_string(),
            lignes,
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.audit.record(
            AuditEntry::new(AuditAction::LignesReplaced, "document", document_id)
                .with_summary(format!(
                    "Lignes remplacées sur {} (nouveau total {:.2})",
                    snapshot.numero, snapshot.montant_ttc
                ))
                .with_user(user_id),
        );
        Ok(snapshot)
    }

    pub fn transition(
        &self,
        document_id: &str,
        nouveau_statut: DocumentStatut,
        user_id: &str,
    ) -> DomainResult<DocumentSnapshot> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let snapshot = TransitionAction {
            document_id: document_id.to_string(),
            nouveau_statut,
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(numero = %snapshot.numero, statut = snapshot.statut.label(), "Status changed");
        self.audit.record(
            AuditEntry::new(AuditAction::StatusChanged, "document", document_id)
                .with_summary(format!("{} → {}", snapshot.numero, snapshot.statut.label()))
                .with_user(user_id),
        );
        Ok(snapshot)
    }

    /// Convert a document to its next lifecycle stage
    /// (Devis → OrdreTravail, OrdreTravail → Facture)
    pub fn convert(
        &self,
        source_id: &str,
        user_id: &str,
    ) -> DomainResult<(DocumentSnapshot, DocumentSnapshot)> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let (source, target) = ConvertAction {
            source_id: source_id.to_string(),
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(source = %source.numero, target = %target.numero, "Document converted");
        self.audit.record(
            AuditEntry::new(AuditAction::DocumentConverted, "document", source_id)
                .with_summary(format!("{} converti en {}", source.numero, target.numero))
                .with_user(user_id),
        );
        Ok((source, target))
    }

    // ========== Payments ==========

    pub fn apply_payment(
        &self,
        facture_id: &str,
        montant: f64,
        mode: ModePaiement,
        banque_id: Option<String>,
        reference: Option<String>,
        user_id: &str,
    ) -> DomainResult<(DocumentSnapshot, Paiement)> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let (snapshot, paiement, mouvement) = ApplyPaymentAction {
            facture_id: facture_id.to_string(),
            montant,
            mode,
            banque_id,
            reference,
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            numero = %snapshot.numero,
            montant = paiement.montant,
            mode = mode.label(),
            caisse = mouvement.is_some(),
            "Payment applied"
        );
        self.audit.record(
            AuditEntry::new(AuditAction::PaymentApplied, "document", facture_id)
                .with_summary(format!(
                    "Paiement {:.2} ({}) sur {} — statut {}",
                    paiement.montant,
                    mode.label(),
                    snapshot.numero,
                    snapshot.statut.label()
                ))
                .with_user(user_id),
        );
        Ok((snapshot, paiement))
    }

    /// Apply one announced amount across several invoices of a client.
    /// All-or-nothing: one rejected allocation aborts the whole batch.
    pub fn apply_global_payment(
        &self,
        client_id: &str,
        montant_total: f64,
        mode: ModePaiement,
        banque_id: Option<String>,
        allocations: Vec<AllocationInput>,
        user_id: &str,
    ) -> DomainResult<Vec<(DocumentSnapshot, Paiement)>> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let (results, _mouvements) = GlobalPaymentAction {
            client_id: client_id.to_string(),
            montant_total,
            mode,
            banque_id,
            allocations,
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            client = client_id,
            montant_total,
            factures = results.len(),
            "Global payment applied"
        );
        for (snapshot, paiement) in &results {
            self.audit.record(
                AuditEntry::new(AuditAction::PaymentApplied, "document", &snapshot.document_id)
                    .with_summary(format!(
                        "Paiement groupé {:.2} sur {}",
                        paiement.montant, snapshot.numero
                    ))
                    .with_user(user_id),
            );
        }
        Ok(results)
    }

    /// Remove a payment and reverse its ledger effect
    pub fn delete_payment(
        &self,
        facture_id: &str,
        paiement_id: &str,
        user_id: &str,
    ) -> DomainResult<DocumentSnapshot> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let (snapshot, paiement) = DeletePaymentAction {
            facture_id: facture_id.to_string(),
            paiement_id: paiement_id.to_string(),
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.audit.record(
            AuditEntry::new(AuditAction::PaymentDeleted, "document", facture_id)
                .with_summary(format!(
                    "Paiement {:.2} supprimé de {} — statut {}",
                    paiement.montant, snapshot.numero, snapshot.statut.label()
                ))
                .with_user(user_id),
        );
        Ok(snapshot)
    }

    // ========== Cancellation and refund ==========

    pub fn cancel_facture(
        &self,
        facture_id: &str,
        motif: &str,
        user_id: &str,
    ) -> DomainResult<DocumentSnapshot> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let snapshot = CancelFactureAction {
            facture_id: facture_id.to_string(),
            motif: motif.to_string(),
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(numero = %snapshot.numero, motif, "Facture cancelled");
        self.audit.record(
            AuditEntry::new(AuditAction::FactureCancelled, "document", facture_id)
                .with_summary(format!("{} annulée: {motif}", snapshot.numero))
                .with_user(user_id),
        );
        Ok(snapshot)
    }

    /// Refund (part of) the payments of a cancelled invoice through the
    /// cash ledger
    pub fn rembourser_facture(
        &self,
        facture_id: &str,
        montant: f64,
        mode: ModePaiement,
        banque_id: Option<String>,
        user_id: &str,
    ) -> DomainResult<(DocumentSnapshot, MouvementCaisse)> {
        let metadata = ActionMetadata::new(user_id);
        let txn = self.store.begin_write()?;
        let ctx = ActionContext { txn: &txn, store: &self.store };
        let (snapshot, mouvement) = RembourserFactureAction {
            facture_id: facture_id.to_string(),
            montant,
            mode,
            banque_id,
        }
        .execute(&ctx, &metadata)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.audit.record(
            AuditEntry::new(AuditAction::FactureRefunded, "document", facture_id)
                .with_summary(format!("Remboursement {montant:.2} sur {}", snapshot.numero))
                .with_user(user_id),
        );
        Ok((snapshot, mouvement))
    }

    // ========== Queries ==========

    pub fn get_document(&self, document_id: &str) -> DomainResult<Option<DocumentSnapshot>> {
        Ok(self.store.get_document(document_id)?)
    }

    pub fn find_by_numero(&self, numero: &str) -> DomainResult<Option<DocumentSnapshot>> {
        Ok(self.store.find_document_by_numero(numero)?)
    }

    /// Documents, optionally restricted to one kind
    pub fn list_documents(&self, kind: Option<DocumentKind>) -> DomainResult<Vec<DocumentSnapshot>> {
        let mut documents = self.store.list_documents()?;
        if let Some(kind) = kind {
            documents.retain(|d| d.kind() == kind);
        }
        documents.sort_by(|a, b| a.numero.cmp(&b.numero));
        Ok(documents)
    }
}
