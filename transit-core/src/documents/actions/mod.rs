//! Document lifecycle actions
//!
//! Each action validates against the loaded snapshot, mutates state and
//! writes through the shared context; it never commits. The manager
//! owns the write transaction and commits (or drops) it around one or
//! more actions.

pub mod apply_global_payment;
pub mod apply_payment;
pub mod cancel_facture;
pub mod convert;
pub mod create_document;
pub mod delete_payment;
pub mod rembourser_facture;
pub mod replace_lignes;
pub mod transition;

pub use apply_global_payment::GlobalPaymentAction;
pub use apply_payment::ApplyPaymentAction;
pub use cancel_facture::CancelFactureAction;
pub use convert::ConvertAction;
pub use create_document::CreateDocumentAction;
pub use delete_payment::DeletePaymentAction;
pub use rembourser_facture::RembourserFactureAction;
pub use replace_lignes::ReplaceLignesAction;
pub use transition::TransitionAction;

use crate::error::{DomainError, DomainResult};
use crate::storage::OfficeStore;
use redb::WriteTransaction;
use shared::document::DocumentSnapshot;

/// Shared state handed to every action: the open write transaction and
/// the store whose helpers operate inside it
pub struct ActionContext<'a> {
    pub txn: &'a WriteTransaction,
    pub store: &'a OfficeStore,
}

impl ActionContext<'_> {
    pub fn load_document(&self, document_id: &str) -> DomainResult<DocumentSnapshot> {
        self.store
            .get_document_txn(self.txn, document_id)?
            .ok_or_else(|| DomainError::not_found("Document", document_id))
    }
}

/// Acting-user context stamped onto every mutation
#[derive(Debug, Clone)]
pub struct ActionMetadata {
    pub user_id: String,
    pub timestamp: i64,
}

impl ActionMetadata {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            timestamp: shared::util::now_millis(),
        }
    }
}
