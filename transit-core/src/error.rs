//! Domain error taxonomy
//!
//! Every operation validates before its first write; once a write
//! transaction is open the only exits are full commit or full rollback
//! (the transaction is dropped uncommitted on any error path).

use crate::storage::StorageError;
use thiserror::Error;

/// Stable error codes surfaced to callers (the transport layer maps
/// them to HTTP statuses; the engine never does)
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Validation,
    Conflict,
    NotFound,
    ExternalUnavailable,
    InternalError,
}

/// Domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    // ========== Validation ==========
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    // ========== Domain conflicts ==========
    #[error("Illegal transition from {current} to {requested}")]
    IllegalTransition { current: String, requested: String },

    #[error("Document {numero} is locked in status {statut}")]
    DocumentLocked { numero: String, statut: String },

    #[error("Payment exceeds outstanding amount (reste à payer: {reste_a_payer:.2})")]
    Overpayment { reste_a_payer: f64 },

    #[error("Allocations ({allocated:.2}) do not match announced total ({announced:.2})")]
    AllocationMismatch { announced: f64, allocated: f64 },

    #[error("Refund exceeds refundable amount (remboursable: {remboursable:.2})")]
    RefundExceedsPaid { remboursable: f64 },

    #[error("Facture {numero} is already cancelled")]
    AlreadyCancelled { numero: String },

    #[error("Document {numero} has already been converted")]
    AlreadyConverted { numero: String },

    #[error("Prime already decaissée (reference {reference})")]
    AlreadyDecaisse { reference: String },

    #[error("Period {mois:02}/{annee} is closed")]
    PeriodClosed { annee: u32, mois: u32 },

    #[error("Insufficient balance (current: {balance:.2})")]
    InsufficientBalance { balance: f64 },

    #[error("Category '{categorie}' is system-owned")]
    SystemCategory { categorie: String },

    // ========== Not found ==========
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    // ========== External systems ==========
    #[error("External system {system} unavailable: {reason}")]
    ExternalUnavailable { system: &'static str, reason: String },

    // ========== Storage / internal ==========
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DomainError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            reason: reason.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        DomainError::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Stable classification for callers
    pub fn code(&self) -> ErrorCode {
        match self {
            DomainError::Validation { .. } => ErrorCode::Validation,
            DomainError::IllegalTransition { .. }
            | DomainError::DocumentLocked { .. }
            | DomainError::Overpayment { .. }
            | DomainError::AllocationMismatch { .. }
            | DomainError::RefundExceedsPaid { .. }
            | DomainError::AlreadyCancelled { .. }
            | DomainError::AlreadyConverted { .. }
            | DomainError::AlreadyDecaisse { .. }
            | DomainError::PeriodClosed { .. }
            | DomainError::InsufficientBalance { .. }
            | DomainError::SystemCategory { .. } => ErrorCode::Conflict,
            DomainError::NotFound { .. } => ErrorCode::NotFound,
            DomainError::ExternalUnavailable { .. } => ErrorCode::ExternalUnavailable,
            DomainError::Storage(_) => ErrorCode::InternalError,
        }
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
