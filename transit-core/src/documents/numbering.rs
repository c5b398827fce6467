//! Per-type, per-year document numbering
//!
//! Numbers follow `{PREFIX}-{YEAR}-{4-digit-seq}` (DEV-2025-0001).
//! Allocation bumps a counter row inside the caller's write transaction,
//! so the number commits atomically with the document it belongs to and
//! concurrent writers cannot observe or reuse the same suffix.

use crate::error::{DomainError, DomainResult};
use crate::storage::OfficeStore;
use redb::WriteTransaction;
use shared::document::DocumentKind;

/// Prefix reserved for credit notes issued against cancelled invoices
pub const PREFIX_CREDIT_NOTE: &str = "CRD";

/// Format a document number
pub fn format_numero(prefix: &str, year: u32, seq: u32) -> String {
    format!("{prefix}-{year}-{seq:04}")
}

/// Allocate the next numero for a document kind within `txn`
pub fn next_numero(
    store: &OfficeStore,
    txn: &WriteTransaction,
    kind: DocumentKind,
    year: u32,
) -> DomainResult<String> {
    next_numero_with_prefix(store, txn, kind.prefix(), year)
}

/// Allocate the next numero for an explicit prefix within `txn`
pub fn next_numero_with_prefix(
    store: &OfficeStore,
    txn: &WriteTransaction,
    prefix: &str,
    year: u32,
) -> DomainResult<String> {
    let seq = store.next_sequence(txn, prefix, year)?;
    Ok(format_numero(prefix, year, seq))
}

/// Parse a numero back into (prefix, year, seq)
pub fn parse_numero(numero: &str) -> DomainResult<(String, u32, u32)> {
    let mut parts = numero.rsplitn(3, '-');
    let seq = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| DomainError::validation("numero", format!("malformed: {numero}")))?;
    let year = parts
        .next()
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or_else(|| DomainError::validation("numero", format!("malformed: {numero}")))?;
    let prefix = parts
        .next()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| DomainError::validation("numero", format!("malformed: {numero}")))?;
    Ok((prefix.to_string(), year, seq))
}
