//! Audit event emission
//!
//! The engine emits one structured entry per state-changing operation.
//! Delivery is fire-and-forget: sinks must never fail the operation
//! that produced the entry. The default sink writes structured tracing
//! events on the dedicated `audit` target; deployments wire their own
//! sink (database, message bus) behind the same trait.

use serde::Serialize;

/// Types of auditable actions
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    // Document lifecycle
    DocumentCreated,
    LignesReplaced,
    StatusChanged,
    DocumentConverted,

    // Payments
    PaymentApplied,
    PaymentDeleted,

    // Cancellation
    FactureCancelled,
    FactureRefunded,

    // Ledger
    MouvementRecorded,
    MouvementDeleted,

    // Credits
    CreditCreated,
    CreditReimbursed,

    // Monthly taxes
    MonthRecalculated,
    MonthClosed,
    MonthReopened,

    // External reconciliation
    PrimeDecaissee,
}

/// One audit entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub action: AuditAction,
    /// Entity type ("document", "mouvement", "credit", ...)
    pub entity: &'static str,
    pub entity_id: String,
    /// Free-text summary shown in the audit journal
    pub summary: String,
    pub user_id: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity: &'static str, entity_id: impl Into<String>) -> Self {
        Self {
            action,
            entity,
            entity_id: entity_id.into(),
            summary: String::new(),
            user_id: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Audit delivery endpoint
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

/// Default sink: structured tracing events on the `audit` target
#[derive(Debug, Default, Clone)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        tracing::info!(
            target: "audit",
            action = ?entry.action,
            entity = entry.entity,
            entity_id = %entry.entity_id,
            user_id = entry.user_id.as_deref().unwrap_or("system"),
            "{}",
            entry.summary
        );
    }
}

/// Discarding sink for tests
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct NullAuditSink;

#[cfg(test)]
impl AuditSink for NullAuditSink {
    fn record(&self, _entry: AuditEntry) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CollectingSink {
        entries: Mutex<Vec<AuditEntry>>,
    }

    impl AuditSink for CollectingSink {
        fn record(&self, entry: AuditEntry) {
            self.entries.lock().unwrap().push(entry);
        }
    }

    #[test]
    fn test_builder_style_entry() {
        let sink = CollectingSink::default();
        sink.record(
            AuditEntry::new(AuditAction::PaymentApplied, "document", "doc-1")
                .with_summary("Paiement de 500000 sur FAC-2025-0001")
                .with_user("u1"),
        );
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AuditAction::PaymentApplied);
        assert_eq!(entries[0].user_id.as_deref(), Some("u1"));
    }
}
