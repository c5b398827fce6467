//! Transit back-office core
//!
//! Document financial lifecycle and reconciliation engine for a
//! freight-forwarding office:
//!
//! - **documents**: Devis → OrdreTravail → Facture lifecycle, tax
//!   arithmetic, numbering, payments, cancellation and refunds
//! - **caisse**: append-only cash/bank ledger with derived balances
//! - **credit**: bank-credit amortization schedules and reimbursements
//! - **fiscal**: monthly tax accrual with closed-period freezing
//! - **primes**: idempotent payout reconciliation against the external
//!   OPS/CNV operations databases
//!
//! # Module structure
//!
//! ```text
//! transit-core/src/
//! ├── config.rs      # env-backed configuration, tax-rate snapshots
//! ├── logging.rs     # tracing bootstrap
//! ├── audit.rs       # fire-and-forget audit sink
//! ├── error.rs       # domain error taxonomy
//! ├── storage.rs     # redb tables and transactional helpers
//! ├── documents/     # aggregates lifecycle (actions + manager)
//! ├── caisse/        # cash ledger
//! ├── credit/        # amortization
//! ├── fiscal/        # monthly tax accrual
//! └── primes/        # external reconciliation
//! ```
//!
//! Transport (HTTP routing), authentication and rendering (PDF/CSV,
//! email) live outside this crate and consume the managers re-exported
//! below.

pub mod audit;
pub mod caisse;
pub mod config;
pub mod credit;
pub mod documents;
pub mod error;
pub mod fiscal;
pub mod logging;
pub mod primes;
pub mod storage;

pub use audit::{AuditAction, AuditEntry, AuditSink, TracingAuditSink};
pub use caisse::CaisseManager;
pub use config::{Config, TauxSnapshot};
pub use credit::{CreditInput, CreditManager};
pub use documents::DocumentsManager;
pub use error::{DomainError, DomainResult, ErrorCode};
pub use fiscal::FiscalManager;
pub use logging::{init_logger, init_logger_with_level};
pub use primes::{DecaissementInput, HttpPrimeSource, PrimeReconciler, PrimeSource};
pub use storage::OfficeStore;

use shared::prime::PrimeSystem;
use std::sync::Arc;
use std::time::Duration;

/// One assembled back-office: the shared store plus every manager
pub struct BackOffice {
    pub config: Config,
    pub store: OfficeStore,
    pub documents: DocumentsManager,
    pub caisse: CaisseManager,
    pub credits: CreditManager,
    pub fiscal: FiscalManager,
    pub primes: PrimeReconciler,
}

impl BackOffice {
    /// Open (or create) the office database and wire every manager to
    /// it, with HTTP prime sources from the configuration
    pub fn open(config: Config) -> DomainResult<Self> {
        let store = OfficeStore::open(config.db_path())?;
        let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
        let timeout = Duration::from_millis(config.prime_timeout_ms);
        let primes = PrimeReconciler::new(store.clone(), audit.clone())
            .with_source(
                PrimeSystem::Ops,
                Arc::new(HttpPrimeSource::new(config.ops_base_url.clone(), timeout)),
            )
            .with_source(
                PrimeSystem::Cnv,
                Arc::new(HttpPrimeSource::new(config.cnv_base_url.clone(), timeout)),
            );
        Ok(Self {
            documents: DocumentsManager::new(store.clone(), audit.clone()),
            caisse: CaisseManager::new(store.clone(), audit.clone()),
            credits: CreditManager::new(store.clone(), audit.clone()),
            fiscal: FiscalManager::new(store.clone(), audit),
            primes,
            store,
            config,
        })
    }
}
