//! External prime reconciliation
//!
//! Primes are paid upstream by the OPS/CNV systems; this module pays
//! them out locally (décaissement) exactly once. Reconciliation state
//! is derived, never written upstream: a ledger movement whose
//! reference is `{SYSTEM}-PRIME-{id}` means "already decaissée".
//!
//! Listings degrade gracefully when an upstream is unreachable (stale
//! or empty snapshot, `degraded` flag); payouts never do — they
//! re-validate against the live source and hard-fail on unavailability.

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::error::{DomainError, DomainResult};
use crate::primes::cache::PrimeCache;
use crate::primes::source::{PrimeSource, SourceError};
use crate::storage::OfficeStore;
use shared::caisse::{MouvementCaisse, MouvementType, SourceCaisse};
use shared::prime::{prime_reference, ExternalPrime, PrimeListing, PrimePendingView, PrimeSystem};
use shared::util::{now_millis, snowflake_id};
use std::collections::HashMap;
use std::sync::Arc;

/// Payout parameters
#[derive(Debug, Clone, Default)]
pub struct DecaissementInput {
    pub banque_id: Option<String>,
    pub source: SourceCaisse,
    pub note: Option<String>,
}

pub struct PrimeReconciler {
    store: OfficeStore,
    audit: Arc<dyn AuditSink>,
    sources: HashMap<PrimeSystem, Arc<dyn PrimeSource>>,
    cache: PrimeCache,
}

impl PrimeReconciler {
    pub fn new(store: OfficeStore, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            store,
            audit,
            sources: HashMap::new(),
            cache: PrimeCache::new(),
        }
    }

    pub fn with_source(mut self, system: PrimeSystem, source: Arc<dyn PrimeSource>) -> Self {
        self.sources.insert(system, source);
        self
    }

    fn source(&self, system: PrimeSystem) -> DomainResult<&Arc<dyn PrimeSource>> {
        self.sources
            .get(&system)
            .ok_or_else(|| DomainError::ExternalUnavailable {
                system: system.code(),
                reason: "no source configured".to_string(),
            })
    }

    /// Refresh the local snapshot from upstream
    pub async fn refresh(&self, system: PrimeSystem) -> DomainResult<usize> {
        let primes = self
            .source(system)?
            .fetch_paid_primes()
            .await
            .map_err(|e| unavailable(system, e))?;
        let count = primes.len();
        self.cache.put(system, primes);
        tracing::debug!(system = system.code(), count, "Prime snapshot refreshed");
        Ok(count)
    }

    /// Paid-upstream primes with their local payout state.
    ///
    /// Tries a refresh first; when the upstream is unreachable the
    /// listing degrades to the last snapshot (or an empty one) with
    /// `degraded = true` instead of propagating the connection error.
    pub async fn list_pending(&self, system: PrimeSystem) -> DomainResult<PrimeListing> {
        let source = self.source(system)?;
        let degraded = match source.fetch_paid_primes().await {
            Ok(primes) => {
                self.cache.put(system, primes);
                false
            }
            Err(error) => {
                tracing::warn!(
                    system = system.code(),
                    error = %error,
                    "Upstream unreachable, listing primes from stale snapshot"
                );
                true
            }
        };

        let cached = self.cache.get(system);
        let mut primes = Vec::new();
        if let Some(cached) = &cached {
            for prime in &cached.primes {
                if !prime.est_payee() {
                    continue;
                }
                let reference = prime_reference(system, prime.prime_id);
                primes.push(PrimePendingView {
                    prime: prime.clone(),
                    decaisse: self.store.reference_lookup(&reference)?.is_some(),
                });
            }
        }
        Ok(PrimeListing {
            system,
            primes,
            degraded,
            refreshed_at: cached.map(|c| c.refreshed_at),
        })
    }

    /// Pay out one upstream-paid prime, exactly once.
    ///
    /// Re-validates the prime against the live source (hard-fails on
    /// unavailability), then claims the deterministic reference and
    /// writes the Sortie movement in one transaction.
    pub async fn decaisser(
        &self,
        system: PrimeSystem,
        prime_id: i64,
        input: DecaissementInput,
        user_id: &str,
    ) -> DomainResult<MouvementCaisse> {
        let prime = self
            .source(system)?
            .fetch_prime(prime_id)
            .await
            .map_err(|e| unavailable(system, e))?
            .ok_or_else(|| DomainError::not_found("Prime", prime_id.to_string()))?;
        if !prime.est_payee() {
            return Err(DomainError::validation(
                "prime",
                format!("prime {prime_id} is not in paid state upstream ({})", prime.statut),
            ));
        }

        let mouvement = self.enregistrer_decaissement(system, &prime, &input, user_id)?;

        tracing::info!(
            system = system.code(),
            prime_id,
            montant = mouvement.montant,
            reference = mouvement.reference.as_deref().unwrap_or_default(),
            "Prime decaissée"
        );
        self.audit.record(
            AuditEntry::new(
                AuditAction::PrimeDecaissee,
                "mouvement",
                mouvement.mouvement_id.to_string(),
            )
            .with_summary(format!(
                "Décaissement prime {} {prime_id} — {:.2} pour {}",
                system.code(),
                mouvement.montant,
                prime.beneficiaire
            ))
            .with_user(user_id),
        );
        Ok(mouvement)
    }

    /// Transactional payout write: claim the reference, then insert the
    /// movement. Write transactions serialize, so of two concurrent
    /// payouts for the same prime exactly one claims the reference and
    /// the other fails with "already decaissée".
    pub(crate) fn enregistrer_decaissement(
        &self,
        system: PrimeSystem,
        prime: &ExternalPrime,
        input: &DecaissementInput,
        user_id: &str,
    ) -> DomainResult<MouvementCaisse> {
        let reference = prime_reference(system, prime.prime_id);
        let mouvement = MouvementCaisse {
            mouvement_id: snowflake_id(),
            mouvement_type: MouvementType::Sortie,
            categorie: system.categorie_caisse().to_string(),
            montant: prime.montant,
            reference: Some(reference.clone()),
            banque_id: input.banque_id.clone(),
            source: input.source,
            date_mouvement: now_millis(),
            user_id: user_id.to_string(),
            note: input.note.clone(),
        };

        let txn = self.store.begin_write()?;
        if !self
            .store
            .claim_reference(&txn, &reference, mouvement.mouvement_id)?
        {
            return Err(DomainError::AlreadyDecaisse { reference });
        }
        self.store.store_mouvement(&txn, &mouvement)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;
        Ok(mouvement)
    }

    /// Availability probe for one upstream system
    pub async fn probe(&self, system: PrimeSystem) -> DomainResult<()> {
        self.source(system)?
            .probe()
            .await
            .map_err(|e| unavailable(system, e))
    }
}

fn unavailable(system: PrimeSystem, error: SourceError) -> DomainError {
    DomainError::ExternalUnavailable {
        system: system.code(),
        reason: error.to_string(),
    }
}
