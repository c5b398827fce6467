//! Cash/bank ledger
//!
//! Append-only movement log. The running balance is derived on read
//! (Σ Entrées − Σ Sorties over the scoped movements), never stored.
//! Movements emitted by other flows (invoice payments, refunds, prime
//! payouts) belong to system-owned categories: callers can neither
//! record nor delete them here — they are reversed only through their
//! owning flow.

use crate::audit::{AuditAction, AuditEntry, AuditSink};
use crate::documents::money::{to_decimal, to_f64, validate_montant};
use crate::error::{DomainError, DomainResult};
use crate::storage::OfficeStore;
use rust_decimal::Decimal;
use shared::caisse::{
    is_system_category, MouvementCaisse, MouvementFilter, MouvementInput, MouvementType,
};
use shared::util::{now_millis, snowflake_id};
use std::sync::Arc;

pub struct CaisseManager {
    store: OfficeStore,
    audit: Arc<dyn AuditSink>,
}

impl CaisseManager {
    pub fn new(store: OfficeStore, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    /// Record a caller-facing movement. Sorties are rejected when they
    /// exceed the current balance of the targeted source.
    pub fn enregistrer_mouvement(
        &self,
        input: MouvementInput,
        user_id: &str,
    ) -> DomainResult<MouvementCaisse> {
        if input.categorie.trim().is_empty() {
            return Err(DomainError::validation("categorie", "must not be empty"));
        }
        if is_system_category(&input.categorie) {
            return Err(DomainError::SystemCategory {
                categorie: input.categorie.clone(),
            });
        }
        validate_montant(input.montant, "montant")?;

        let txn = self.store.begin_write()?;
        // Balance check inside the transaction: redb writers serialize,
        // so two Sorties cannot both pass against the same balance
        if input.mouvement_type == MouvementType::Sortie {
            let filter = MouvementFilter {
                source: Some(input.source),
                ..Default::default()
            };
            let balance = balance_of(&self.store.list_mouvements_txn(&txn)?, &filter);
            if to_decimal(input.montant) > balance {
                return Err(DomainError::InsufficientBalance {
                    balance: to_f64(balance),
                });
            }
        }

        let mouvement = MouvementCaisse {
            mouvement_id: snowflake_id(),
            mouvement_type: input.mouvement_type,
            categorie: input.categorie.trim().to_string(),
            montant: input.montant,
            reference: None,
            banque_id: input.banque_id,
            source: input.source,
            date_mouvement: now_millis(),
            user_id: user_id.to_string(),
            note: input.note,
        };
        self.store.store_mouvement(&txn, &mouvement)?;
        txn.commit().map_err(crate::storage::StorageError::from)?;

        tracing::info!(
            mouvement_id = mouvement.mouvement_id,
            categorie = %mouvement.categorie,
            montant = mouvement.montant,
            "Movement recorded"
        );
        self.audit.record(
            AuditEntry::new(
                AuditAction::MouvementRecorded,
                "mouvement",
                mouvement.mouvement_id.to_string(),
            )
            .with_summary(format!(
                "{} {:.2} ({})",
                match mouvement.mouvement_type {
                    MouvementType::Entree => "Entrée",
                    MouvementType::Sortie => "Sortie",
                },
                mouvement.montant,
                mouvement.categorie
            ))
            .with_user(user_id),
        );
        Ok(mouvement)
    }

    /// Delete a caller-recorded movement. System-owned movements are
    /// only removed as a side effect of their owning flow.
    pub fn supprimer_mouvement(&self, mouvement_id: i64, user_id: &str) -> DomainResult<()> {
        let mouvement = self
            .store
            .get_mouvement(mouvement_id)?
            .ok_or_else(|| DomainError::not_found("Mouvement", mouvement_id.to_string()))?;
        if is_system_category(&mouvement.categorie) {
            return Err(DomainError::SystemCategory {
                categorie: mouvement.categorie.clone(),
            });
        }

        let txn = self.store.begin_write()?;
        self.store.remove_mouvement(&txn, mouvement_id)?;
        if let Some(reference) = &mouvement.reference {
            self.store.release_reference(&txn, reference)?;
        }
        txn.commit().map_err(crate::storage::StorageError::from)?;

        self.audit.record(
            AuditEntry::new(
                AuditAction::MouvementDeleted,
                "mouvement",
                mouvement_id.to_string(),
            )
            .with_summary(format!(
                "Suppression {:.2} ({})",
                mouvement.montant, mouvement.categorie
            ))
            .with_user(user_id),
        );
        Ok(())
    }

    /// Movements matching the filter, newest first
    pub fn list_mouvements(&self, filter: &MouvementFilter) -> DomainResult<Vec<MouvementCaisse>> {
        let mut mouvements: Vec<MouvementCaisse> = self
            .store
            .list_mouvements()?
            .into_iter()
            .filter(|m| filter.matches(m))
            .collect();
        mouvements.sort_by_key(|m| std::cmp::Reverse(m.date_mouvement));
        Ok(mouvements)
    }

    /// Running balance over the scoped movements, computed on read
    pub fn balance(&self, filter: &MouvementFilter) -> DomainResult<f64> {
        Ok(to_f64(balance_of(&self.store.list_mouvements()?, filter)))
    }
}

/// Σ Entrées − Σ Sorties over the movements matching `filter`
fn balance_of(mouvements: &[MouvementCaisse], filter: &MouvementFilter) -> Decimal {
    mouvements
        .iter()
        .filter(|m| filter.matches(m))
        .map(|m| match m.mouvement_type {
            MouvementType::Entree => to_decimal(m.montant),
            MouvementType::Sortie => -to_decimal(m.montant),
        })
        .sum()
}
