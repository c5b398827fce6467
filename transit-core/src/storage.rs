//! redb-based storage layer for the back-office
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `documents` | `document_id` | `DocumentSnapshot` | Devis/OT/Facture aggregates |
//! | `numeros` | `numero` | `document_id` | Document-number uniqueness + lookup |
//! | `sequences` | `(prefix, year)` | `u32` | Per-type, per-year numbering counters |
//! | `mouvements` | `mouvement_id` | `MouvementCaisse` | Cash/bank ledger (append-only) |
//! | `mouvement_refs` | `reference` | `mouvement_id` | Idempotency keys (payments, primes) |
//! | `credits` | `credit_id` | `CreditBancaire` | Bank credits with embedded schedule |
//! | `taxes_mensuelles` | `(annee, mois, taxe)` | `TaxeMensuelle` | Monthly tax accrual rows |
//!
//! # Concurrency
//!
//! redb write transactions serialize. Sequence allocation and
//! reference/numero claims happen inside the same transaction as the
//! rows that depend on them, so numbering is monotonic and idempotency
//! keys admit at most one winner even under concurrent writers.
//!
//! # Durability
//!
//! Commits are persistent as soon as `commit()` returns (copy-on-write
//! with atomic pointer swap), which keeps the file consistent across
//! power loss on the office machines this runs on.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use shared::caisse::MouvementCaisse;
use shared::credit::CreditBancaire;
use shared::document::DocumentSnapshot;
use shared::fiscal::{TaxeMensuelle, TypeTaxe};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Document aggregates: key = document_id, value = JSON snapshot
const DOCUMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// Numero uniqueness and reverse lookup: key = numero, value = document_id
const NUMEROS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("numeros");

/// Numbering counters: key = (prefix, year), value = last allocated suffix
const SEQUENCES_TABLE: TableDefinition<(&str, u32), u32> = TableDefinition::new("sequences");

/// Ledger movements: key = snowflake id, value = JSON movement
const MOUVEMENTS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("mouvements");

/// Idempotency keys: key = reference, value = owning mouvement_id
const REFERENCES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("mouvement_refs");

/// Bank credits: key = credit_id, value = JSON credit
const CREDITS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("credits");

/// Monthly tax rows: key = (annee, mois, taxe code), value = JSON row
const TAXES_TABLE: TableDefinition<(u32, u32, &str), &[u8]> =
    TableDefinition::new("taxes_mensuelles");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Back-office storage backed by redb
#[derive(Clone)]
pub struct OfficeStore {
    db: Arc<Database>,
}

impl OfficeStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(DOCUMENTS_TABLE)?;
            let _ = write_txn.open_table(NUMEROS_TABLE)?;
            let _ = write_txn.open_table(SEQUENCES_TABLE)?;
            let _ = write_txn.open_table(MOUVEMENTS_TABLE)?;
            let _ = write_txn.open_table(REFERENCES_TABLE)?;
            let _ = write_txn.open_table(CREDITS_TABLE)?;
            let _ = write_txn.open_table(TAXES_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Begin a write transaction (blocks while another writer is active)
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Sequence Operations ==========

    /// Allocate the next suffix for (prefix, year) within the caller's
    /// transaction; the bump commits atomically with the dependent rows
    pub fn next_sequence(&self, txn: &WriteTransaction, prefix: &str, year: u32) -> StorageResult<u32> {
        let mut table = txn.open_table(SEQUENCES_TABLE)?;
        let current = table
            .get((prefix, year))?
            .map(|guard| guard.value())
            .unwrap_or(0);
        let next = current + 1;
        table.insert((prefix, year), next)?;
        Ok(next)
    }

    /// Last allocated suffix for (prefix, year), 0 when none
    pub fn current_sequence(&self, prefix: &str, year: u32) -> StorageResult<u32> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SEQUENCES_TABLE)?;
        Ok(table
            .get((prefix, year))?
            .map(|guard| guard.value())
            .unwrap_or(0))
    }

    // ========== Document Operations ==========

    /// Store (insert or overwrite) a document snapshot
    pub fn store_document(
        &self,
        txn: &WriteTransaction,
        snapshot: &DocumentSnapshot,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(DOCUMENTS_TABLE)?;
        let value = serde_json::to_vec(snapshot)?;
        table.insert(snapshot.document_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Claim a numero for a document; returns false when already taken
    pub fn claim_numero(
        &self,
        txn: &WriteTransaction,
        numero: &str,
        document_id: &str,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(NUMEROS_TABLE)?;
        if table.get(numero)?.is_some() {
            return Ok(false);
        }
        table.insert(numero, document_id)?;
        Ok(true)
    }

    /// Get a document by ID
    pub fn get_document(&self, document_id: &str) -> StorageResult<Option<DocumentSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS_TABLE)?;
        match table.get(document_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a document by ID (within transaction)
    pub fn get_document_txn(
        &self,
        txn: &WriteTransaction,
        document_id: &str,
    ) -> StorageResult<Option<DocumentSnapshot>> {
        let table = txn.open_table(DOCUMENTS_TABLE)?;
        match table.get(document_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look a document up by its numero
    pub fn find_document_by_numero(&self, numero: &str) -> StorageResult<Option<DocumentSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let numeros = read_txn.open_table(NUMEROS_TABLE)?;
        let Some(id_guard) = numeros.get(numero)? else {
            return Ok(None);
        };
        let documents = read_txn.open_table(DOCUMENTS_TABLE)?;
        match documents.get(id_guard.value())? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All document snapshots
    pub fn list_documents(&self) -> StorageResult<Vec<DocumentSnapshot>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS_TABLE)?;
        let mut snapshots = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            snapshots.push(serde_json::from_slice(value.value())?);
        }
        Ok(snapshots)
    }

    /// All document snapshots (within transaction)
    pub fn list_documents_txn(&self, txn: &WriteTransaction) -> StorageResult<Vec<DocumentSnapshot>> {
        let table = txn.open_table(DOCUMENTS_TABLE)?;
        let mut snapshots = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            snapshots.push(serde_json::from_slice(value.value())?);
        }
        Ok(snapshots)
    }

    // ========== Ledger Operations ==========

    /// Store a ledger movement
    pub fn store_mouvement(
        &self,
        txn: &WriteTransaction,
        mouvement: &MouvementCaisse,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(MOUVEMENTS_TABLE)?;
        let value = serde_json::to_vec(mouvement)?;
        table.insert(mouvement.mouvement_id, value.as_slice())?;
        Ok(())
    }

    /// Remove a ledger movement
    pub fn remove_mouvement(&self, txn: &WriteTransaction, mouvement_id: i64) -> StorageResult<()> {
        let mut table = txn.open_table(MOUVEMENTS_TABLE)?;
        table.remove(mouvement_id)?;
        Ok(())
    }

    /// Get a movement by ID
    pub fn get_mouvement(&self, mouvement_id: i64) -> StorageResult<Option<MouvementCaisse>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MOUVEMENTS_TABLE)?;
        match table.get(mouvement_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All ledger movements
    pub fn list_mouvements(&self) -> StorageResult<Vec<MouvementCaisse>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(MOUVEMENTS_TABLE)?;
        let mut mouvements = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            mouvements.push(serde_json::from_slice(value.value())?);
        }
        Ok(mouvements)
    }

    /// All ledger movements (within transaction)
    pub fn list_mouvements_txn(&self, txn: &WriteTransaction) -> StorageResult<Vec<MouvementCaisse>> {
        let table = txn.open_table(MOUVEMENTS_TABLE)?;
        let mut mouvements = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            mouvements.push(serde_json::from_slice(value.value())?);
        }
        Ok(mouvements)
    }

    // ========== Reference Idempotency ==========

    /// Claim an idempotency reference for a movement; returns false when
    /// the reference is already owned (the movement must not be written)
    pub fn claim_reference(
        &self,
        txn: &WriteTransaction,
        reference: &str,
        mouvement_id: i64,
    ) -> StorageResult<bool> {
        let mut table = txn.open_table(REFERENCES_TABLE)?;
        if table.get(reference)?.is_some() {
            return Ok(false);
        }
        table.insert(reference, mouvement_id)?;
        Ok(true)
    }

    /// Release a reference (only as part of deleting its owning movement)
    pub fn release_reference(&self, txn: &WriteTransaction, reference: &str) -> StorageResult<()> {
        let mut table = txn.open_table(REFERENCES_TABLE)?;
        table.remove(reference)?;
        Ok(())
    }

    /// Movement owning a reference, if any
    pub fn reference_lookup(&self, reference: &str) -> StorageResult<Option<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(REFERENCES_TABLE)?;
        Ok(table.get(reference)?.map(|guard| guard.value()))
    }

    /// Movement owning a reference, if any (within transaction)
    pub fn reference_lookup_txn(
        &self,
        txn: &WriteTransaction,
        reference: &str,
    ) -> StorageResult<Option<i64>> {
        let table = txn.open_table(REFERENCES_TABLE)?;
        Ok(table.get(reference)?.map(|guard| guard.value()))
    }

    // ========== Credit Operations ==========

    /// Store (insert or overwrite) a bank credit
    pub fn store_credit(&self, txn: &WriteTransaction, credit: &CreditBancaire) -> StorageResult<()> {
        let mut table = txn.open_table(CREDITS_TABLE)?;
        let value = serde_json::to_vec(credit)?;
        table.insert(credit.credit_id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get a credit by ID
    pub fn get_credit(&self, credit_id: &str) -> StorageResult<Option<CreditBancaire>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDITS_TABLE)?;
        match table.get(credit_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a credit by ID (within transaction)
    pub fn get_credit_txn(
        &self,
        txn: &WriteTransaction,
        credit_id: &str,
    ) -> StorageResult<Option<CreditBancaire>> {
        let table = txn.open_table(CREDITS_TABLE)?;
        match table.get(credit_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All bank credits
    pub fn list_credits(&self) -> StorageResult<Vec<CreditBancaire>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CREDITS_TABLE)?;
        let mut credits = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            credits.push(serde_json::from_slice(value.value())?);
        }
        Ok(credits)
    }

    // ========== Monthly Tax Operations ==========

    /// Store (insert or overwrite) a monthly tax row
    pub fn store_taxe(&self, txn: &WriteTransaction, taxe: &TaxeMensuelle) -> StorageResult<()> {
        let mut table = txn.open_table(TAXES_TABLE)?;
        let value = serde_json::to_vec(taxe)?;
        table.insert(
            (taxe.annee, taxe.mois, taxe.type_taxe.code()),
            value.as_slice(),
        )?;
        Ok(())
    }

    /// Get a monthly tax row
    pub fn get_taxe(
        &self,
        annee: u32,
        mois: u32,
        type_taxe: TypeTaxe,
    ) -> StorageResult<Option<TaxeMensuelle>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TAXES_TABLE)?;
        match table.get((annee, mois, type_taxe.code()))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get a monthly tax row (within transaction)
    pub fn get_taxe_txn(
        &self,
        txn: &WriteTransaction,
        annee: u32,
        mois: u32,
        type_taxe: TypeTaxe,
    ) -> StorageResult<Option<TaxeMensuelle>> {
        let table = txn.open_table(TAXES_TABLE)?;
        match table.get((annee, mois, type_taxe.code()))? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// All tax rows of a year
    pub fn list_taxes(&self, annee: u32) -> StorageResult<Vec<TaxeMensuelle>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TAXES_TABLE)?;
        let mut rows = Vec::new();
        for result in table.range((annee, 0, "")..(annee + 1, 0, ""))? {
            let (_key, value) = result?;
            rows.push(serde_json::from_slice(value.value())?);
        }
        Ok(rows)
    }

    // ========== Statistics ==========

    /// Storage statistics
    pub fn stats(&self) -> StorageResult<StoreStats> {
        let read_txn = self.db.begin_read()?;
        Ok(StoreStats {
            document_count: read_txn.open_table(DOCUMENTS_TABLE)?.len()?,
            mouvement_count: read_txn.open_table(MOUVEMENTS_TABLE)?.len()?,
            credit_count: read_txn.open_table(CREDITS_TABLE)?.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    pub document_count: u64,
    pub mouvement_count: u64,
    pub credit_count: u64,
}
