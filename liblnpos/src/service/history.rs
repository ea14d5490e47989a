//! History service for querying and maintaining the transaction ledger
//!
//! This module provides flexible querying of the ledger plus the mutations
//! that keep the database and the bounded in-memory history in step.

use std::sync::{Arc, RwLock};
use tracing::info;

use super::events::{Event, EventBus};
use crate::db::{LedgerStats, TransactionQuery};
use crate::history::{HistoryStatistics, TransactionHistory};
use crate::types::{Transaction, TransactionStatus};
use crate::{Database, Result};

/// History service
///
/// Queries go to the database, which holds the full ledger. The bounded
/// in-memory history only tracks the newest window for till display, so
/// every mutation here updates both.
#[derive(Clone)]
pub struct HistoryService {
    db: Arc<Database>,
    history: Arc<RwLock<TransactionHistory>>,
    event_bus: EventBus,
}

impl HistoryService {
    /// Create a new history service
    pub fn new(
        db: Arc<Database>,
        history: Arc<RwLock<TransactionHistory>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            history,
            event_bus,
        }
    }

    /// List transactions with filtering and pagination, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        self.db.query_transactions(query).await
    }

    /// Get a single transaction by ID
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        self.db.get_transaction(id).await
    }

    /// Count transactions matching the query, ignoring pagination
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_transactions(&self, query: &TransactionQuery) -> Result<i64> {
        self.db.count_transactions(query).await
    }

    /// Change a transaction's status
    ///
    /// Returns false if the transaction does not exist. A change to
    /// completed promotes the transaction to the most recent sale.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn update_status(&self, id: &str, status: TransactionStatus) -> Result<bool> {
        let updated = self.db.update_transaction_status(id, status).await?;

        if updated {
            self.history.write().unwrap().update_status(id, status);
            info!("Transaction {} is now {}", id, status);
            self.event_bus.emit(Event::TransactionStatusChanged {
                transaction_id: id.to_string(),
                status,
            });
        }

        Ok(updated)
    }

    /// Remove a transaction from the ledger
    ///
    /// Returns false if the transaction does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn remove_transaction(&self, id: &str) -> Result<bool> {
        let removed = self.db.remove_transaction(id).await?;

        if removed {
            self.history.write().unwrap().remove(id);
            info!("Removed transaction {}", id);
            self.event_bus.emit(Event::TransactionRemoved {
                transaction_id: id.to_string(),
            });
        }

        Ok(removed)
    }

    /// Clear the whole ledger
    ///
    /// Returns how many transactions were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database write fails.
    pub async fn clear(&self) -> Result<u64> {
        let removed = self.db.clear_transactions().await?;
        self.history.write().unwrap().clear();

        info!("Cleared transaction history ({} transactions)", removed);
        self.event_bus.emit(Event::HistoryCleared { removed });

        Ok(removed)
    }

    /// Statistics over the full ledger
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn ledger_stats(&self) -> Result<LedgerStats> {
        self.db.ledger_stats().await
    }

    /// Snapshot of the in-memory window, newest first
    pub fn recent(&self) -> Vec<Transaction> {
        self.history.read().unwrap().transactions().to_vec()
    }

    /// The most recent completed sale, if any
    pub fn last_transaction(&self) -> Option<Transaction> {
        self.history.read().unwrap().last_transaction().cloned()
    }

    /// Statistics over the in-memory window only
    pub fn recent_stats(&self) -> HistoryStatistics {
        self.history.read().unwrap().statistics()
    }
}
