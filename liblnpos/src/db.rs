//! Database operations for lnpos
//!
//! The SQLite ledger is the durable record of every transaction. Filterable
//! fields live in their own columns; the full transaction is stored as JSON
//! in the `record` column and is what reads deserialize.

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use std::path::Path;

use crate::error::{DbError, Result};
use crate::types::{Transaction, TransactionStatus, TransactionType};

/// Filters for querying the transaction ledger
///
/// All fields are optional; an empty query matches everything, newest first.
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    /// Unix seconds, inclusive
    pub since: Option<i64>,
    /// Unix seconds, inclusive
    pub until: Option<i64>,
    /// Substring match on the memo
    pub search: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Aggregate figures over the whole ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_transactions: i64,
    pub lightning_count: i64,
    pub external_count: i64,
    pub standalone_count: i64,
    pub with_rewards_count: i64,
    pub total_rewards_distributed: i64,
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Create a new database connection
    pub async fn new(db_path: &str) -> Result<Self> {
        // Expand path and create parent directories
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
        }

        // Create connection pool
        // Use forward slashes for SQLite URL (works on both Windows and Unix)
        // Use mode=rwc to allow creating the database file if it doesn't exist
        let db_url = format!("sqlite://{}?mode=rwc", expanded_path.replace('\\', "/"));

        let pool = SqlitePool::connect(&db_url)
            .await
            .map_err(DbError::SqlxError)?;

        // Run migrations
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    /// Insert a transaction
    pub async fn insert_transaction(&self, transaction: &Transaction) -> Result<()> {
        let record = serde_json::to_string(transaction).map_err(DbError::EncodingError)?;

        sqlx::query(
            r#"
            INSERT INTO transactions
                (id, created_at, transaction_type, payment_method, status,
                 sat_amount, merchant_username, memo, reward_amount, record)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transaction.id)
        .bind(transaction.timestamp.timestamp())
        .bind(transaction.transaction_type.as_str())
        .bind(transaction.payment_method.map(|m| m.as_str()))
        .bind(transaction.status.as_str())
        .bind(transaction.amount.sat_amount)
        .bind(&transaction.merchant.username)
        .bind(&transaction.memo)
        .bind(transaction.reward.as_ref().map(|r| r.reward_amount))
        .bind(&record)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(())
    }

    /// Update the status of a transaction
    ///
    /// Rewrites the stored record as well as the status column so the two
    /// never diverge. Returns false when the id is unknown.
    pub async fn update_transaction_status(
        &self,
        id: &str,
        status: TransactionStatus,
    ) -> Result<bool> {
        let Some(mut transaction) = self.get_transaction(id).await? else {
            return Ok(false);
        };

        transaction.status = status;
        let record = serde_json::to_string(&transaction).map_err(DbError::EncodingError)?;

        let result = sqlx::query(
            r#"
            UPDATE transactions SET status = ?, record = ? WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(&record)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a transaction by ID
    pub async fn get_transaction(&self, id: &str) -> Result<Option<Transaction>> {
        use sqlx::Row;

        let row = sqlx::query(
            r#"
            SELECT record FROM transactions WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        match row {
            Some(r) => {
                let record: String = r.get("record");
                let transaction =
                    serde_json::from_str(&record).map_err(DbError::EncodingError)?;
                Ok(Some(transaction))
            }
            None => Ok(None),
        }
    }

    /// Delete a transaction by ID, returning whether a row was removed
    pub async fn remove_transaction(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM transactions WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every transaction, returning how many were removed
    pub async fn clear_transactions(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM transactions
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(result.rows_affected())
    }

    /// Query transactions, newest first
    ///
    /// Rows inserted within the same second come back in reverse insertion
    /// order thanks to the rowid tiebreak.
    pub async fn query_transactions(&self, query: &TransactionQuery) -> Result<Vec<Transaction>> {
        use sqlx::Row;

        // Build the WHERE clause dynamically
        let mut where_clauses = vec!["1=1"];

        if query.transaction_type.is_some() {
            where_clauses.push("transaction_type = ?");
        }
        if query.status.is_some() {
            where_clauses.push("status = ?");
        }
        if query.since.is_some() {
            where_clauses.push("created_at >= ?");
        }
        if query.until.is_some() {
            where_clauses.push("created_at <= ?");
        }
        if query.search.is_some() {
            where_clauses.push("memo LIKE ?");
        }

        let where_clause = where_clauses.join(" AND ");

        let query_str = format!(
            r#"
            SELECT record
            FROM transactions
            WHERE {}
            ORDER BY created_at DESC, rowid DESC
            LIMIT ? OFFSET ?
            "#,
            where_clause
        );

        let mut sql_query = sqlx::query(&query_str);

        // Bind parameters in the same order as WHERE clauses
        if let Some(transaction_type) = query.transaction_type {
            sql_query = sql_query.bind(transaction_type.as_str());
        }
        if let Some(status) = query.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(since) = query.since {
            sql_query = sql_query.bind(since);
        }
        if let Some(until) = query.until {
            sql_query = sql_query.bind(until);
        }
        if let Some(search) = &query.search {
            sql_query = sql_query.bind(format!("%{}%", search));
        }

        // LIMIT -1 means no limit in SQLite
        let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
        let offset = query.offset.unwrap_or(0) as i64;
        sql_query = sql_query.bind(limit).bind(offset);

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            let record: String = row.get("record");
            let transaction: Transaction =
                serde_json::from_str(&record).map_err(DbError::EncodingError)?;
            transactions.push(transaction);
        }

        Ok(transactions)
    }

    /// The newest `limit` transactions
    pub async fn recent_transactions(&self, limit: usize) -> Result<Vec<Transaction>> {
        self.query_transactions(&TransactionQuery {
            limit: Some(limit),
            ..Default::default()
        })
        .await
    }

    /// Count transactions matching the query, ignoring limit and offset
    pub async fn count_transactions(&self, query: &TransactionQuery) -> Result<i64> {
        use sqlx::Row;

        let mut where_clauses = vec!["1=1"];

        if query.transaction_type.is_some() {
            where_clauses.push("transaction_type = ?");
        }
        if query.status.is_some() {
            where_clauses.push("status = ?");
        }
        if query.since.is_some() {
            where_clauses.push("created_at >= ?");
        }
        if query.until.is_some() {
            where_clauses.push("created_at <= ?");
        }
        if query.search.is_some() {
            where_clauses.push("memo LIKE ?");
        }

        let query_str = format!(
            r#"
            SELECT COUNT(*) as count FROM transactions WHERE {}
            "#,
            where_clauses.join(" AND ")
        );

        let mut sql_query = sqlx::query(&query_str);

        if let Some(transaction_type) = query.transaction_type {
            sql_query = sql_query.bind(transaction_type.as_str());
        }
        if let Some(status) = query.status {
            sql_query = sql_query.bind(status.as_str());
        }
        if let Some(since) = query.since {
            sql_query = sql_query.bind(since);
        }
        if let Some(until) = query.until {
            sql_query = sql_query.bind(until);
        }
        if let Some(search) = &query.search {
            sql_query = sql_query.bind(format!("%{}%", search));
        }

        let row = sql_query
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        Ok(row.get("count"))
    }

    /// Aggregate counts and reward totals over the whole ledger
    pub async fn ledger_stats(&self) -> Result<LedgerStats> {
        use sqlx::Row;

        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) as total_transactions,
                COALESCE(SUM(CASE WHEN transaction_type = 'lightning' THEN 1 ELSE 0 END), 0)
                    as lightning_count,
                COALESCE(SUM(CASE WHEN transaction_type = 'rewards-only' THEN 1 ELSE 0 END), 0)
                    as external_count,
                COALESCE(SUM(CASE WHEN transaction_type = 'standalone' THEN 1 ELSE 0 END), 0)
                    as standalone_count,
                COALESCE(SUM(CASE WHEN reward_amount > 0 THEN 1 ELSE 0 END), 0)
                    as with_rewards_count,
                COALESCE(SUM(COALESCE(reward_amount, 0)), 0)
                    as total_rewards_distributed
            FROM transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(LedgerStats {
            total_transactions: row.get("total_transactions"),
            lightning_count: row.get("lightning_count"),
            external_count: row.get("external_count"),
            standalone_count: row.get("standalone_count"),
            with_rewards_count: row.get("with_rewards_count"),
            total_rewards_distributed: row.get("total_rewards_distributed"),
        })
    }
}
