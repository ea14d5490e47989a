//! Bounded transaction history
//!
//! Keeps the most recent transactions in memory, newest first. The list is
//! bounded; adding past the bound drops the oldest entries. The last
//! completed transaction is tracked separately so it stays available for
//! receipts even after the list turns over.

use serde::{Deserialize, Serialize};

use crate::types::{Transaction, TransactionStatus, TransactionType};

/// Default bound on the in-memory history
pub const DEFAULT_MAX_TRANSACTIONS: usize = 50;

/// Newest-first, bounded list of transactions
#[derive(Debug, Clone)]
pub struct TransactionHistory {
    transactions: Vec<Transaction>,
    last_transaction: Option<Transaction>,
    max_transactions: usize,
}

impl TransactionHistory {
    /// Create an empty history with the default bound
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_TRANSACTIONS)
    }

    /// Create an empty history bounded to `max_transactions` entries
    pub fn with_limit(max_transactions: usize) -> Self {
        Self {
            transactions: Vec::new(),
            last_transaction: None,
            max_transactions,
        }
    }

    /// Rebuild a history from persisted records
    ///
    /// `records` must be newest first. Entries past the bound are dropped
    /// and the last transaction is recovered as the newest completed record.
    pub fn from_records(records: Vec<Transaction>, max_transactions: usize) -> Self {
        let mut transactions = records;
        transactions.truncate(max_transactions);

        let last_transaction = transactions
            .iter()
            .find(|t| t.status == TransactionStatus::Completed)
            .cloned();

        Self {
            transactions,
            last_transaction,
            max_transactions,
        }
    }

    /// Prepend a transaction, dropping the oldest entries past the bound
    ///
    /// A completed transaction becomes the last transaction. Pending and
    /// failed transactions are stored but never tracked as last.
    pub fn add(&mut self, transaction: Transaction) {
        if transaction.status == TransactionStatus::Completed {
            self.last_transaction = Some(transaction.clone());
        }

        self.transactions.insert(0, transaction);
        self.transactions.truncate(self.max_transactions);
    }

    /// Update the status of a transaction by id
    ///
    /// Returns false when no transaction has that id. A transaction moving
    /// to completed becomes the last transaction.
    pub fn update_status(&mut self, id: &str, status: TransactionStatus) -> bool {
        let Some(transaction) = self.transactions.iter_mut().find(|t| t.id == id) else {
            return false;
        };

        transaction.status = status;
        if status == TransactionStatus::Completed {
            self.last_transaction = Some(transaction.clone());
        }

        true
    }

    /// Remove a transaction by id, returning it when found
    ///
    /// Removing the last transaction re-points it at the newest remaining
    /// completed transaction, or clears it when none remain.
    pub fn remove(&mut self, id: &str) -> Option<Transaction> {
        let index = self.transactions.iter().position(|t| t.id == id)?;
        let removed = self.transactions.remove(index);

        let was_last = self
            .last_transaction
            .as_ref()
            .is_some_and(|last| last.id == id);
        if was_last {
            self.last_transaction = self
                .transactions
                .iter()
                .find(|t| t.status == TransactionStatus::Completed)
                .cloned();
        }

        Some(removed)
    }

    /// Drop every transaction and the last-transaction marker
    pub fn clear(&mut self) {
        self.transactions.clear();
        self.last_transaction = None;
    }

    /// Look up a transaction by id
    pub fn get(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.id == id)
    }

    /// All transactions, newest first
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// The most recently completed transaction, if any
    pub fn last_transaction(&self) -> Option<&Transaction> {
        self.last_transaction.as_ref()
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// The bound this history was created with
    pub fn limit(&self) -> usize {
        self.max_transactions
    }

    /// Transactions of one type, newest first
    pub fn of_type(&self, transaction_type: TransactionType) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.transaction_type == transaction_type)
            .collect()
    }

    /// Transactions that actually granted a reward
    ///
    /// A reward summary with a zero amount does not count.
    pub fn with_rewards(&self) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.reward.as_ref().is_some_and(|r| r.reward_amount > 0))
            .collect()
    }

    /// Aggregate counts over the in-memory history
    pub fn statistics(&self) -> HistoryStatistics {
        let mut stats = HistoryStatistics {
            total_transactions: self.transactions.len(),
            ..Default::default()
        };

        for transaction in &self.transactions {
            match transaction.transaction_type {
                TransactionType::Lightning => stats.lightning_count += 1,
                TransactionType::RewardsOnly => stats.external_count += 1,
                TransactionType::Standalone => stats.standalone_count += 1,
            }

            if let Some(reward) = &transaction.reward {
                if reward.reward_amount > 0 {
                    stats.with_rewards_count += 1;
                }
                stats.total_rewards_distributed += reward.reward_amount;
            }
        }

        stats
    }
}

impl Default for TransactionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts and totals over a set of transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryStatistics {
    pub total_transactions: usize,
    pub lightning_count: usize,
    pub external_count: usize,
    pub standalone_count: usize,
    pub with_rewards_count: usize,
    pub total_rewards_distributed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Currency, LightningInvoice, Merchant, PaymentAmount, PaymentMethod, RewardSummary,
        Transaction,
    };
    use chrono::{Duration, Utc};

    fn test_amount(sats: i64) -> PaymentAmount {
        PaymentAmount::new(sats, "1.00", Currency::usd(), false)
    }

    fn test_reward(sats: i64) -> RewardSummary {
        RewardSummary {
            reward_amount: sats,
            reward_rate: 0.02,
            was_minimum_applied: false,
            was_maximum_applied: false,
            is_standalone: false,
            timestamp: Utc::now(),
            sent_to_card: false,
            card_lnurl: None,
        }
    }

    /// Lightning transaction with a chosen id (the id is the payment hash)
    fn completed(id: &str) -> Transaction {
        Transaction::new_lightning(
            LightningInvoice::new(id, "lnbc1...", "secret"),
            test_amount(1000),
            Merchant::new("merchant"),
            None,
            None,
        )
    }

    fn pending(id: &str) -> Transaction {
        let mut tx = completed(id);
        tx.status = TransactionStatus::Pending;
        tx
    }

    #[test]
    fn test_add_puts_newest_first() {
        let mut history = TransactionHistory::new();
        history.add(completed("first"));
        history.add(completed("second"));

        assert_eq!(history.len(), 2);
        assert_eq!(history.transactions()[0].id, "second");
        assert_eq!(history.transactions()[1].id, "first");
    }

    #[test]
    fn test_add_drops_oldest_past_the_bound() {
        let mut history = TransactionHistory::new();
        for i in 1..=52 {
            history.add(completed(&format!("tx-{}", i)));
        }

        assert_eq!(history.len(), 50);
        assert_eq!(history.transactions()[0].id, "tx-52");
        assert_eq!(history.transactions()[49].id, "tx-3");
        assert!(history.get("tx-1").is_none());
        assert!(history.get("tx-2").is_none());
    }

    #[test]
    fn test_order_is_insertion_order_not_timestamp_order() {
        let mut history = TransactionHistory::new();

        let newer = completed("inserted-first");
        let mut older = completed("inserted-second");
        older.timestamp = Utc::now() - Duration::hours(1);

        history.add(newer);
        history.add(older);

        // The backdated transaction was inserted last, so it is at the head
        assert_eq!(history.transactions()[0].id, "inserted-second");
    }

    #[test]
    fn test_completed_transaction_becomes_last() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));
        history.add(completed("b"));

        assert_eq!(history.last_transaction().unwrap().id, "b");
    }

    #[test]
    fn test_pending_transaction_does_not_become_last() {
        let mut history = TransactionHistory::new();
        history.add(completed("done"));
        history.add(pending("in-flight"));

        assert_eq!(history.last_transaction().unwrap().id, "done");
    }

    #[test]
    fn test_update_status_promotes_to_last() {
        let mut history = TransactionHistory::new();
        history.add(completed("old"));
        history.add(pending("new"));
        assert_eq!(history.last_transaction().unwrap().id, "old");

        let updated = history.update_status("new", TransactionStatus::Completed);

        assert!(updated);
        assert_eq!(history.last_transaction().unwrap().id, "new");
        assert_eq!(
            history.get("new").unwrap().status,
            TransactionStatus::Completed
        );
    }

    #[test]
    fn test_update_status_to_failed_does_not_touch_last() {
        let mut history = TransactionHistory::new();
        history.add(completed("done"));
        history.add(pending("in-flight"));

        history.update_status("in-flight", TransactionStatus::Failed);

        assert_eq!(history.last_transaction().unwrap().id, "done");
        assert_eq!(
            history.get("in-flight").unwrap().status,
            TransactionStatus::Failed
        );
    }

    #[test]
    fn test_update_status_unknown_id_returns_false() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));

        assert!(!history.update_status("missing", TransactionStatus::Failed));
    }

    #[test]
    fn test_remove_last_repoints_to_newest_completed() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));
        history.add(completed("b"));
        history.add(completed("c"));
        assert_eq!(history.last_transaction().unwrap().id, "c");

        let removed = history.remove("c").unwrap();

        assert_eq!(removed.id, "c");
        assert_eq!(history.len(), 2);
        assert_eq!(history.last_transaction().unwrap().id, "b");
    }

    #[test]
    fn test_remove_last_skips_non_completed() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));
        history.add(pending("b"));
        history.add(completed("c"));

        history.remove("c");

        assert_eq!(history.last_transaction().unwrap().id, "a");
    }

    #[test]
    fn test_remove_last_clears_when_none_completed_remain() {
        let mut history = TransactionHistory::new();
        history.add(pending("p"));
        history.add(completed("c"));

        history.remove("c");

        assert!(history.last_transaction().is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_remove_other_keeps_last() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));
        history.add(completed("b"));

        history.remove("a");

        assert_eq!(history.last_transaction().unwrap().id, "b");
    }

    #[test]
    fn test_remove_unknown_id_returns_none() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));

        assert!(history.remove("missing").is_none());
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_clear_empties_everything() {
        let mut history = TransactionHistory::new();
        history.add(completed("a"));
        history.add(completed("b"));

        history.clear();

        assert!(history.is_empty());
        assert!(history.last_transaction().is_none());
    }

    #[test]
    fn test_of_type_filters() {
        let mut history = TransactionHistory::new();
        history.add(completed("ln"));
        history.add(
            Transaction::new_rewards_only(
                PaymentMethod::Cash,
                test_amount(5000),
                Merchant::new("merchant"),
                test_reward(100),
                None,
            )
            .unwrap(),
        );
        history.add(Transaction::new_standalone(
            Merchant::new("merchant"),
            test_reward(21),
            None,
        ));

        assert_eq!(history.of_type(TransactionType::Lightning).len(), 1);
        assert_eq!(history.of_type(TransactionType::RewardsOnly).len(), 1);
        assert_eq!(history.of_type(TransactionType::Standalone).len(), 1);
    }

    #[test]
    fn test_with_rewards_excludes_zero_amount_rewards() {
        let mut history = TransactionHistory::new();

        let mut no_reward = completed("none");
        no_reward.reward = None;
        history.add(no_reward);

        let mut zero_reward = completed("zero");
        zero_reward.reward = Some(test_reward(0));
        history.add(zero_reward);

        let mut real_reward = completed("real");
        real_reward.reward = Some(test_reward(42));
        history.add(real_reward);

        let rewarded = history.with_rewards();
        assert_eq!(rewarded.len(), 1);
        assert_eq!(rewarded[0].id, "real");
    }

    #[test]
    fn test_statistics_counts_types_and_rewards() {
        let mut history = TransactionHistory::new();

        let mut ln = completed("ln");
        ln.reward = Some(test_reward(20));
        history.add(ln);

        history.add(
            Transaction::new_rewards_only(
                PaymentMethod::Card,
                test_amount(5000),
                Merchant::new("merchant"),
                test_reward(100),
                None,
            )
            .unwrap(),
        );

        history.add(Transaction::new_standalone(
            Merchant::new("merchant"),
            test_reward(21),
            None,
        ));

        let mut unrewarded = completed("bare");
        unrewarded.reward = None;
        history.add(unrewarded);

        let stats = history.statistics();
        assert_eq!(stats.total_transactions, 4);
        assert_eq!(stats.lightning_count, 2);
        assert_eq!(stats.external_count, 1);
        assert_eq!(stats.standalone_count, 1);
        assert_eq!(stats.with_rewards_count, 3);
        assert_eq!(stats.total_rewards_distributed, 141);
    }

    #[test]
    fn test_from_records_recovers_last_completed() {
        // Newest first, as the database returns them
        let records = vec![pending("newest"), completed("middle"), completed("oldest")];

        let history = TransactionHistory::from_records(records, 50);

        assert_eq!(history.len(), 3);
        assert_eq!(history.last_transaction().unwrap().id, "middle");
    }

    #[test]
    fn test_from_records_truncates_to_limit() {
        let records = (1..=10).map(|i| completed(&format!("tx-{}", i))).collect();

        let history = TransactionHistory::from_records(records, 4);

        assert_eq!(history.len(), 4);
        assert_eq!(history.transactions()[0].id, "tx-1");
        assert_eq!(history.transactions()[3].id, "tx-4");
    }
}
