//! Checkout service for recording settled sales
//!
//! This module turns already-settled payments into ledger records. Settlement
//! itself (invoice creation, watching for the payment) happens outside this
//! crate; the checkout service consumes the results, attaches the reward when
//! the program is enabled, writes through to the database, updates the
//! in-memory history, and emits events.

use std::sync::{Arc, RwLock};
use tracing::info;

use super::events::{Event, EventBus};
use crate::history::TransactionHistory;
use crate::reward::RewardStore;
use crate::types::{
    Currency, LightningInvoice, Merchant, PaymentAmount, PaymentMethod, RewardSummary, Transaction,
};
use crate::{Config, Database, Result};

/// Checkout service
///
/// Handles all recording operations: Lightning settlements, externally paid
/// sales, and standalone rewards.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<Database>,
    config: Arc<Config>,
    rewards: RewardStore,
    history: Arc<RwLock<TransactionHistory>>,
    event_bus: EventBus,
}

/// A Lightning payment that has settled and should be recorded
#[derive(Debug, Clone)]
pub struct LightningSettlement {
    pub invoice: LightningInvoice,
    pub amount: PaymentAmount,
    pub memo: Option<String>,
}

/// A sale paid outside Lightning, recorded for its reward
#[derive(Debug, Clone)]
pub struct ExternalPayment {
    pub payment_method: PaymentMethod,
    pub amount: PaymentAmount,
    pub memo: Option<String>,
}

impl CheckoutService {
    /// Create a new checkout service
    pub fn new(
        db: Arc<Database>,
        config: Arc<Config>,
        rewards: RewardStore,
        history: Arc<RwLock<TransactionHistory>>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            db,
            config,
            rewards,
            history,
            event_bus,
        }
    }

    /// Record a settled Lightning payment
    ///
    /// A purchase-based reward is attached when the reward program is
    /// enabled; otherwise the sale is recorded without one.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails validation or cannot be
    /// written to the database.
    pub async fn settle_lightning_payment(
        &self,
        settlement: LightningSettlement,
    ) -> Result<Transaction> {
        let reward = if self.rewards.config().is_enabled {
            let calculation = self.rewards.calculate(Some(settlement.amount.sat_amount));
            Some(RewardSummary::from_calculation(&calculation))
        } else {
            None
        };

        let transaction = Transaction::new_lightning(
            settlement.invoice,
            settlement.amount,
            self.merchant(),
            settlement.memo,
            reward,
        );

        self.record(transaction).await
    }

    /// Record a sale paid by cash, card, or another external method
    ///
    /// The purchase settles outside the system; the whole point of recording
    /// it is the reward. The reward program must be enabled and the sat
    /// amount positive.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment method is Lightning, the amount is
    /// not positive, rewards are disabled, or the write fails.
    pub async fn record_external_payment(&self, payment: ExternalPayment) -> Result<Transaction> {
        if payment.payment_method == PaymentMethod::Lightning {
            return Err(crate::error::PosError::InvalidInput(
                "Lightning payments are recorded as settlements, not external payments"
                    .to_string(),
            ));
        }

        if payment.amount.sat_amount <= 0 {
            return Err(crate::error::PosError::InvalidInput(
                "External payments require a positive purchase amount".to_string(),
            ));
        }

        if !self.rewards.config().is_enabled {
            return Err(crate::error::PosError::InvalidInput(
                "Rewards are disabled; an external payment records nothing but its reward"
                    .to_string(),
            ));
        }

        let calculation = self.rewards.calculate(Some(payment.amount.sat_amount));
        let reward = RewardSummary::from_calculation(&calculation);

        let transaction = Transaction::new_rewards_only(
            payment.payment_method,
            payment.amount,
            self.merchant(),
            reward,
            payment.memo,
        )?;

        self.record(transaction).await
    }

    /// Record a standalone reward with no purchase behind it
    ///
    /// The fixed default reward is handed out and recorded as a zero-amount
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if rewards are disabled or the write fails.
    pub async fn record_standalone_reward(&self) -> Result<Transaction> {
        if !self.rewards.config().is_enabled {
            return Err(crate::error::PosError::InvalidInput(
                "Rewards are disabled".to_string(),
            ));
        }

        let calculation = self.rewards.calculate(None);
        let reward = RewardSummary::from_calculation(&calculation);
        let currency = Currency::from_code(&self.config.merchant.currency);

        let transaction = Transaction::new_standalone(self.merchant(), reward, Some(currency));

        self.record(transaction).await
    }

    fn merchant(&self) -> Merchant {
        Merchant::new(self.config.merchant.username.clone())
    }

    /// Validate, persist, and announce a transaction
    async fn record(&self, transaction: Transaction) -> Result<Transaction> {
        let report = transaction.validate();
        if !report.is_valid {
            return Err(crate::error::PosError::InvalidInput(
                report.errors.join("; "),
            ));
        }

        self.db.insert_transaction(&transaction).await?;
        self.history.write().unwrap().add(transaction.clone());

        info!(
            "Recorded {} transaction {} for {} sats",
            transaction.transaction_type, transaction.id, transaction.amount.sat_amount
        );

        self.event_bus.emit(Event::TransactionRecorded {
            transaction_id: transaction.id.clone(),
            transaction_type: transaction.transaction_type,
            sat_amount: transaction.amount.sat_amount,
            reward_amount: transaction.reward.as_ref().map(|r| r.reward_amount),
        });

        if let Some(reward) = &transaction.reward {
            self.event_bus.emit(Event::RewardGranted {
                transaction_id: transaction.id.clone(),
                reward_amount: reward.reward_amount,
                applied_minimum: reward.was_minimum_applied,
                applied_maximum: reward.was_maximum_applied,
                standalone: reward.is_standalone,
            });
        }

        Ok(transaction)
    }
}
