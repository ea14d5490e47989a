//! lnpos - Lightning network point-of-sale core
//!
//! This library provides the business logic for a Bitcoin point of sale:
//! recording settled sales, calculating customer rewards, amount entry,
//! and a PIN-protected settings gate.

pub mod amount;
pub mod config;
pub mod db;
pub mod error;
pub mod history;
pub mod logging;
pub mod pin;
pub mod reward;
pub mod service;
pub mod types;

// Re-export commonly used types
pub use amount::AmountEntry;
pub use config::Config;
pub use db::{Database, LedgerStats, TransactionQuery};
pub use error::{PosError, Result};
pub use history::TransactionHistory;
pub use pin::{PinGate, PinOutcome};
pub use reward::{RewardConfig, RewardStore};
pub use types::{Transaction, TransactionStatus, TransactionType};
