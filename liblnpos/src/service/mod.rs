//! Service layer for the point of sale
//!
//! This module provides a clean, testable API for business logic that can be
//! consumed by multiple interfaces (CLI, kiosk UI, web) without code
//! duplication.
//!
//! # Architecture
//!
//! The service layer follows a facade pattern with `PosService` as the main
//! entry point, coordinating specialized sub-services:
//!
//! - `CheckoutService`: Record settled sales and grant rewards
//! - `HistoryService`: Query and maintain the transaction ledger
//! - `EventBus`: Activity event distribution
//!
//! The reward store and PIN gate are owned here too, so every interface sees
//! the same program state.
//!
//! # Example
//!
//! ```no_run
//! use liblnpos::service::PosService;
//! use liblnpos::service::checkout::LightningSettlement;
//! use liblnpos::types::{LightningInvoice, PaymentAmount, Currency};
//!
//! # async fn example() -> liblnpos::Result<()> {
//! let service = PosService::new().await?;
//!
//! let settlement = LightningSettlement {
//!     invoice: LightningInvoice::new("a1b2c3", "lnbc10u1p...", "secret"),
//!     amount: PaymentAmount::new(1000, "1.00", Currency::usd(), false),
//!     memo: Some("americano".to_string()),
//! };
//!
//! let transaction = service.checkout().settle_lightning_payment(settlement).await?;
//! println!("Recorded sale {}", transaction.id);
//! # Ok(())
//! # }
//! ```

pub mod checkout;
pub mod events;
pub mod history;

use std::sync::{Arc, RwLock};

use self::checkout::CheckoutService;
use self::events::EventBus;
use self::history::HistoryService;
use crate::config::expand_path;
use crate::history::TransactionHistory;
use crate::pin::PinGate;
use crate::reward::RewardStore;
use crate::{Config, Database, Result};

/// Main service facade that coordinates all sub-services
///
/// `PosService` provides a single entry point for all service operations,
/// managing shared resources (Database, Config, reward store, PIN gate,
/// in-memory history) and providing access to specialized sub-services.
///
/// # Shared State
///
/// All sub-services share the same `Arc<Database>` and `Arc<Config>`
/// instances, and the checkout and history services share one bounded
/// in-memory history behind an `RwLock`.
///
/// # Example
///
/// ```no_run
/// use liblnpos::service::PosService;
///
/// # async fn example() -> liblnpos::Result<()> {
/// // Create service with default configuration
/// let service = PosService::new().await?;
///
/// // Access sub-services
/// let checkout = service.checkout();
/// let history = service.history();
/// let rewards = service.rewards();
///
/// // Subscribe to events
/// let mut events = service.subscribe();
/// # Ok(())
/// # }
/// ```
pub struct PosService {
    db: Arc<Database>,
    config: Arc<Config>,
    rewards: RewardStore,
    pin: PinGate,
    checkout: CheckoutService,
    history: HistoryService,
    event_bus: EventBus,
}

impl PosService {
    /// Create a new service with default configuration
    ///
    /// This loads configuration from the default location and initializes
    /// the database.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration cannot be loaded
    /// - Database cannot be initialized
    /// - Database migrations fail
    pub async fn new() -> Result<Self> {
        let config = Config::load()?;
        Self::from_config(config).await
    }

    /// Create a service with custom configuration
    ///
    /// This allows providing a pre-configured `Config` instance, useful for
    /// testing or custom setups. The in-memory history is rehydrated with
    /// the newest transactions from the database.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Database cannot be initialized
    /// - Database migrations fail
    /// - A state file exists but cannot be read
    pub async fn from_config(config: Config) -> Result<Self> {
        // Initialize shared resources
        let db = Database::new(&config.database.path).await?;
        let rewards = RewardStore::with_path(expand_path(&config.state.rewards_file))?;
        let pin = PinGate::with_path(expand_path(&config.state.pin_file))?;

        // Rehydrate the display window from the newest ledger records
        let max_transactions = config.history.max_transactions;
        let records = db.recent_transactions(max_transactions).await?;
        let history = Arc::new(RwLock::new(TransactionHistory::from_records(
            records,
            max_transactions,
        )));

        let db = Arc::new(db);
        let config = Arc::new(config);
        let event_bus = EventBus::new(100);

        // Create sub-services with shared state
        let checkout = CheckoutService::new(
            Arc::clone(&db),
            Arc::clone(&config),
            rewards.clone(),
            Arc::clone(&history),
            event_bus.clone(),
        );
        let history_service =
            HistoryService::new(Arc::clone(&db), Arc::clone(&history), event_bus.clone());

        Ok(Self {
            db,
            config,
            rewards,
            pin,
            checkout,
            history: history_service,
            event_bus,
        })
    }

    /// Access the database directly
    ///
    /// Provides direct access to the database for operations the services
    /// do not cover, like ad-hoc ledger queries.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Access the checkout service
    ///
    /// The checkout service records settled sales and grants rewards.
    pub fn checkout(&self) -> &CheckoutService {
        &self.checkout
    }

    /// Access the history service
    ///
    /// The history service provides querying and maintenance of the
    /// transaction ledger.
    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    /// Access the reward program store
    ///
    /// The store holds the reward configuration and event state, persisted
    /// across restarts.
    pub fn rewards(&self) -> &RewardStore {
        &self.rewards
    }

    /// Access the PIN gate
    ///
    /// The gate protects settings screens behind the merchant PIN.
    pub fn pin(&self) -> &PinGate {
        &self.pin
    }

    /// Subscribe to service events
    ///
    /// Returns a receiver that will receive activity events from service
    /// operations. Multiple subscribers are supported.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use liblnpos::service::PosService;
    ///
    /// # async fn example() -> liblnpos::Result<()> {
    /// let service = PosService::new().await?;
    /// let mut events = service.subscribe();
    ///
    /// // In a separate task, listen for events
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         println!("Event: {:?}", event);
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> events::EventReceiver {
        self.event_bus.subscribe()
    }
}
