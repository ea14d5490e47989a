//! Event system for point-of-sale activity
//!
//! This module provides an in-process event bus for distributing events to
//! subscribers without blocking operations.
//!
//! # Architecture
//!
//! The event bus uses `tokio::sync::broadcast` for multi-subscriber support.
//! Events are emitted by services as transactions are recorded and can be
//! consumed by any number of subscribers (receipt printers, reward screens,
//! dashboards, etc.).
//!
//! # Non-Blocking Behavior
//!
//! If no subscribers exist, events are dropped immediately without allocation
//! or blocking. Subscribers can lag without blocking emitters.
//!
//! # Example
//!
//! ```no_run
//! use liblnpos::service::events::{EventBus, Event};
//!
//! # async fn example() {
//! let event_bus = EventBus::new(100);
//!
//! // Subscribe to events
//! let mut receiver = event_bus.subscribe();
//!
//! // Emit events (non-blocking)
//! event_bus.emit(Event::TransactionRemoved {
//!     transaction_id: "abc123".to_string(),
//! });
//!
//! // Receive events
//! if let Ok(event) = receiver.recv().await {
//!     println!("Received: {:?}", event);
//! }
//! # }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{TransactionStatus, TransactionType};

/// Event receiver type alias
pub type EventReceiver = broadcast::Receiver<Event>;

/// Event bus for distributing point-of-sale events
///
/// The event bus uses a broadcast channel to distribute events to multiple
/// subscribers. Events are dropped if no subscribers exist, ensuring
/// non-blocking behavior.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the specified capacity
    ///
    /// The capacity determines how many events can be buffered per subscriber
    /// before older events are dropped (if the subscriber is lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events
    ///
    /// Returns a receiver that will receive all events emitted after
    /// subscription. Multiple subscribers are supported.
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// This is a non-blocking operation. If no subscribers exist, the event
    /// is dropped immediately. If subscribers are lagging, they may miss
    /// events (oldest events are dropped first).
    pub fn emit(&self, event: Event) {
        // send() returns Err if no receivers exist, which is fine
        // We don't want to block or fail if nobody is listening
        let _ = self.sender.send(event);
    }

    /// Get the number of active subscribers
    ///
    /// This is useful for debugging or metrics, but should not be used
    /// for control flow decisions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Events emitted as the point of sale operates
///
/// All events are cloneable and serializable for flexibility in how
/// they're consumed (logging, UI updates, etc.).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A transaction was written to the ledger
    TransactionRecorded {
        transaction_id: String,
        transaction_type: TransactionType,
        sat_amount: i64,
        /// Reward attached to the transaction, if any
        reward_amount: Option<i64>,
    },

    /// A reward was granted to a customer
    RewardGranted {
        transaction_id: String,
        reward_amount: i64,
        applied_minimum: bool,
        applied_maximum: bool,
        standalone: bool,
    },

    /// A transaction's status changed
    TransactionStatusChanged {
        transaction_id: String,
        status: TransactionStatus,
    },

    /// A transaction was removed from the ledger
    TransactionRemoved { transaction_id: String },

    /// The whole ledger was cleared
    HistoryCleared {
        /// How many transactions were removed
        removed: u64,
    },
}
