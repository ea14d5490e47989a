//! Reward calculation and configuration
//!
//! The calculator is a pure function over a [`RewardConfig`] snapshot. Config
//! mutation has two deliberately different behaviors: the setters clamp bad
//! values into range silently, while [`RewardConfigUpdate::validate`] reports
//! violations without touching anything. Callers pick the one they need.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::{PosError, Result, StoreError};
use crate::types::{PaymentMethod, ValidationReport};

/// Reward rates are capped at 10% of the purchase
pub const MAX_REWARD_RATE: f64 = 0.1;

/// Merchant reward IDs are used in URLs and must stay short and safe
pub const MAX_MERCHANT_REWARD_ID_LENGTH: usize = 100;

// ============================================================================
// Configuration
// ============================================================================

/// Merchant-tunable reward program settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardConfig {
    /// Fraction of the purchase awarded, e.g. 0.02 for 2%
    pub reward_rate: f64,
    /// Floor for purchase-based rewards, in sats
    pub minimum_reward: i64,
    /// Ceiling for purchase-based rewards, in sats
    pub maximum_reward: i64,
    /// Fixed amount for standalone rewards, in sats
    pub default_reward: i64,
    /// Global toggle for the reward program
    pub is_enabled: bool,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            reward_rate: 0.02,
            minimum_reward: 1,
            maximum_reward: 1000,
            default_reward: 21,
            is_enabled: true,
        }
    }
}

impl RewardConfig {
    /// Initial configuration, with deployment overrides from the environment
    ///
    /// Unset or unparseable variables fall back to the built-in defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            reward_rate: std::env::var("LNPOS_REWARD_RATE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.reward_rate),
            minimum_reward: std::env::var("LNPOS_MIN_REWARD_SATS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.minimum_reward),
            maximum_reward: std::env::var("LNPOS_MAX_REWARD_SATS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.maximum_reward),
            default_reward: std::env::var("LNPOS_STANDALONE_REWARD_SATS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_reward),
            is_enabled: std::env::var("LNPOS_REWARDS_ENABLED")
                .ok()
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(defaults.is_enabled),
        }
    }

    /// Set the reward rate, clamped to 0..=10%
    pub fn set_reward_rate(&mut self, rate: f64) -> f64 {
        self.reward_rate = rate.clamp(0.0, MAX_REWARD_RATE);
        self.reward_rate
    }

    /// Set the minimum reward, clamped to at least 1 sat
    pub fn set_minimum_reward(&mut self, sats: i64) -> i64 {
        self.minimum_reward = sats.max(1);
        self.minimum_reward
    }

    /// Set the maximum reward, clamped to at least the current minimum
    pub fn set_maximum_reward(&mut self, sats: i64) -> i64 {
        self.maximum_reward = sats.max(self.minimum_reward);
        self.maximum_reward
    }

    /// Set the standalone reward, clamped to at least 1 sat
    pub fn set_default_reward(&mut self, sats: i64) -> i64 {
        self.default_reward = sats.max(1);
        self.default_reward
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.is_enabled = enabled;
    }

    /// Apply a partial update, clamping each provided field
    ///
    /// All clamps are evaluated against the configuration as it was before
    /// the update, so a maximum arriving together with a new minimum is
    /// clamped against the old minimum.
    pub fn apply_update(&mut self, update: &RewardConfigUpdate) {
        let previous = self.clone();

        if let Some(rate) = update.reward_rate {
            self.reward_rate = rate.clamp(0.0, MAX_REWARD_RATE);
        }
        if let Some(minimum) = update.minimum_reward {
            self.minimum_reward = minimum.max(1);
        }
        if let Some(maximum) = update.maximum_reward {
            self.maximum_reward = maximum.max(previous.minimum_reward);
        }
        if let Some(default) = update.default_reward {
            self.default_reward = default.max(1);
        }
        if let Some(enabled) = update.is_enabled {
            self.is_enabled = enabled;
        }
    }
}

/// Partial reward configuration, for updates and validation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RewardConfigUpdate {
    pub reward_rate: Option<f64>,
    pub minimum_reward: Option<i64>,
    pub maximum_reward: Option<i64>,
    pub default_reward: Option<i64>,
    pub is_enabled: Option<bool>,
}

impl RewardConfigUpdate {
    /// Check the provided fields without mutating anything
    ///
    /// Collects every violation. The maximum-versus-minimum relation is only
    /// checked when both fields are present in the update.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if let Some(rate) = self.reward_rate {
            if !(0.0..=MAX_REWARD_RATE).contains(&rate) {
                errors.push("Reward rate must be between 0% and 10%".to_string());
            }
        }

        if let Some(minimum) = self.minimum_reward {
            if minimum < 1 {
                errors.push("Minimum reward must be at least 1 sat".to_string());
            }
        }

        if let (Some(maximum), Some(minimum)) = (self.maximum_reward, self.minimum_reward) {
            if maximum < minimum {
                errors.push("Maximum reward must be greater than minimum reward".to_string());
            }
        }

        if let Some(default) = self.default_reward {
            if default < 1 {
                errors.push("Default reward must be at least 1 sat".to_string());
            }
        }

        ValidationReport::from_errors(errors)
    }

    pub fn is_empty(&self) -> bool {
        self.reward_rate.is_none()
            && self.minimum_reward.is_none()
            && self.maximum_reward.is_none()
            && self.default_reward.is_none()
            && self.is_enabled.is_none()
    }
}

/// Time-boxed promotion that substitutes its own reward rate
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventConfig {
    /// Whether the event is currently running
    #[serde(default)]
    pub active: bool,
    /// Rate substituted for the base rate while active, up to 100%
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_rate: Option<f64>,
    /// Reward account the event pays out from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_reward_id: Option<String>,
}

/// Check a merchant reward ID for safe use in URLs
///
/// Only alphanumeric characters, hyphens, and underscores are allowed,
/// up to 100 characters after trimming.
pub fn validate_merchant_reward_id(id: &str) -> bool {
    let trimmed = id.trim();

    if trimmed.is_empty() || trimmed.len() > MAX_MERCHANT_REWARD_ID_LENGTH {
        return false;
    }

    trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Trim and validate a merchant reward ID, or reject it
pub fn sanitize_merchant_reward_id(id: &str) -> Option<String> {
    if validate_merchant_reward_id(id) {
        Some(id.trim().to_string())
    } else {
        None
    }
}

// ============================================================================
// Calculation
// ============================================================================

/// How a reward amount was derived
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum CalculationType {
    /// Percentage of a purchase, clamped to the configured bounds
    PurchaseBased,
    /// Fixed default reward, no purchase involved
    Standalone,
}

impl CalculationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PurchaseBased => "purchase-based",
            Self::Standalone => "standalone",
        }
    }
}

impl std::fmt::Display for CalculationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full result of a reward calculation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RewardCalculation {
    pub reward_amount: i64,
    /// Rate actually used; absent for standalone rewards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward_rate: Option<f64>,
    /// Purchase the reward was computed from; absent for standalone rewards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_amount: Option<i64>,
    pub calculation_type: CalculationType,
    pub applied_minimum: bool,
    pub applied_maximum: bool,
}

/// Calculate the reward for a purchase, or the standalone fallback
///
/// A missing or non-positive purchase amount yields the fixed default
/// reward. Otherwise the reward is `floor(purchase * rate)` clamped to the
/// configured bounds, recording which bound (if any) was applied. An active
/// event with a rate substitutes that rate before the floor and clamp; all
/// other event mechanics live outside this function.
pub fn calculate_reward(
    purchase_amount: Option<i64>,
    config: &RewardConfig,
    event: Option<&EventConfig>,
) -> RewardCalculation {
    let effective_rate = match event {
        Some(event) if event.active => event.reward_rate.unwrap_or(config.reward_rate),
        _ => config.reward_rate,
    };

    let purchase = match purchase_amount {
        Some(amount) if amount > 0 => amount,
        _ => {
            return RewardCalculation {
                reward_amount: config.default_reward,
                reward_rate: None,
                purchase_amount: None,
                calculation_type: CalculationType::Standalone,
                applied_minimum: false,
                applied_maximum: false,
            };
        }
    };

    let calculated = (purchase as f64 * effective_rate).floor() as i64;

    let mut reward_amount = calculated;
    let mut applied_minimum = false;
    let mut applied_maximum = false;

    if calculated < config.minimum_reward {
        reward_amount = config.minimum_reward;
        applied_minimum = true;
    } else if calculated > config.maximum_reward {
        reward_amount = config.maximum_reward;
        applied_maximum = true;
    }

    RewardCalculation {
        reward_amount,
        reward_rate: Some(effective_rate),
        purchase_amount: Some(purchase),
        calculation_type: CalculationType::PurchaseBased,
        applied_minimum,
        applied_maximum,
    }
}

/// Display strings for a reward calculation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardDisplay {
    /// e.g. "20 sats (~$0.01)"
    pub primary_text: String,
    pub secondary_text: String,
    /// e.g. "2.0% of purchase amount (minimum applied)"
    pub description: String,
}

/// Format a calculation for display
///
/// `sats_to_fiat` renders a sat amount in the till's display currency.
/// External payments get payment-method-specific wording.
pub fn format_reward_for_display(
    calculation: &RewardCalculation,
    sats_to_fiat: impl Fn(i64) -> String,
    is_external_payment: bool,
    payment_method: Option<PaymentMethod>,
) -> RewardDisplay {
    let fiat = sats_to_fiat(calculation.reward_amount);
    let primary_text = format!("{} sats (~{})", calculation.reward_amount, fiat);

    if calculation.calculation_type == CalculationType::Standalone {
        return RewardDisplay {
            primary_text,
            secondary_text: "will be applied to reward balance.".to_string(),
            description: "Standalone reward".to_string(),
        };
    }

    let percentage = calculation.reward_rate.unwrap_or(0.0) * 100.0;

    let payment_context = if is_external_payment {
        match payment_method {
            Some(PaymentMethod::Cash) => "cash payment",
            Some(PaymentMethod::Card) => "card payment",
            Some(PaymentMethod::Check) => "check payment",
            _ => "external payment",
        }
    } else {
        "purchase amount"
    };

    let mut description = format!("{:.1}% of {}", percentage, payment_context);

    if calculation.applied_minimum {
        description.push_str(" (minimum applied)");
    } else if calculation.applied_maximum {
        description.push_str(" (maximum applied)");
    }

    let secondary_text = if is_external_payment {
        "Bitcoin reward will be applied to balance.".to_string()
    } else {
        "will be applied to reward balance.".to_string()
    };

    RewardDisplay {
        primary_text,
        secondary_text,
        description,
    }
}

// ============================================================================
// Persistence
// ============================================================================

/// Reward program state persisted to TOML
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct RewardProgramState {
    #[serde(default)]
    config: RewardConfig,

    #[serde(default)]
    event: EventConfig,
}

/// Persistent store for the reward program
///
/// Holds the configuration and event state behind a lock and writes every
/// change through to a TOML state file. Thread-safe via Arc<RwLock>.
#[derive(Clone)]
pub struct RewardStore {
    /// Path to the state file (rewards.toml)
    state_file: PathBuf,
    state: Arc<RwLock<RewardProgramState>>,
}

impl RewardStore {
    /// Create a store with the default state file location
    ///
    /// Uses XDG Base Directory spec: ~/.config/lnpos/rewards.toml
    pub fn new() -> Result<Self> {
        let state_file = Self::resolve_state_file_path()?;
        Self::with_path(state_file)
    }

    /// Create a store with a custom state file path
    pub fn with_path(state_file: PathBuf) -> Result<Self> {
        let mut store = Self {
            state_file,
            state: Arc::new(RwLock::new(RewardProgramState {
                config: RewardConfig::from_env(),
                event: EventConfig::default(),
            })),
        };

        store.load()?;

        Ok(store)
    }

    fn resolve_state_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| StoreError::StateFile("XDG config directory not found".to_string()))?;

        Ok(config_dir.join("lnpos").join("rewards.toml"))
    }

    /// Current configuration snapshot
    pub fn config(&self) -> RewardConfig {
        self.state.read().unwrap().config.clone()
    }

    /// Current event state snapshot
    pub fn event(&self) -> EventConfig {
        self.state.read().unwrap().event.clone()
    }

    /// Set the reward rate, clamped to 0..=10%. Returns the stored value.
    pub fn set_reward_rate(&self, rate: f64) -> Result<f64> {
        let stored = {
            let mut state = self.state.write().unwrap();
            state.config.set_reward_rate(rate)
        };
        self.save()?;
        Ok(stored)
    }

    /// Set the minimum reward, clamped to at least 1 sat. Returns the stored value.
    pub fn set_minimum_reward(&self, sats: i64) -> Result<i64> {
        let stored = {
            let mut state = self.state.write().unwrap();
            state.config.set_minimum_reward(sats)
        };
        self.save()?;
        Ok(stored)
    }

    /// Set the maximum reward, clamped to at least the current minimum.
    /// Returns the stored value.
    pub fn set_maximum_reward(&self, sats: i64) -> Result<i64> {
        let stored = {
            let mut state = self.state.write().unwrap();
            state.config.set_maximum_reward(sats)
        };
        self.save()?;
        Ok(stored)
    }

    /// Set the standalone reward, clamped to at least 1 sat. Returns the stored value.
    pub fn set_default_reward(&self, sats: i64) -> Result<i64> {
        let stored = {
            let mut state = self.state.write().unwrap();
            state.config.set_default_reward(sats)
        };
        self.save()?;
        Ok(stored)
    }

    /// Toggle the reward program
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state.config.set_enabled(enabled);
        }
        self.save()
    }

    /// Apply a partial update with silent clamping. Returns the new configuration.
    pub fn apply_update(&self, update: &RewardConfigUpdate) -> Result<RewardConfig> {
        let config = {
            let mut state = self.state.write().unwrap();
            state.config.apply_update(update);
            state.config.clone()
        };
        self.save()?;
        Ok(config)
    }

    /// Restore the initial configuration (environment overrides included)
    pub fn reset(&self) -> Result<RewardConfig> {
        let config = {
            let mut state = self.state.write().unwrap();
            state.config = RewardConfig::from_env();
            state.config.clone()
        };
        self.save()?;
        Ok(config)
    }

    /// Turn the event on or off
    pub fn set_event_active(&self, active: bool) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state.event.active = active;
        }
        self.save()
    }

    /// Set or clear the event reward rate
    ///
    /// Event rates may go up to 100%, but out-of-range values are rejected
    /// rather than clamped.
    pub fn set_event_reward_rate(&self, rate: Option<f64>) -> Result<()> {
        if let Some(rate) = rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(PosError::InvalidInput(
                    "Event reward rate must be between 0% and 100%".to_string(),
                ));
            }
        }

        {
            let mut state = self.state.write().unwrap();
            state.event.reward_rate = rate;
        }
        self.save()
    }

    /// Set or clear the event merchant reward ID
    ///
    /// The ID is trimmed and checked against the URL-safe character set
    /// before it is stored.
    pub fn set_event_merchant_reward_id(&self, id: Option<&str>) -> Result<()> {
        let sanitized = match id {
            Some(raw) => {
                let valid = sanitize_merchant_reward_id(raw).ok_or_else(|| {
                    PosError::InvalidInput(
                        "Merchant reward ID must be 1-100 characters of letters, numbers, \
                         hyphens, and underscores"
                            .to_string(),
                    )
                })?;
                Some(valid)
            }
            None => None,
        };

        {
            let mut state = self.state.write().unwrap();
            state.event.merchant_reward_id = sanitized;
        }
        self.save()
    }

    /// Calculate a reward using the stored configuration and event state
    pub fn calculate(&self, purchase_amount: Option<i64>) -> RewardCalculation {
        let state = self.state.read().unwrap();
        calculate_reward(purchase_amount, &state.config, Some(&state.event))
    }

    /// Save state to disk
    ///
    /// Serializes state to TOML and writes to the state file.
    /// Creates parent directories if needed.
    /// Sets file permissions to 644 on Unix.
    fn save(&self) -> Result<()> {
        if let Some(parent) = self.state_file.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::StateFile(format!("Failed to create directory: {}", e)))?;
        }

        let state = self.state.read().unwrap();
        let toml_content = toml::to_string_pretty(&*state)
            .map_err(|e| StoreError::StateFile(format!("Failed to serialize state: {}", e)))?;

        std::fs::write(&self.state_file, toml_content)
            .map_err(|e| StoreError::StateFile(format!("Failed to write state file: {}", e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o644);
            std::fs::set_permissions(&self.state_file, permissions)
                .map_err(|e| StoreError::StateFile(format!("Failed to set permissions: {}", e)))?;
        }

        Ok(())
    }

    /// Load state from disk
    ///
    /// Handles missing file gracefully by keeping the initial state.
    /// Handles corrupted file gracefully by logging a warning and keeping
    /// the initial state.
    fn load(&mut self) -> Result<()> {
        if !self.state_file.exists() {
            return Ok(());
        }

        let content = std::fs::read_to_string(&self.state_file)
            .map_err(|e| StoreError::StateFile(format!("Failed to read state file: {}", e)))?;

        match toml::from_str::<RewardProgramState>(&content) {
            Ok(loaded_state) => {
                let mut state = self.state.write().unwrap();
                *state = loaded_state;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Corrupted reward state file, using defaults: {}", e);
                Ok(())
            }
        }
    }
}
