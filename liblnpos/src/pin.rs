//! Merchant PIN protection for reward settings
//!
//! A short numeric PIN gates configuration changes at the till. Only a
//! salted digest of the PIN is stored on disk; authentication state lives
//! in memory and is gone when the process exits.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PinError, PosError, Result, StoreError};

/// Required PIN length in digits
pub const PIN_LENGTH: usize = 4;

/// Minutes an authenticated session stays valid
pub const DEFAULT_SESSION_TIMEOUT_MINUTES: i64 = 15;

const PIN_SALT: &str = "lnpos-pin-salt";

/// Outcome of a PIN verification or a PIN-changing operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinOutcome {
    Success,
    Failure,
}

fn hash_pin(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hasher.update(PIN_SALT.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn validate_pin_format(pin: &str) -> Result<()> {
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(PosError::InvalidInput(format!(
            "PIN must be exactly {} digits",
            PIN_LENGTH
        )));
    }
    Ok(())
}

fn default_session_timeout() -> i64 {
    DEFAULT_SESSION_TIMEOUT_MINUTES
}

/// PIN state; only the digest and the timeout are persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PinState {
    #[serde(default)]
    has_pin: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pin_hash: Option<String>,

    #[serde(default = "default_session_timeout")]
    session_timeout_minutes: i64,

    // Session state is never persisted
    #[serde(skip)]
    is_authenticated: bool,
    #[serde(skip)]
    last_auth_time_ms: Option<i64>,
    #[serde(skip)]
    last_verification: Option<PinOutcome>,
    #[serde(skip)]
    last_operation: Option<PinOutcome>,
}

impl Default for PinState {
    fn default() -> Self {
        Self {
            has_pin: false,
            pin_hash: None,
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MINUTES,
            is_authenticated: false,
            last_auth_time_ms: None,
            last_verification: None,
            last_operation: None,
        }
    }
}

/// Persistent PIN gate
///
/// Holds the PIN digest behind a lock and writes changes through to a TOML
/// state file. Thread-safe via Arc<RwLock>.
#[derive(Clone)]
pub struct PinGate {
    /// Path to the state file (pin.toml)
    state_file: PathBuf,
    state: Arc<RwLock<PinState>>,
}

impl PinGate {
    /// Create a gate with the default state file location
    ///
    /// Uses XDG Base Directory spec: ~/.config/lnpos/pin.toml
    pub fn new() -> Result<Self> {
        let state_file = Self::resolve_state_file_path()?;
        Self::with_path(state_file)
    }

    /// Create a gate with a custom state file path
    pub fn with_path(state_file: PathBuf) -> Result<Self> {
        let mut gate = Self {
            state_file,
            state: Arc::new(RwLock::new(PinState::default())),
        };

        gate.load()?;

        Ok(gate)
    }

    fn resolve_state_file_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| StoreError::StateFile("XDG config directory not found".to_string()))?;

        Ok(config_dir.join("lnpos").join("pin.toml"))
    }

    pub fn has_pin(&self) -> bool {
        self.state.read().unwrap().has_pin
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().unwrap().is_authenticated
    }

    pub fn session_timeout_minutes(&self) -> i64 {
        self.state.read().unwrap().session_timeout_minutes
    }

    /// Outcome of the most recent verification, if any
    pub fn last_verification(&self) -> Option<PinOutcome> {
        self.state.read().unwrap().last_verification
    }

    /// Outcome of the most recent set/change/remove operation, if any
    pub fn last_operation(&self) -> Option<PinOutcome> {
        self.state.read().unwrap().last_operation
    }

    /// Set the PIN, replacing any existing one, and authenticate
    pub fn set_pin(&self, pin: &str) -> Result<()> {
        validate_pin_format(pin)?;

        {
            let mut state = self.state.write().unwrap();
            state.has_pin = true;
            state.pin_hash = Some(hash_pin(pin));
            state.is_authenticated = true;
            state.last_auth_time_ms = Some(Utc::now().timestamp_millis());
            state.last_operation = Some(PinOutcome::Success);
            state.last_verification = Some(PinOutcome::Success);
        }

        self.save()
    }

    /// Change the PIN after verifying the old one
    ///
    /// A wrong old PIN clears authentication and reports failure. When no
    /// PIN is set the outcome is also failure.
    pub fn change_pin(&self, old_pin: &str, new_pin: &str) -> Result<PinOutcome> {
        validate_pin_format(new_pin)?;

        let outcome = {
            let mut state = self.state.write().unwrap();

            if state.pin_hash.as_deref() == Some(hash_pin(old_pin).as_str()) {
                state.pin_hash = Some(hash_pin(new_pin));
                state.is_authenticated = true;
                state.last_auth_time_ms = Some(Utc::now().timestamp_millis());
                state.last_operation = Some(PinOutcome::Success);
                state.last_verification = Some(PinOutcome::Success);
                PinOutcome::Success
            } else {
                state.is_authenticated = false;
                state.last_auth_time_ms = None;
                state.last_operation = Some(PinOutcome::Failure);
                state.last_verification = Some(PinOutcome::Failure);
                PinOutcome::Failure
            }
        };

        if outcome == PinOutcome::Success {
            self.save()?;
        }

        Ok(outcome)
    }

    /// Verify the PIN and open a session on success
    ///
    /// A wrong PIN clears any existing authentication.
    pub fn authenticate(&self, pin: &str) -> PinOutcome {
        let mut state = self.state.write().unwrap();
        state.last_verification = None;

        if state.pin_hash.as_deref() == Some(hash_pin(pin).as_str()) {
            state.is_authenticated = true;
            state.last_auth_time_ms = Some(Utc::now().timestamp_millis());
            state.last_verification = Some(PinOutcome::Success);
            PinOutcome::Success
        } else {
            state.is_authenticated = false;
            state.last_auth_time_ms = None;
            state.last_verification = Some(PinOutcome::Failure);
            PinOutcome::Failure
        }
    }

    /// Verify the PIN without touching authentication state
    pub fn verify_only(&self, pin: &str) -> PinOutcome {
        let mut state = self.state.write().unwrap();
        state.last_verification = None;

        let outcome = if state.pin_hash.as_deref() == Some(hash_pin(pin).as_str()) {
            PinOutcome::Success
        } else {
            PinOutcome::Failure
        };

        state.last_verification = Some(outcome);
        outcome
    }

    /// Close the session
    pub fn clear_authentication(&self) {
        let mut state = self.state.write().unwrap();
        state.is_authenticated = false;
        state.last_auth_time_ms = None;
        state.last_verification = None;
    }

    /// Forget the most recent verification and operation outcomes
    pub fn clear_results(&self) {
        let mut state = self.state.write().unwrap();
        state.last_verification = None;
        state.last_operation = None;
    }

    /// Remove the PIN entirely
    pub fn remove_pin(&self) -> Result<()> {
        {
            let mut state = self.state.write().unwrap();
            state.has_pin = false;
            state.pin_hash = None;
            state.is_authenticated = false;
            state.last_auth_time_ms = None;
            state.last_verification = None;
            state.last_operation = Some(PinOutcome::Success);
        }

        self.save()
    }

    /// Expire the session when it has been idle past the timeout
    ///
    /// Returns whether the session is still authenticated afterwards.
    pub fn check_session(&self) -> bool {
        self.check_session_at(Utc::now().timestamp_millis())
    }

    fn check_session_at(&self, now_ms: i64) -> bool {
        let mut state = self.state.write().unwrap();

        if let Some(last_auth) = state.last_auth_time_ms {
            if state.session_timeout_minutes > 0 {
                let expired = now_ms - last_auth > state.session_timeout_minutes * 60 * 1000;
                if expired {
                    state.is_authenticated = false;
                    state.last_auth_time_ms = None;
                }
            }
        }

        state.is_authenticated
    }

    /// Set how long a session stays valid
    pub fn set_session_timeout(&self, minutes: i64) -> Result<()> {
        if minutes < 1 {
            return Err(PosError::InvalidInput(
                "Session timeout must be at least 1 minute".to_string(),
            ));
        }

        {
            let mut state = self.state.write().unwrap();
            state.session_timeout_minutes = minutes;
        }

        self.save()
    }

    /// Verify the PIN for a one-shot protected operation
    ///
    /// Errors when no PIN is set or the PIN is wrong, so callers can gate
    /// with a single `?`.
    pub fn authorize(&self, pin: &str) -> Result<()> {
        if !self.has_pin() {
            return Err(PinError::NotSet.into());
        }

        match self.authenticate(pin) {
            PinOutcome::Success => Ok(()),
            PinOutcome::Failure => Err(PinError::VerificationFailed.into()),
        }
    }

    /// Require a live session when a PIN is set
    ///
    /// Without a PIN there is nothing to enforce and this always succeeds.
    pub fn require_session(&self) -> Result<()> {
        if !self.has_pin() {
            return Ok(());
        }

        if self.check_session() {
            Ok(())
        } else {
            Err(PinError::SessionExpired.into())
        }
    }

    /// Save state to disk
    ///
    /// Serializes state to TOML and writes to the state file.
    /// Creates parent directories if needed.
    /// Sets file permissions to 600 on Unix since the file holds a digest.
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
            let permissions = std::fs::Permissions::from_mode(0o600);
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

        match toml::from_str::<PinState>(&content) {
            Ok(loaded_state) => {
                let mut state = self.state.write().unwrap();
                *state = loaded_state;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Corrupted PIN state file, using defaults: {}", e);
                Ok(())
            }
        }
    }
}
