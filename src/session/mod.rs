//! Connection session: the single `ConnectionState` and the transitions
//! that drive the dispatcher.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──▶ Connected ──sign──▶ Signing ──▶ Connected
//!       ▲                        │              │                  │
//!       │                        ▼              │                  ▼
//!       └──────(retry)──────── Error            │      Error ──(error_reset_ms)──▶ Connected
//!                                               │
//!       Disconnected ◀────────disconnect────────┘
//! ```
//!
//! `Connecting` and `Signing` double as the lock: a second operation started
//! while one is in flight is refused with [`SessionError::Busy`]. The state is
//! held in a `RefCell` and no borrow is ever held across an `.await`.
//!
//! Each transition bumps a generation counter. An operation that finds the
//! generation moved on when it resumes (e.g. the user disconnected mid-connect)
//! drops its result instead of overwriting newer state.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing;

use crate::auth::SigningRequest;
use crate::constants::{DEFAULT_ERROR_RESET_MS, DEFAULT_INJECTION_WAIT_MS};
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::error::{DispatchError, SessionError};
use crate::provider::{EnvironmentProbe, ProviderHandle, ProviderKind, ProviderRegistry};
use crate::shared::{BtcAddress, Signature};

// ============================================================================
// State
// ============================================================================

/// What the UI knows about a connected wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedWallet {
    pub address: BtcAddress,
    pub signature: Option<Signature>,
    /// The exact text that `signature` signs.
    pub message: Option<String>,
    #[serde(rename = "walletType")]
    pub provider_kind: ProviderKind,
}

impl ConnectedWallet {
    fn new(address: BtcAddress, provider_kind: ProviderKind) -> Self {
        Self {
            address,
            signature: None,
            message: None,
            provider_kind,
        }
    }

    /// Record a completed signing. A provider that resolved with `null`
    /// leaves `signature` as `None`, replacing any earlier signature, while
    /// `message` still records the text that was sent.
    fn with_signature(mut self, request: SigningRequest, signature: Signature) -> Self {
        self.message = Some(request.message);
        self.signature = (!signature.is_empty()).then_some(signature);
        self
    }
}

/// The connection state. Exactly one is active at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(ConnectedWallet),
    Signing(ConnectedWallet),
    Error {
        message: String,
        /// Wallet to fall back to once the error clears. `None` after a
        /// failed connect, which behaves like `Disconnected`.
        #[serde(skip)]
        recover: Option<ConnectedWallet>,
    },
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected(_) => "connected",
            Self::Signing(_) => "signing",
            Self::Error { .. } => "error",
        }
    }

    /// The wallet visible in this state, if any.
    pub fn wallet(&self) -> Option<&ConnectedWallet> {
        match self {
            Self::Connected(w) | Self::Signing(w) => Some(w),
            _ => None,
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Connecting | Self::Signing(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Session timings and behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SessionConfig {
    /// Sign an authentication message right after connecting.
    pub sign_on_connect: bool,
    /// Extra wait before resolving when no wallet global exists at all.
    pub injection_wait_ms: u64,
    /// How long a signing error stays visible before reverting to `Connected`.
    pub error_reset_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sign_on_connect: true,
            injection_wait_ms: DEFAULT_INJECTION_WAIT_MS,
            error_reset_ms: DEFAULT_ERROR_RESET_MS,
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// Owns the connection state for one UI surface.
pub struct WalletSession<P> {
    env: P,
    registry: ProviderRegistry,
    dispatcher: Dispatcher,
    config: SessionConfig,
    state: RefCell<ConnectionState>,
    generation: Cell<u64>,
}

impl<P: EnvironmentProbe> WalletSession<P> {
    pub fn new(env: P) -> Self {
        Self::builder(env).build()
    }

    pub fn builder(env: P) -> WalletSessionBuilder<P> {
        WalletSessionBuilder::new(env)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Counter bumped on every transition.
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn environment(&self) -> &P {
        &self.env
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    // ── Transitions ──────────────────────────────────────────────────────

    /// Resolve a provider, fetch its address and optionally sign in.
    pub async fn connect(&self) -> Result<ConnectedWallet, SessionError> {
        match &*self.state.borrow() {
            ConnectionState::Connecting | ConnectionState::Signing(_) => {
                return Err(SessionError::Busy)
            }
            ConnectionState::Connected(_) => return Err(SessionError::AlreadyConnected),
            ConnectionState::Disconnected | ConnectionState::Error { .. } => {}
        }

        let generation = self.transition(ConnectionState::Connecting);

        match self.establish().await {
            Ok(wallet) => {
                self.commit(generation, ConnectionState::Connected(wallet.clone()))?;
                tracing::info!(address = %wallet.address, kind = %wallet.provider_kind, "Wallet connected");
                Ok(wallet)
            }
            Err(err) => {
                tracing::error!("Wallet connection failed: {}", err);
                self.commit(
                    generation,
                    ConnectionState::Error {
                        message: err.to_string(),
                        recover: None,
                    },
                )?;
                Err(err)
            }
        }
    }

    /// Sign a fresh ownership message with the connected address.
    ///
    /// On failure the session shows the error and keeps the previous wallet
    /// for [`recover_from_error`](Self::recover_from_error).
    pub async fn sign(&self) -> Result<ConnectedWallet, SessionError> {
        let wallet = match &*self.state.borrow() {
            ConnectionState::Connected(w) => w.clone(),
            ConnectionState::Connecting | ConnectionState::Signing(_) => {
                return Err(SessionError::Busy)
            }
            _ => return Err(SessionError::NotConnected),
        };

        let generation = self.transition(ConnectionState::Signing(wallet.clone()));

        match self.sign_ownership(&wallet).await {
            Ok((request, signature)) => {
                let signed = wallet.with_signature(request, signature);
                self.commit(generation, ConnectionState::Connected(signed.clone()))?;
                Ok(signed)
            }
            Err(err) => {
                tracing::error!("Message signing failed: {}", err);
                self.commit(
                    generation,
                    ConnectionState::Error {
                        message: err.to_string(),
                        recover: Some(wallet),
                    },
                )?;
                Err(err)
            }
        }
    }

    /// Reset to `Disconnected`. Always allowed.
    pub fn disconnect(&self) {
        tracing::info!("Wallet disconnected");
        self.transition(ConnectionState::Disconnected);
    }

    /// Leave a signing error and restore the previous wallet.
    ///
    /// No-op unless the session is still in the error entered at
    /// `generation`; returns whether it reverted.
    pub fn recover_from_error(&self, generation: u64) -> bool {
        if self.generation.get() != generation {
            return false;
        }

        let recovered = match &*self.state.borrow() {
            ConnectionState::Error {
                recover: Some(wallet),
                ..
            } => wallet.clone(),
            _ => return false,
        };

        tracing::debug!("Clearing signing error");
        self.transition(ConnectionState::Connected(recovered));
        true
    }

    /// Wait `error_reset_ms`, then [`recover_from_error`](Self::recover_from_error)
    /// for the current generation.
    pub async fn auto_recover(&self) -> bool {
        let generation = self.generation.get();
        futures_timer::Delay::new(Duration::from_millis(self.config.error_reset_ms)).await;
        self.recover_from_error(generation)
    }

    /// Resolve the provider now, without touching state.
    pub fn resolve(&self) -> Option<ProviderHandle> {
        self.registry.resolve(&self.env)
    }

    // ── Internals ────────────────────────────────────────────────────────

    async fn establish(&self) -> Result<ConnectedWallet, SessionError> {
        if !self.registry.any_global_present(&self.env) && self.config.injection_wait_ms > 0 {
            tracing::info!(
                wait_ms = self.config.injection_wait_ms,
                "No wallet detected immediately, waiting for injection"
            );
            futures_timer::Delay::new(Duration::from_millis(self.config.injection_wait_ms)).await;
        }

        let handle = self.resolve().ok_or(DispatchError::NoProviderFound)?;

        let address = self
            .dispatcher
            .get_address(Some(&handle))
            .await
            .map_err(SessionError::Address)?;

        let wallet = ConnectedWallet::new(address, handle.kind);
        if !self.config.sign_on_connect {
            return Ok(wallet);
        }

        let request = SigningRequest::authentication(&wallet.address, Utc::now());
        match self.dispatcher.sign_message(Some(&handle), &request).await {
            Ok(signature) => Ok(wallet.with_signature(request, signature)),
            Err(err) => {
                tracing::warn!("Bitcoin signature request failed, continuing without: {}", err);
                Ok(wallet)
            }
        }
    }

    async fn sign_ownership(
        &self,
        wallet: &ConnectedWallet,
    ) -> Result<(SigningRequest, Signature), SessionError> {
        let handle = self.resolve().ok_or(SessionError::ConnectionLost)?;
        let request = SigningRequest::ownership(&wallet.address, Utc::now());
        tracing::debug!(message = %request.message, "Signing ownership message");

        let signature = self
            .dispatcher
            .sign_message(Some(&handle), &request)
            .await
            .map_err(SessionError::Signing)?;
        Ok((request, signature))
    }

    fn transition(&self, next: ConnectionState) -> u64 {
        let generation = self.generation.get().wrapping_add(1);
        self.generation.set(generation);
        let mut state = self.state.borrow_mut();
        tracing::debug!(from = state.name(), to = next.name(), generation, "Session transition");
        *state = next;
        generation
    }

    fn commit(&self, generation: u64, next: ConnectionState) -> Result<(), SessionError> {
        if self.generation.get() != generation {
            tracing::warn!(
                to = next.name(),
                "Dropping result of superseded wallet operation"
            );
            return Err(SessionError::Superseded);
        }
        self.transition(next);
        Ok(())
    }
}

// ============================================================================
// Builder
// ============================================================================

pub struct WalletSessionBuilder<P> {
    env: P,
    registry: ProviderRegistry,
    dispatch: DispatchConfig,
    config: SessionConfig,
}

impl<P: EnvironmentProbe> WalletSessionBuilder<P> {
    pub fn new(env: P) -> Self {
        Self {
            env,
            registry: ProviderRegistry::default(),
            dispatch: DispatchConfig::default(),
            config: SessionConfig::default(),
        }
    }

    pub fn registry(mut self, registry: ProviderRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn dispatch_config(mut self, config: DispatchConfig) -> Self {
        self.dispatch = config;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sign_on_connect(mut self, enabled: bool) -> Self {
        self.config.sign_on_connect = enabled;
        self
    }

    pub fn injection_wait(mut self, wait: Duration) -> Self {
        self.config.injection_wait_ms = wait.as_millis() as u64;
        self
    }

    pub fn error_reset(mut self, delay: Duration) -> Self {
        self.config.error_reset_ms = delay.as_millis() as u64;
        self
    }

    pub fn build(self) -> WalletSession<P> {
        WalletSession {
            env: self.env,
            registry: self.registry,
            dispatcher: Dispatcher::new(self.dispatch),
            config: self.config,
            state: RefCell::new(ConnectionState::Disconnected),
            generation: Cell::new(0),
        }
    }
}
