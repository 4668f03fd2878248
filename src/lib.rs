//! # ctrl-connect
//!
//! Connects a web app to an injected Ctrl Bitcoin wallet: finds the provider
//! the extension injected, reads its address and asks it to sign messages,
//! across wallets that expose incompatible APIs.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core** — Newtypes, constants, errors, authentication messages
//! 2. **Provider** — `EnvironmentProbe` / `ProviderSurface` seams and the injection-point registry
//! 3. **Dispatch** — Probe chains for address retrieval and signing, with per-call timeouts
//! 4. **Detection + Session** — Bounded injection wait and the connection state machine
//! 5. **WASM** — Browser implementations and the `WalletConnector` JS API (feature `wasm`)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ctrl_connect::prelude::*;
//!
//! let session = WalletSession::builder(BrowserEnvironment::new())
//!     .sign_on_connect(true)
//!     .build();
//!
//! let wallet = session.connect().await?;
//! let signed = session.sign().await?;
//! assert_eq!(signed.address, wallet.address);
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and value helpers.
pub mod shared;

/// Global names, method names and default timings.
pub mod constants;

/// Unified error types.
pub mod error;

/// Messages the user is asked to sign.
pub mod auth;

// ── Layer 2: Provider ────────────────────────────────────────────────────────

/// Provider abstraction, registry and in-memory mocks.
pub mod provider;

// ── Layer 3: Dispatch ────────────────────────────────────────────────────────

/// Capability dispatch across provider APIs.
pub mod dispatch;

// ── Layer 4: Detection + Session ─────────────────────────────────────────────

/// Injection detection with a grace window.
pub mod detect;

/// `WalletSession` — the connection state machine.
pub mod session;

// ── Layer 5: WASM ────────────────────────────────────────────────────────────

/// Browser environment and JS API.
#[cfg(feature = "wasm")]
pub mod wasm;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{BtcAddress, Signature};

    // Errors
    pub use crate::error::{DispatchError, ProviderError, SessionError};

    // Auth
    pub use crate::auth::SigningRequest;

    // Provider
    pub use crate::provider::{
        EnvironmentProbe, ProviderHandle, ProviderKind, ProviderRegistry, ProviderSurface,
        RequestArguments,
    };

    // Dispatch
    pub use crate::dispatch::{DispatchConfig, Dispatcher};

    // Detection
    pub use crate::detect::{detection_task, DetectionConfig, DetectionState, DetectionWatch};

    // Session
    pub use crate::session::{
        ConnectedWallet, ConnectionState, SessionConfig, WalletSession, WalletSessionBuilder,
    };

    // Browser
    #[cfg(feature = "wasm")]
    pub use crate::wasm::{BrowserEnvironment, ConnectorConfig, WalletConnector};
}
