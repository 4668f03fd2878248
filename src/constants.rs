//! Literal names wallet extensions inject and respond to.
//!
//! These must match the extensions byte-for-byte; they are not ours to choose.

// ─── Host globals ────────────────────────────────────────────────────────────

/// XFI / Ctrl extension object with a Bitcoin sub-API.
pub const GLOBAL_XFI: &str = "xfi";

/// EIP-1193 style provider, Ctrl-flavored when [`MARKER_IS_CTRL`] is set.
pub const GLOBAL_ETHEREUM: &str = "ethereum";

/// Named provider registry keyed by wallet display name.
pub const GLOBAL_PROVIDER_REGISTRY: &str = "ctrlEthProviders";

/// Registry entry for the Ctrl wallet.
pub const REGISTRY_CTRL_WALLET: &str = "Ctrl Wallet";

/// Field holding the provider inside a registry entry.
pub const REGISTRY_PROVIDER_FIELD: &str = "provider";

/// Bare global fallback.
pub const GLOBAL_CTRL: &str = "ctrl";

/// Vendor marker on the browser-integrated provider.
pub const MARKER_IS_CTRL: &str = "isCtrl";

// ─── Methods and properties ──────────────────────────────────────────────────

/// Generic `request({ method, params })` entry point.
pub const METHOD_REQUEST: &str = "request";

pub const METHOD_BITCOIN_GET_ACCOUNTS: &str = "bitcoin.getAccounts";
pub const METHOD_BITCOIN_REQUEST_ACCOUNTS: &str = "bitcoin.requestAccounts";
pub const METHOD_GET_ADDRESSES: &str = "getAddresses";
pub const PROPERTY_ADDRESSES: &str = "addresses";
pub const PROPERTY_SELECTED_ADDRESS: &str = "selectedAddress";

pub const METHOD_BITCOIN_SIGN_MESSAGE: &str = "bitcoin.signMessage";
pub const METHOD_SIGN_MESSAGE: &str = "signMessage";
pub const METHOD_SIGN: &str = "sign";

// ─── RPC method identifiers ──────────────────────────────────────────────────

pub const RPC_BTC_REQUEST_ACCOUNTS: &str = "btc_requestAccounts";
pub const RPC_BTC_SIGN_MESSAGE: &str = "btc_signMessage";
pub const RPC_PERSONAL_SIGN: &str = "personal_sign";

// ─── Events ──────────────────────────────────────────────────────────────────

/// Fired on `window` when a provider finishes late injection.
pub const EVENT_PROVIDER_INITIALIZED: &str = "ethereum#initialized";

// ─── Default timings ─────────────────────────────────────────────────────────

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 1_500;
pub const DEFAULT_INJECTION_WAIT_MS: u64 = 1_000;
pub const DEFAULT_ERROR_RESET_MS: u64 = 5_000;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 60_000;
