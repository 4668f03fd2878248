//! Providers — the injected wallet objects and the host environment they live in.
//!
//! Nothing here touches real browser globals. Host access goes through
//! [`EnvironmentProbe`], and every injected object is seen through
//! [`ProviderSurface`]. The `wasm` feature supplies browser implementations;
//! [`mock`] supplies in-memory ones.

pub mod mock;
pub mod registry;

pub use registry::{any_global_present, resolve_provider, InjectionPoint, ProviderRegistry};

use std::rc::Rc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::METHOD_REQUEST;
use crate::error::ProviderError;

// ============================================================================
// Provider kind + handle
// ============================================================================

/// Which injection point a provider was found at.
///
/// Serializes to the wallet-type strings shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// `window.xfi`, with dedicated Bitcoin accessors.
    #[serde(rename = "xfi")]
    PrimaryExtension,
    /// `window.ethereum` flagged with `isCtrl`.
    #[serde(rename = "brave-ctrl")]
    BrowserIntegrated,
    /// `window.ctrlEthProviders["Ctrl Wallet"].provider`.
    #[serde(rename = "ctrlEthProviders")]
    NamedRegistry,
    /// `window.ctrl`.
    #[serde(rename = "ctrl")]
    DirectGlobal,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryExtension => "xfi",
            Self::BrowserIntegrated => "brave-ctrl",
            Self::NamedRegistry => "ctrlEthProviders",
            Self::DirectGlobal => "ctrl",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared reference to an injected object.
pub type SurfaceRef = Rc<dyn ProviderSurface>;

/// A resolved provider: where it was found plus the object itself.
///
/// Resolved fresh for every operation; extensions can be toggled at any time.
#[derive(Clone)]
pub struct ProviderHandle {
    pub kind: ProviderKind,
    pub surface: SurfaceRef,
}

impl ProviderHandle {
    pub fn new(kind: ProviderKind, surface: SurfaceRef) -> Self {
        Self { kind, surface }
    }
}

impl std::fmt::Debug for ProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderHandle")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Seams
// ============================================================================

/// Arguments for the generic `request` entry point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestArguments {
    pub method: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl RequestArguments {
    pub fn new(method: &str, params: Vec<Value>) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }
}

/// An untrusted object injected by a wallet extension.
///
/// Paths are dot-separated (`"bitcoin.getAccounts"`). Implementations must
/// treat a missing segment as absent, never as an error.
#[async_trait(?Send)]
pub trait ProviderSurface {
    /// Whether `path` resolves to something callable.
    fn has_method(&self, path: &str) -> bool;

    /// Read a non-function value at `path`. `None` when absent or null.
    fn property(&self, path: &str) -> Option<Value>;

    /// Call the function at `path`, awaiting it if it returns a promise.
    async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value, ProviderError>;

    /// `request({ method, params })`.
    async fn request(&self, args: RequestArguments) -> Result<Value, ProviderError> {
        let payload = serde_json::to_value(&args)?;
        self.call(METHOD_REQUEST, vec![payload]).await
    }
}

/// Read-only view of the host's global scope.
pub trait EnvironmentProbe {
    /// Walk `path` from the global scope. `None` as soon as a segment is
    /// undefined or null.
    fn object(&self, path: &[&str]) -> Option<SurfaceRef>;
}

impl<T: EnvironmentProbe + ?Sized> EnvironmentProbe for Rc<T> {
    fn object(&self, path: &[&str]) -> Option<SurfaceRef> {
        (**self).object(path)
    }
}

impl<T: EnvironmentProbe + ?Sized> EnvironmentProbe for &T {
    fn object(&self, path: &[&str]) -> Option<SurfaceRef> {
        (**self).object(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_arguments_omit_empty_params() {
        let args = RequestArguments::new("btc_requestAccounts", vec![]);
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!({ "method": "btc_requestAccounts" })
        );

        let args = RequestArguments::new("personal_sign", vec![json!("hi"), json!("bc1q")]);
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!({ "method": "personal_sign", "params": ["hi", "bc1q"] })
        );
    }

    #[test]
    fn test_provider_kind_wire_names() {
        assert_eq!(
            serde_json::to_value(ProviderKind::BrowserIntegrated).unwrap(),
            json!("brave-ctrl")
        );
        let kind: ProviderKind = serde_json::from_value(json!("ctrlEthProviders")).unwrap();
        assert_eq!(kind, ProviderKind::NamedRegistry);
        assert_eq!(ProviderKind::PrimaryExtension.to_string(), "xfi");
    }
}
