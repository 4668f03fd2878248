//! Ordered candidate operations per provider kind.
//!
//! Wallets disagree on method names and on parameter order, so each
//! operation is a list of candidates tried top to bottom. Supporting another
//! convention is a table edit.

use serde_json::Value;

use crate::auth::SigningRequest;
use crate::constants::{
    METHOD_BITCOIN_GET_ACCOUNTS, METHOD_BITCOIN_REQUEST_ACCOUNTS, METHOD_BITCOIN_SIGN_MESSAGE,
    METHOD_GET_ADDRESSES, METHOD_SIGN, METHOD_SIGN_MESSAGE, PROPERTY_ADDRESSES,
    PROPERTY_SELECTED_ADDRESS, RPC_BTC_REQUEST_ACCOUNTS, RPC_BTC_SIGN_MESSAGE, RPC_PERSONAL_SIGN,
};
use crate::provider::{ProviderKind, ProviderSurface};

// ─── Address ─────────────────────────────────────────────────────────────────

/// One way of asking a provider for its address(es).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressProbe {
    /// Call a zero-argument accessor.
    Call(&'static str),
    /// Read a property.
    Property(&'static str),
    /// `request({ method })`.
    Request(&'static str),
}

impl AddressProbe {
    /// Whether the provider exposes what this probe needs.
    ///
    /// `request` is always attempted; a provider without it fails the call.
    pub fn applies(&self, surface: &dyn ProviderSurface) -> bool {
        match self {
            AddressProbe::Call(path) => surface.has_method(path),
            AddressProbe::Property(path) => surface.property(path).is_some(),
            AddressProbe::Request(_) => true,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AddressProbe::Call(path) | AddressProbe::Property(path) | AddressProbe::Request(path) => {
                path
            }
        }
    }
}

pub const PRIMARY_ADDRESS_CHAIN: &[AddressProbe] = &[
    AddressProbe::Call(METHOD_BITCOIN_GET_ACCOUNTS),
    AddressProbe::Call(METHOD_BITCOIN_REQUEST_ACCOUNTS),
    AddressProbe::Call(METHOD_GET_ADDRESSES),
    AddressProbe::Property(PROPERTY_ADDRESSES),
    AddressProbe::Property(PROPERTY_SELECTED_ADDRESS),
];

pub const GENERIC_ADDRESS_CHAIN: &[AddressProbe] =
    &[AddressProbe::Request(RPC_BTC_REQUEST_ACCOUNTS)];

// ─── Signing ─────────────────────────────────────────────────────────────────

/// Positional order of `(message, address)` in a signing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgOrder {
    MessageFirst,
    AddressFirst,
}

impl ArgOrder {
    pub fn params(&self, request: &SigningRequest) -> Vec<Value> {
        let message = Value::String(request.message.clone());
        let address = Value::String(request.address.as_str().to_string());
        match self {
            ArgOrder::MessageFirst => vec![message, address],
            ArgOrder::AddressFirst => vec![address, message],
        }
    }
}

/// One way of asking a provider to sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignVariant {
    /// Call a signing function directly.
    Call { path: &'static str, order: ArgOrder },
    /// `request({ method, params })`.
    Request { method: &'static str, order: ArgOrder },
}

impl SignVariant {
    pub fn applies(&self, surface: &dyn ProviderSurface) -> bool {
        match self {
            SignVariant::Call { path, .. } => surface.has_method(path),
            SignVariant::Request { .. } => true,
        }
    }

    pub fn label(&self) -> String {
        match self {
            SignVariant::Call { path, order } => format!("{}({:?})", path, order),
            SignVariant::Request { method, order } => format!("request:{}({:?})", method, order),
        }
    }
}

pub const PRIMARY_SIGN_CHAIN: &[SignVariant] = &[
    SignVariant::Call {
        path: METHOD_BITCOIN_SIGN_MESSAGE,
        order: ArgOrder::MessageFirst,
    },
    SignVariant::Call {
        path: METHOD_SIGN_MESSAGE,
        order: ArgOrder::MessageFirst,
    },
    SignVariant::Call {
        path: METHOD_SIGN,
        order: ArgOrder::MessageFirst,
    },
];

pub const GENERIC_SIGN_CHAIN: &[SignVariant] = &[
    SignVariant::Request {
        method: RPC_BTC_SIGN_MESSAGE,
        order: ArgOrder::MessageFirst,
    },
    SignVariant::Request {
        method: RPC_BTC_SIGN_MESSAGE,
        order: ArgOrder::AddressFirst,
    },
    SignVariant::Request {
        method: RPC_PERSONAL_SIGN,
        order: ArgOrder::MessageFirst,
    },
    SignVariant::Call {
        path: METHOD_SIGN_MESSAGE,
        order: ArgOrder::MessageFirst,
    },
];

/// How a chain treats candidates the provider does not expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignPolicy {
    /// Skip absent candidates; none present means no signing support at all.
    SkipAbsent,
    /// Every candidate counts as an attempt; an absent one is a failure.
    AttemptAll,
}

impl ProviderKind {
    pub fn address_chain(&self) -> &'static [AddressProbe] {
        match self {
            ProviderKind::PrimaryExtension => PRIMARY_ADDRESS_CHAIN,
            _ => GENERIC_ADDRESS_CHAIN,
        }
    }

    pub fn sign_chain(&self) -> (&'static [SignVariant], SignPolicy) {
        match self {
            ProviderKind::PrimaryExtension => (PRIMARY_SIGN_CHAIN, SignPolicy::SkipAbsent),
            _ => (GENERIC_SIGN_CHAIN, SignPolicy::AttemptAll),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::BtcAddress;
    use serde_json::json;

    #[test]
    fn test_arg_order() {
        let req = SigningRequest::new("hello", BtcAddress::from("bc1q"));
        assert_eq!(ArgOrder::MessageFirst.params(&req), vec![json!("hello"), json!("bc1q")]);
        assert_eq!(ArgOrder::AddressFirst.params(&req), vec![json!("bc1q"), json!("hello")]);
    }

    #[test]
    fn test_chain_selection() {
        assert_eq!(ProviderKind::PrimaryExtension.address_chain().len(), 5);
        for kind in [
            ProviderKind::BrowserIntegrated,
            ProviderKind::NamedRegistry,
            ProviderKind::DirectGlobal,
        ] {
            assert_eq!(kind.address_chain(), GENERIC_ADDRESS_CHAIN);
            let (chain, policy) = kind.sign_chain();
            assert_eq!(chain.len(), 4);
            assert_eq!(policy, SignPolicy::AttemptAll);
        }
    }
}
