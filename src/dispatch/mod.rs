//! Capability dispatcher — address retrieval and message signing across
//! incompatible provider APIs.
//!
//! Each operation walks the probe chain for the handle's [`ProviderKind`]
//! (see [`chains`]) and short-circuits on the first success. Every provider
//! call is bounded by [`DispatchConfig::call_timeout_ms`] so a wallet that
//! never answers cannot hold the session in `Connecting`/`Signing` forever.

pub mod chains;

pub use chains::{AddressProbe, ArgOrder, SignPolicy, SignVariant};

use std::future::Future;
use std::time::Duration;

use futures_util::future::{select, Either};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing;

use crate::auth::SigningRequest;
use crate::constants::DEFAULT_CALL_TIMEOUT_MS;
use crate::error::{DispatchError, ProviderError};
use crate::provider::{ProviderHandle, ProviderSurface, RequestArguments};
use crate::shared::{BtcAddress, Signature};

/// Configuration for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Upper bound on a single provider call. `None` waits forever.
    pub call_timeout_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: Some(DEFAULT_CALL_TIMEOUT_MS),
        }
    }
}

impl DispatchConfig {
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_ms.map(Duration::from_millis)
    }
}

/// Runs probe chains against a resolved provider.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    // ── Address ──────────────────────────────────────────────────────────

    /// Ask the provider for its Bitcoin address.
    ///
    /// Absent probes are skipped and empty results fall through to the next
    /// probe. A call that throws or times out ends the chain.
    pub async fn get_address(
        &self,
        handle: Option<&ProviderHandle>,
    ) -> Result<BtcAddress, DispatchError> {
        let handle = handle.ok_or(DispatchError::NoProviderFound)?;
        let surface = handle.surface.as_ref();

        for probe in handle.kind.address_chain() {
            if !probe.applies(surface) {
                tracing::debug!(kind = %handle.kind, probe = probe.label(), "Address probe not available");
                continue;
            }

            let response = match probe {
                AddressProbe::Call(path) => self.invoke(surface.call(path, Vec::new())).await,
                AddressProbe::Property(path) => Ok(surface.property(path).unwrap_or(Value::Null)),
                AddressProbe::Request(method) => {
                    self.invoke(surface.request(RequestArguments::new(method, Vec::new())))
                        .await
                }
            };

            let response = response.map_err(|cause| {
                tracing::error!(kind = %handle.kind, probe = probe.label(), "Address probe failed: {}", cause);
                DispatchError::ProviderCallFailed { cause }
            })?;

            match BtcAddress::from_response(&response) {
                Some(address) => {
                    tracing::info!(kind = %handle.kind, probe = probe.label(), "Got Bitcoin address {}", address);
                    return Ok(address);
                }
                None => {
                    tracing::debug!(kind = %handle.kind, probe = probe.label(), "Address probe returned nothing");
                }
            }
        }

        Err(DispatchError::NoAddressReturned)
    }

    // ── Signing ──────────────────────────────────────────────────────────

    /// Ask the provider to sign `request.message` with `request.address`.
    pub async fn sign_message(
        &self,
        handle: Option<&ProviderHandle>,
        request: &SigningRequest,
    ) -> Result<Signature, DispatchError> {
        let handle = handle.ok_or(DispatchError::NoProviderFound)?;
        let surface = handle.surface.as_ref();
        let (chain, policy) = handle.kind.sign_chain();

        let mut attempted = 0usize;
        let mut last_cause: Option<ProviderError> = None;

        for variant in chain {
            if !variant.applies(surface) {
                if policy == SignPolicy::AttemptAll {
                    if let SignVariant::Call { path, .. } = variant {
                        last_cause = Some(ProviderError::MissingMethod(path.to_string()));
                    }
                }
                tracing::debug!(kind = %handle.kind, variant = %variant.label(), "Signing variant not available");
                continue;
            }

            attempted += 1;
            tracing::debug!(kind = %handle.kind, variant = %variant.label(), "Trying signing variant");

            match self.sign_with(surface, variant, request).await {
                Ok(signature) => {
                    tracing::info!(kind = %handle.kind, variant = %variant.label(), "Message signed");
                    return Ok(signature);
                }
                Err(cause) => {
                    tracing::warn!(kind = %handle.kind, variant = %variant.label(), "Signing variant failed: {}", cause);
                    last_cause = Some(cause);
                }
            }
        }

        match (policy, attempted, last_cause) {
            (SignPolicy::SkipAbsent, 0, _) => Err(DispatchError::NoSigningMethod),
            (SignPolicy::SkipAbsent, _, Some(cause)) => {
                Err(DispatchError::ProviderCallFailed { cause })
            }
            (SignPolicy::AttemptAll, _, Some(last_cause)) => {
                Err(DispatchError::SigningUnsupported { last_cause })
            }
            (_, _, None) => Err(DispatchError::NoSigningMethod),
        }
    }

    async fn sign_with(
        &self,
        surface: &dyn ProviderSurface,
        variant: &SignVariant,
        request: &SigningRequest,
    ) -> Result<Signature, ProviderError> {
        let response = match *variant {
            SignVariant::Call { path, order } => {
                self.invoke(surface.call(path, order.params(request))).await?
            }
            SignVariant::Request { method, order } => {
                self.invoke(surface.request(RequestArguments::new(method, order.params(request))))
                    .await?
            }
        };
        Ok(Signature::from_response(response))
    }

    // ── Timeout ──────────────────────────────────────────────────────────

    async fn invoke<F>(&self, call: F) -> Result<Value, ProviderError>
    where
        F: Future<Output = Result<Value, ProviderError>>,
    {
        let Some(timeout) = self.config.call_timeout() else {
            return call.await;
        };

        let call = Box::pin(call);
        let deadline = futures_timer::Delay::new(timeout).fuse();
        match select(call, deadline).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "Provider call timed out");
                Err(ProviderError::Timeout(timeout))
            }
        }
    }
}
