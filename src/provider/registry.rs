//! Provider registry: finds the first injected wallet in priority order.

use tracing;

use crate::constants::{
    GLOBAL_CTRL, GLOBAL_ETHEREUM, GLOBAL_PROVIDER_REGISTRY, GLOBAL_XFI, MARKER_IS_CTRL,
    REGISTRY_CTRL_WALLET, REGISTRY_PROVIDER_FIELD,
};
use crate::shared::is_truthy;

use super::{EnvironmentProbe, ProviderHandle, ProviderKind};

/// One place a wallet may inject itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    pub kind: ProviderKind,
    /// Path from the global scope to the provider object.
    pub path: &'static [&'static str],
    /// Property that must be truthy on the object for it to count.
    pub marker: Option<&'static str>,
}

impl InjectionPoint {
    /// The global this point hangs off.
    pub fn root(&self) -> Option<&'static str> {
        self.path.first().copied()
    }
}

/// Built-in injection points, highest priority first.
pub const INJECTION_POINTS: &[InjectionPoint] = &[
    InjectionPoint {
        kind: ProviderKind::PrimaryExtension,
        path: &[GLOBAL_XFI],
        marker: None,
    },
    InjectionPoint {
        kind: ProviderKind::BrowserIntegrated,
        path: &[GLOBAL_ETHEREUM],
        marker: Some(MARKER_IS_CTRL),
    },
    InjectionPoint {
        kind: ProviderKind::NamedRegistry,
        path: &[
            GLOBAL_PROVIDER_REGISTRY,
            REGISTRY_CTRL_WALLET,
            REGISTRY_PROVIDER_FIELD,
        ],
        marker: None,
    },
    InjectionPoint {
        kind: ProviderKind::DirectGlobal,
        path: &[GLOBAL_CTRL],
        marker: None,
    },
];

/// Ordered table of injection points.
///
/// Supporting another wallet shape means appending a point, not writing new
/// lookup code.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    points: Vec<InjectionPoint>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self {
            points: INJECTION_POINTS.to_vec(),
        }
    }
}

impl ProviderRegistry {
    pub fn new(points: Vec<InjectionPoint>) -> Self {
        Self { points }
    }

    /// Append a lower-priority injection point.
    pub fn with_point(mut self, point: InjectionPoint) -> Self {
        self.points.push(point);
        self
    }

    pub fn points(&self) -> &[InjectionPoint] {
        &self.points
    }

    /// Return the first injection point that currently holds a provider.
    pub fn resolve<P: EnvironmentProbe + ?Sized>(&self, env: &P) -> Option<ProviderHandle> {
        for point in &self.points {
            let Some(surface) = env.object(point.path) else {
                continue;
            };

            if let Some(marker) = point.marker {
                let flagged = surface
                    .property(marker)
                    .map(|v| is_truthy(&v))
                    .unwrap_or(false);
                if !flagged {
                    tracing::debug!(kind = %point.kind, marker, "Provider present but marker not set");
                    continue;
                }
            }

            tracing::info!(kind = %point.kind, "Found wallet provider");
            return Some(ProviderHandle::new(point.kind, surface));
        }

        tracing::debug!("No wallet provider found");
        None
    }

    /// Whether any injection root global exists, usable or not.
    pub fn any_global_present<P: EnvironmentProbe + ?Sized>(&self, env: &P) -> bool {
        self.points
            .iter()
            .filter_map(InjectionPoint::root)
            .any(|root| env.object(&[root]).is_some())
    }
}

/// [`ProviderRegistry::resolve`] over the built-in table.
pub fn resolve_provider<P: EnvironmentProbe + ?Sized>(env: &P) -> Option<ProviderHandle> {
    ProviderRegistry::default().resolve(env)
}

/// [`ProviderRegistry::any_global_present`] over the built-in table.
pub fn any_global_present<P: EnvironmentProbe + ?Sized>(env: &P) -> bool {
    ProviderRegistry::default().any_global_present(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockEnvironment, MockSurface};
    use serde_json::json;

    fn registry_surface() -> MockSurface {
        MockSurface::new().with_method("request", |_| Ok(json!(["bc1qreg"])))
    }

    #[test]
    fn test_each_shape_resolves_to_its_kind() {
        let env = MockEnvironment::new();
        env.install(&["xfi"], MockSurface::new());
        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::PrimaryExtension);

        let env = MockEnvironment::new();
        env.install(&["ethereum"], MockSurface::new().with_property("isCtrl", json!(true)));
        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::BrowserIntegrated);

        let env = MockEnvironment::new();
        env.install(&["ctrlEthProviders", "Ctrl Wallet", "provider"], registry_surface());
        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::NamedRegistry);

        let env = MockEnvironment::new();
        env.install(&["ctrl"], MockSurface::new());
        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::DirectGlobal);
    }

    #[test]
    fn test_primary_wins_when_all_present() {
        let env = MockEnvironment::new();
        env.install(&["ctrl"], MockSurface::new());
        env.install(&["ctrlEthProviders", "Ctrl Wallet", "provider"], registry_surface());
        env.install(&["ethereum"], MockSurface::new().with_property("isCtrl", json!(true)));
        env.install(&["xfi"], MockSurface::new());

        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::PrimaryExtension);

        env.remove(&["xfi"]);
        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::BrowserIntegrated);
    }

    #[test]
    fn test_unflagged_ethereum_is_skipped() {
        let env = MockEnvironment::new();
        env.install(&["ethereum"], MockSurface::new().with_property("isMetaMask", json!(true)));
        assert!(resolve_provider(&env).is_none());
        assert!(any_global_present(&env));

        env.install(&["ctrl"], MockSurface::new());
        assert_eq!(resolve_provider(&env).unwrap().kind, ProviderKind::DirectGlobal);
    }

    #[test]
    fn test_registry_without_ctrl_entry_is_absent() {
        let env = MockEnvironment::new();
        env.install(&["ctrlEthProviders", "Other Wallet", "provider"], registry_surface());
        assert!(resolve_provider(&env).is_none());
    }

    #[test]
    fn test_empty_environment() {
        let env = MockEnvironment::new();
        assert!(resolve_provider(&env).is_none());
        assert!(!any_global_present(&env));
    }

    #[test]
    fn test_custom_point_is_lowest_priority() {
        let registry = ProviderRegistry::default().with_point(InjectionPoint {
            kind: ProviderKind::DirectGlobal,
            path: &["ctrlWalletLegacy"],
            marker: None,
        });
        assert_eq!(registry.points().len(), 5);

        let env = MockEnvironment::new();
        env.install(&["ctrlWalletLegacy"], MockSurface::new());
        assert_eq!(registry.resolve(&env).unwrap().kind, ProviderKind::DirectGlobal);
        assert!(resolve_provider(&env).is_none());
    }
}
