//! Injection detection. Waits a bounded time for a wallet to show up.
//!
//! Extensions inject their globals asynchronously after page load. The
//! detection task:
//! - checks immediately
//! - re-checks every `poll_interval_ms` until `grace_period_ms` elapses
//! - re-checks on every provider-initialized notification, also after the
//!   grace window has closed
//! - stops as soon as a provider resolves
//!
//! [`detection_task`] returns the future plus a [`DetectionWatch`]. The
//! owner spawns the future (`spawn_local` in the browser) and keeps the watch;
//! dropping or disposing the watch aborts the task, which in turn drops the
//! notification stream and whatever listener backs it.

use futures_util::future::{AbortHandle, Abortable};
use futures_util::stream::{Stream, StreamExt};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing;

use crate::constants::{DEFAULT_GRACE_PERIOD_MS, DEFAULT_POLL_INTERVAL_MS};
use crate::provider::{EnvironmentProbe, ProviderRegistry};

// ============================================================================
// State
// ============================================================================

/// Whether a wallet has been found yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DetectionState {
    #[default]
    Checking,
    Detected,
    NotDetected,
}

impl DetectionState {
    pub fn detected(&self) -> bool {
        matches!(self, DetectionState::Detected)
    }

    pub fn checking(&self) -> bool {
        matches!(self, DetectionState::Checking)
    }

    /// Flattened view for UI gating.
    pub fn status(&self) -> DetectionStatus {
        DetectionStatus {
            detected: self.detected(),
            checking: self.checking(),
        }
    }
}

/// `{ detected, checking }` as the UI consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionStatus {
    pub detected: bool,
    pub checking: bool,
}

impl Serialize for DetectionState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.status().serialize(serializer)
    }
}

/// Configuration for the detection task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionConfig {
    pub poll_interval_ms: u64,
    pub grace_period_ms: u64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
        }
    }
}

// ============================================================================
// Watch handle
// ============================================================================

/// Disposer for a running detection task.
///
/// Aborts the task exactly once: on [`dispose`](Self::dispose) or on drop,
/// whichever comes first.
#[derive(Debug)]
pub struct DetectionWatch {
    abort: Option<AbortHandle>,
}

impl DetectionWatch {
    pub fn dispose(mut self) {
        self.abort_once();
    }

    pub fn is_disposed(&self) -> bool {
        self.abort.is_none()
    }

    fn abort_once(&mut self) {
        if let Some(handle) = self.abort.take() {
            tracing::debug!("Disposing wallet detection task");
            handle.abort();
        }
    }
}

impl Drop for DetectionWatch {
    fn drop(&mut self) {
        self.abort_once();
    }
}

// ============================================================================
// Task
// ============================================================================

/// Build a cancellable detection task.
///
/// `on_change` fires on every state transition, starting from
/// [`DetectionState::Checking`]; it is not called for the initial state.
pub fn detection_task<P, N, F>(
    env: P,
    registry: ProviderRegistry,
    config: DetectionConfig,
    initialized: N,
    on_change: F,
) -> (impl Future<Output = ()>, DetectionWatch)
where
    P: EnvironmentProbe,
    N: Stream<Item = ()> + Unpin,
    F: FnMut(DetectionState),
{
    let (abort_handle, abort_reg) = AbortHandle::new_pair();
    let task = async move {
        run_detection(&env, &registry, &config, initialized, on_change).await;
    };
    let task = Abortable::new(task, abort_reg).map(|_| ());

    (
        task,
        DetectionWatch {
            abort: Some(abort_handle),
        },
    )
}

enum Wake {
    Tick,
    GraceElapsed,
    Notified,
    NotificationsClosed,
    Idle,
}

/// Run detection to completion, returning the final state.
pub async fn run_detection<P, N, F>(
    env: &P,
    registry: &ProviderRegistry,
    config: &DetectionConfig,
    initialized: N,
    mut on_change: F,
) -> DetectionState
where
    P: EnvironmentProbe + ?Sized,
    N: Stream<Item = ()> + Unpin,
    F: FnMut(DetectionState),
{
    let mut state = DetectionState::Checking;
    let mut set_state = |next: DetectionState, state: &mut DetectionState| {
        if *state != next {
            tracing::info!(from = ?state, to = ?next, "Wallet detection state changed");
            *state = next;
            on_change(next);
        }
    };

    let found = |env: &P| registry.resolve(env).is_some();

    if found(env) {
        set_state(DetectionState::Detected, &mut state);
        return state;
    }

    let interval = Duration::from_millis(config.poll_interval_ms.max(1));
    let mut tick = futures_timer::Delay::new(interval).fuse();
    let mut grace = futures_timer::Delay::new(Duration::from_millis(config.grace_period_ms)).fuse();
    let mut notifications = initialized.fuse();
    let mut polling = true;

    loop {
        let wake = futures_util::select! {
            _ = tick => Wake::Tick,
            _ = grace => Wake::GraceElapsed,
            event = notifications.next() => match event {
                Some(()) => Wake::Notified,
                None => Wake::NotificationsClosed,
            },
            complete => Wake::Idle,
        };

        match wake {
            Wake::Tick => {
                if found(env) {
                    set_state(DetectionState::Detected, &mut state);
                    return state;
                }
                if polling {
                    tick = futures_timer::Delay::new(interval).fuse();
                }
            }
            Wake::GraceElapsed => {
                polling = false;
                if found(env) {
                    set_state(DetectionState::Detected, &mut state);
                    return state;
                }
                tracing::info!(grace_ms = config.grace_period_ms, "No wallet injected within grace window");
                set_state(DetectionState::NotDetected, &mut state);
            }
            Wake::Notified => {
                tracing::debug!("Provider initialized notification received");
                if found(env) {
                    set_state(DetectionState::Detected, &mut state);
                    return state;
                }
            }
            Wake::NotificationsClosed => {
                if !polling {
                    return state;
                }
            }
            Wake::Idle => return state,
        }
    }
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;
    use crate::provider::mock::{MockEnvironment, MockSurface};
    use futures_util::stream;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn fast_config() -> DetectionConfig {
        DetectionConfig {
            poll_interval_ms: 20,
            grace_period_ms: 100,
        }
    }

    #[test]
    fn test_status_view() {
        assert_eq!(
            DetectionState::Checking.status(),
            DetectionStatus { detected: false, checking: true }
        );
        assert_eq!(
            serde_json::to_value(DetectionState::NotDetected).unwrap(),
            json!({ "detected": false, "checking": false })
        );
    }

    #[tokio::test]
    async fn test_immediate_detection() {
        let env = MockEnvironment::new();
        env.install(&["ctrl"], MockSurface::new());

        let changes = RefCell::new(Vec::new());
        let state = run_detection(
            &env,
            &ProviderRegistry::default(),
            &fast_config(),
            stream::pending(),
            |s| changes.borrow_mut().push(s),
        )
        .await;

        assert_eq!(state, DetectionState::Detected);
        assert_eq!(*changes.borrow(), vec![DetectionState::Detected]);
    }

    #[tokio::test]
    async fn test_not_detected_after_grace_then_closed_stream_ends() {
        let env = MockEnvironment::new();
        let changes = RefCell::new(Vec::new());

        let state = run_detection(
            &env,
            &ProviderRegistry::default(),
            &fast_config(),
            stream::empty(),
            |s| changes.borrow_mut().push(s),
        )
        .await;

        assert_eq!(state, DetectionState::NotDetected);
        assert_eq!(*changes.borrow(), vec![DetectionState::NotDetected]);
    }

    #[tokio::test]
    async fn test_notification_after_grace_flips_to_detected() {
        let env = MockEnvironment::new();
        let events = env.initialized_events();
        let changes = Rc::new(RefCell::new(Vec::new()));
        let registry = ProviderRegistry::default();
        let config = fast_config();

        let detect = run_detection(
            &env,
            &registry,
            &config,
            events,
            {
                let changes = changes.clone();
                move |s| changes.borrow_mut().push(s)
            },
        );

        let inject = async {
            futures_timer::Delay::new(Duration::from_millis(200)).await;
            env.install(&["ethereum"], MockSurface::new().with_property("isCtrl", json!(true)));
            env.notify_initialized();
        };

        let (state, ()) = futures_util::future::join(detect, inject).await;
        assert_eq!(state, DetectionState::Detected);
        assert_eq!(
            *changes.borrow(),
            vec![DetectionState::NotDetected, DetectionState::Detected]
        );
    }

    #[tokio::test]
    async fn test_dispose_aborts_and_releases_listener() {
        let env = MockEnvironment::new();
        let events = env.initialized_events();
        let (task, watch) = detection_task(
            env.clone(),
            ProviderRegistry::default(),
            DetectionConfig {
                poll_interval_ms: 10,
                grace_period_ms: 10_000,
            },
            events,
            |_| {},
        );

        assert!(!watch.is_disposed());
        let run = async {
            futures_timer::Delay::new(Duration::from_millis(30)).await;
            watch.dispose();
        };
        futures_util::future::join(task, run).await;

        assert_eq!(env.listener_count(), 0);
    }
}
