//! Detection timing with default configuration.

#![cfg(not(target_arch = "wasm32"))]

use std::cell::RefCell;
use std::time::{Duration, Instant};

use futures_util::future::join;
use futures_util::stream;
use serde_json::json;

use ctrl_connect::detect::{detection_task, run_detection};
use ctrl_connect::prelude::*;
use ctrl_connect::provider::mock::{MockEnvironment, MockSurface};

async fn sleep_ms(ms: u64) {
    futures_timer::Delay::new(Duration::from_millis(ms)).await;
}

#[tokio::test]
async fn test_no_globals_not_detected_after_grace_window() {
    let env = MockEnvironment::new();
    let changes = RefCell::new(Vec::new());
    let started = Instant::now();

    let (task, watch) = detection_task(
        env.clone(),
        ProviderRegistry::default(),
        DetectionConfig::default(),
        env.initialized_events(),
        |state| changes.borrow_mut().push((state, started.elapsed())),
    );

    join(task, async {
        sleep_ms(1000).await;
        assert!(changes.borrow().is_empty(), "still checking inside the grace window");
        sleep_ms(700).await;
        watch.dispose();
    })
    .await;

    let changes = changes.into_inner();
    assert_eq!(changes.len(), 1);
    let (state, at) = changes[0];
    assert_eq!(state, DetectionState::NotDetected);
    assert_eq!(
        serde_json::to_value(state).unwrap(),
        json!({ "detected": false, "checking": false })
    );
    assert!(at >= Duration::from_millis(1400), "settled too early: {at:?}");
    assert_eq!(env.listener_count(), 0);
}

#[tokio::test]
async fn test_primary_injected_late_is_detected_before_grace() {
    let env = MockEnvironment::new();
    let started = Instant::now();

    let (state, ()) = join(
        run_detection(
            &env,
            &ProviderRegistry::default(),
            &DetectionConfig::default(),
            stream::pending(),
            |_| {},
        ),
        async {
            sleep_ms(800).await;
            env.install(&["xfi"], MockSurface::new());
        },
    )
    .await;

    assert_eq!(state, DetectionState::Detected);
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test]
async fn test_unflagged_ethereum_is_ignored() {
    let env = MockEnvironment::new();
    env.install(&["ethereum"], MockSurface::new().with_property("isCtrl", json!(false)));

    let state = run_detection(
        &env,
        &ProviderRegistry::default(),
        &DetectionConfig {
            poll_interval_ms: 20,
            grace_period_ms: 80,
        },
        stream::empty(),
        |_| {},
    )
    .await;

    assert_eq!(state, DetectionState::NotDetected);
}

#[test]
fn test_detection_config_from_camel_case() {
    let config: DetectionConfig =
        serde_json::from_value(json!({ "gracePeriodMs": 3000 })).unwrap();
    assert_eq!(config.grace_period_ms, 3000);
    assert_eq!(config.poll_interval_ms, 500);
}
