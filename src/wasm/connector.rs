//! `WalletConnector` — the JS-facing API.
//!
//! ```js
//! const connector = new WalletConnector({ session: { signOnConnect: true } });
//! const watch = connector.watchDetection(({ detected, checking }) => render(detected, checking));
//! const wallet = await connector.connect();   // { status, address, signature, message, walletType }
//! await connector.signMessage();
//! connector.disconnect();
//! watch.dispose();
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use js_sys::{Function, Promise};
use serde::{Deserialize, Serialize};
use tracing;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use crate::detect::{self, detection_task, DetectionConfig, DetectionState};
use crate::dispatch::DispatchConfig;
use crate::error::SessionError;
use crate::session::{ConnectionState, SessionConfig, WalletSession};

use super::env::{js_error_message, to_js, BrowserEnvironment};
use super::events::InitializedEvents;

/// Everything configurable from JS. All keys optional, camelCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectorConfig {
    pub session: SessionConfig,
    pub detection: DetectionConfig,
    pub dispatch: DispatchConfig,
}

#[wasm_bindgen]
pub struct WalletConnector {
    session: Rc<WalletSession<BrowserEnvironment>>,
    detection: DetectionConfig,
    recovery: Rc<RefCell<Option<Timeout>>>,
}

#[wasm_bindgen]
impl WalletConnector {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WalletConnector, JsValue> {
        let config: ConnectorConfig = if config.is_undefined() || config.is_null() {
            ConnectorConfig::default()
        } else {
            serde_wasm_bindgen::from_value(config)
                .map_err(|e| js_sys::Error::new(&format!("Invalid connector config: {}", e)))?
        };

        let session = WalletSession::builder(BrowserEnvironment::new())
            .config(config.session)
            .dispatch_config(config.dispatch)
            .build();

        Ok(Self {
            session: Rc::new(session),
            detection: config.detection,
            recovery: Rc::new(RefCell::new(None)),
        })
    }

    /// Resolves with the connected wallet; rejects with an `Error`.
    pub fn connect(&self) -> Promise {
        let session = self.session.clone();
        self.cancel_recovery();
        future_to_promise(async move {
            let wallet = session.connect().await.map_err(to_js_error)?;
            to_js(&ConnectionState::Connected(wallet))
        })
    }

    /// Sign a fresh ownership message. A failure clears itself after
    /// `errorResetMs`.
    #[wasm_bindgen(js_name = signMessage)]
    pub fn sign_message(&self) -> Promise {
        let session = self.session.clone();
        let recovery = self.recovery.clone();
        future_to_promise(async move {
            match session.sign().await {
                Ok(wallet) => to_js(&ConnectionState::Connected(wallet)),
                Err(err) => {
                    schedule_recovery(&session, &recovery);
                    Err(to_js_error(err))
                }
            }
        })
    }

    pub fn disconnect(&self) {
        self.cancel_recovery();
        self.session.disconnect();
    }

    /// Current `ConnectionState` as a plain object tagged by `status`.
    pub fn state(&self) -> Result<JsValue, JsValue> {
        to_js(&self.session.state())
    }

    /// Whether a wallet is resolvable right now.
    pub fn detected(&self) -> bool {
        self.session.resolve().is_some()
    }

    /// Start detection. `callback` receives `{ detected, checking }`, first
    /// with the initial state and then on every change.
    #[wasm_bindgen(js_name = watchDetection)]
    pub fn watch_detection(&self, callback: Function) -> DetectionWatch {
        let notify = move |state: DetectionState| match to_js(&state) {
            Ok(value) => {
                if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                    tracing::warn!("Detection callback threw: {}", js_error_message(&e));
                }
            }
            Err(e) => tracing::error!("Failed to convert detection state: {}", js_error_message(&e)),
        };

        notify(DetectionState::Checking);

        let (task, watch) = detection_task(
            self.session.environment().clone(),
            self.session.registry().clone(),
            self.detection.clone(),
            InitializedEvents::listen(),
            notify,
        );
        spawn_local(task);

        DetectionWatch { inner: Some(watch) }
    }

    fn cancel_recovery(&self) {
        // Dropping a pending `Timeout` cancels it.
        self.recovery.borrow_mut().take();
    }
}

/// Handle returned by `watchDetection`.
#[wasm_bindgen]
pub struct DetectionWatch {
    inner: Option<detect::DetectionWatch>,
}

#[wasm_bindgen]
impl DetectionWatch {
    /// Stop polling and remove the event listener. Idempotent.
    pub fn dispose(&mut self) {
        if let Some(watch) = self.inner.take() {
            watch.dispose();
        }
    }
}

fn schedule_recovery(
    session: &Rc<WalletSession<BrowserEnvironment>>,
    recovery: &Rc<RefCell<Option<Timeout>>>,
) {
    if !matches!(session.state(), ConnectionState::Error { recover: Some(_), .. }) {
        return;
    }

    let generation = session.generation();
    let delay = u32::try_from(session.config().error_reset_ms).unwrap_or(u32::MAX);
    let session = session.clone();
    let timeout = Timeout::new(delay, move || {
        session.recover_from_error(generation);
    });

    *recovery.borrow_mut() = Some(timeout);
}

fn to_js_error(err: SessionError) -> JsValue {
    js_sys::Error::new(&err.to_string()).into()
}
