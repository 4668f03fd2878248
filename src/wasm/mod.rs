//! Browser bindings (feature `wasm`).
//!
//! - [`BrowserEnvironment`] / [`JsSurface`]: `globalThis` and injected
//!   provider objects, called through `Reflect` and `Function.apply`
//! - [`InitializedEvents`]: the `ethereum#initialized` listener as a stream
//! - [`WalletConnector`]: the exported JS API

pub mod connector;
pub mod env;
pub mod events;

pub use connector::{ConnectorConfig, DetectionWatch, WalletConnector};
pub use env::{js_error_message, BrowserEnvironment, JsSurface};
pub use events::InitializedEvents;

use wasm_bindgen::prelude::*;

/// Route Rust panics to `console.error`. Safe to call more than once.
#[wasm_bindgen(js_name = initPanicHook)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}
