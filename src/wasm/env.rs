//! Browser globals as an [`EnvironmentProbe`] and injected JS objects as
//! [`ProviderSurface`]s.

use std::rc::Rc;

use async_trait::async_trait;
use js_sys::{Array, Function, Promise, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::ProviderError;
use crate::provider::{EnvironmentProbe, ProviderSurface, SurfaceRef};

/// The page's global scope (`globalThis`).
#[derive(Clone)]
pub struct BrowserEnvironment {
    global: JsValue,
}

impl BrowserEnvironment {
    pub fn new() -> Self {
        Self {
            global: js_sys::global().into(),
        }
    }
}

impl Default for BrowserEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentProbe for BrowserEnvironment {
    fn object(&self, path: &[&str]) -> Option<SurfaceRef> {
        let mut current = self.global.clone();
        for segment in path {
            current = get(&current, segment)?;
        }
        Some(Rc::new(JsSurface::new(current)))
    }
}

/// An untrusted object injected by a wallet.
#[derive(Clone)]
pub struct JsSurface {
    target: JsValue,
}

impl JsSurface {
    pub fn new(target: JsValue) -> Self {
        Self { target }
    }

    /// Walk a dotted path, returning `(owner, value)` so calls keep `this`.
    fn resolve(&self, path: &str) -> Option<(JsValue, JsValue)> {
        let mut owner = self.target.clone();
        let mut segments = path.split('.').peekable();
        while let Some(segment) = segments.next() {
            let value = get(&owner, segment)?;
            if segments.peek().is_none() {
                return Some((owner, value));
            }
            owner = value;
        }
        None
    }
}

#[async_trait(?Send)]
impl ProviderSurface for JsSurface {
    fn has_method(&self, path: &str) -> bool {
        self.resolve(path)
            .map(|(_, value)| value.is_function())
            .unwrap_or(false)
    }

    fn property(&self, path: &str) -> Option<Value> {
        let (_, value) = self.resolve(path)?;
        if value.is_function() {
            return None;
        }
        json_from_js(&value).filter(|v| !v.is_null())
    }

    async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value, ProviderError> {
        let (owner, value) = self
            .resolve(path)
            .filter(|(_, value)| value.is_function())
            .ok_or_else(|| ProviderError::MissingMethod(path.to_string()))?;
        let function: Function = value.unchecked_into();

        let js_args = Array::new();
        for arg in &args {
            js_args.push(&to_js(arg).map_err(|e| ProviderError::thrown(js_error_message(&e)))?);
        }

        // Providers may throw synchronously or return a plain value instead
        // of a promise; `Promise.resolve` folds both into one await.
        let returned = function.apply(&owner, &js_args).map_err(thrown)?;
        let settled = JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(thrown)?;

        Ok(from_js(&settled))
    }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

fn get(target: &JsValue, key: &str) -> Option<JsValue> {
    if target.is_undefined() || target.is_null() {
        return None;
    }
    Reflect::get(target, &JsValue::from_str(key))
        .ok()
        .filter(|v| !v.is_undefined() && !v.is_null())
}

/// Serialize to a plain JS value (objects, not `Map`s).
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Failed to convert value for JS: {}", e)))
}

/// Read an untrusted JS value through `JSON.stringify`.
///
/// `None` for anything JSON cannot represent: cyclic objects and BigInts
/// (where `stringify` throws), functions and `undefined`.
fn json_from_js(value: &JsValue) -> Option<Value> {
    let text = js_sys::JSON::stringify(value).ok()?.as_string()?;
    serde_json::from_str(&text).ok()
}

fn from_js(value: &JsValue) -> Value {
    if value.is_undefined() {
        return Value::Null;
    }
    json_from_js(value).unwrap_or_else(|| Value::String(js_error_message(value)))
}

/// Capture a thrown JS value as JSON, keeping `message` readable.
fn thrown(error: JsValue) -> ProviderError {
    if let Some(err) = error.dyn_ref::<js_sys::Error>() {
        return ProviderError::Thrown(serde_json::json!({
            "name": err.name().as_string().unwrap_or_else(|| "Error".to_string()),
            "message": js_error_message(&error),
        }));
    }
    match json_from_js(&error) {
        Some(value) if !value.is_null() => ProviderError::Thrown(value),
        _ => ProviderError::thrown(js_error_message(&error)),
    }
}

/// Best-effort message for any thrown JS value. Never throws.
pub fn js_error_message(err: &JsValue) -> String {
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        if let Some(message) = error.message().as_string().filter(|m| !m.is_empty()) {
            return message;
        }
        return error
            .name()
            .as_string()
            .unwrap_or_else(|| "Unknown error".to_string());
    }

    if let Some(s) = err.as_string() {
        if !s.is_empty() {
            return s;
        }
    }

    if err.is_object() {
        if let Some(message) = Reflect::get(err, &JsValue::from_str("message"))
            .ok()
            .and_then(|m| m.as_string())
            .filter(|m| !m.is_empty())
        {
            return message;
        }
    }

    // Cyclic objects make `JSON.stringify` throw; that lands in `Err`.
    if let Ok(json) = js_sys::JSON::stringify(err) {
        if let Some(s) = json.as_string() {
            if !s.is_empty() && s != "null" && s != "undefined" && s != "{}" {
                return s;
            }
        }
    }

    "Unknown error".to_string()
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use serde_json::json;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn js(body: &str) -> JsValue {
        Function::new_no_args(body).call0(&JsValue::NULL).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_js_error_message_handles_any_value() {
        assert_eq!(js_error_message(&JsValue::UNDEFINED), "Unknown error");
        assert_eq!(js_error_message(&JsValue::NULL), "Unknown error");
        assert_eq!(js_error_message(&js("return new Error('boom');")), "boom");
        assert_eq!(js_error_message(&js("return { code: 4001 };")), r#"{"code":4001}"#);
        assert_eq!(js_error_message(&js("return { message: 'User rejected' };")), "User rejected");

        let cyclic = js("const o = { code: 1 }; o.self = o; return o;");
        assert_eq!(js_error_message(&cyclic), "Unknown error");
        assert!(json_from_js(&cyclic).is_none());
    }

    #[wasm_bindgen_test]
    async fn test_dotted_call_keeps_owner_as_this() {
        let surface = JsSurface::new(js(
            "return { bitcoin: { tag: 'bc1qthis', getAccounts: function () { return Promise.resolve([this.tag]); } } };",
        ));

        assert!(surface.has_method("bitcoin.getAccounts"));
        assert!(!surface.has_method("bitcoin.signMessage"));
        let accounts = surface.call("bitcoin.getAccounts", vec![]).await.unwrap();
        assert_eq!(accounts, json!(["bc1qthis"]));
    }

    #[wasm_bindgen_test]
    async fn test_cyclic_rejection_becomes_readable_error() {
        let surface = JsSurface::new(js(
            "return { signMessage: function () { const e = { message: 'User rejected' }; e.provider = this; this.last = e; return Promise.reject(e); } };",
        ));
        let err = surface.call("signMessage", vec![json!("hi")]).await.unwrap_err();
        assert_eq!(err.to_string(), "User rejected");

        let surface = JsSurface::new(js(
            "return { sign: function () { const e = {}; e.self = e; throw e; } };",
        ));
        let err = surface.call("sign", vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "Unknown error");
    }

    #[wasm_bindgen_test]
    async fn test_cyclic_result_does_not_trap() {
        let surface = JsSurface::new(js(
            "return { sign: function () { const r = { signature: 'sig' }; r.self = r; return r; } };",
        ));
        assert!(surface.call("sign", vec![]).await.is_ok());
    }
}
