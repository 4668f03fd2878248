//! In-memory environment and provider surfaces.
//!
//! Used by the test suite and by native hosts that want to script wallet
//! behavior. Every call made against a [`MockSurface`] is recorded so tests can
//! assert on call order and arguments.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use serde_json::Value;

use crate::constants::METHOD_REQUEST;
use crate::error::ProviderError;

use super::{EnvironmentProbe, ProviderSurface, RequestArguments, SurfaceRef};

/// Result of a scripted call: `Err` carries the thrown value.
pub type MockResult = Result<Value, Value>;

type Handler = Rc<dyn Fn(&[Value]) -> MockResult>;

#[derive(Clone)]
enum Behavior {
    Reply(Handler),
    Delayed(Duration, Handler),
    Hang,
}

/// A call observed by a [`MockSurface`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub path: String,
    pub args: Vec<Value>,
}

impl RecordedCall {
    /// Decode the call as a `request({ method, params })` invocation.
    pub fn as_request(&self) -> Option<RequestArguments> {
        if self.path != METHOD_REQUEST {
            return None;
        }
        self.args
            .first()
            .and_then(|payload| serde_json::from_value(payload.clone()).ok())
    }
}

// ============================================================================
// MockSurface
// ============================================================================

/// A scripted provider object.
#[derive(Default)]
pub struct MockSurface {
    methods: HashMap<String, Behavior>,
    request_methods: HashMap<String, Behavior>,
    properties: HashMap<String, Value>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a directly callable method.
    pub fn with_method(
        mut self,
        path: &str,
        handler: impl Fn(&[Value]) -> MockResult + 'static,
    ) -> Self {
        self.methods
            .insert(path.to_string(), Behavior::Reply(Rc::new(handler)));
        self
    }

    /// Script a method that resolves only after `delay`.
    pub fn with_delayed_method(
        mut self,
        path: &str,
        delay: Duration,
        handler: impl Fn(&[Value]) -> MockResult + 'static,
    ) -> Self {
        self.methods
            .insert(path.to_string(), Behavior::Delayed(delay, Rc::new(handler)));
        self
    }

    /// Script a method whose promise never settles.
    pub fn with_hanging_method(mut self, path: &str) -> Self {
        self.methods.insert(path.to_string(), Behavior::Hang);
        self
    }

    /// Script one RPC method behind `request({ method, params })`.
    ///
    /// The handler receives `params`. Unscripted RPC methods reject.
    pub fn with_request(
        mut self,
        method: &str,
        handler: impl Fn(&[Value]) -> MockResult + 'static,
    ) -> Self {
        self.request_methods
            .insert(method.to_string(), Behavior::Reply(Rc::new(handler)));
        self
    }

    /// Script an RPC method whose promise never settles.
    pub fn with_hanging_request(mut self, method: &str) -> Self {
        self.request_methods.insert(method.to_string(), Behavior::Hang);
        self
    }

    pub fn with_property(mut self, path: &str, value: Value) -> Self {
        self.properties.insert(path.to_string(), value);
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Just the `request` calls, decoded.
    pub fn requests(&self) -> Vec<RequestArguments> {
        self.calls
            .borrow()
            .iter()
            .filter_map(RecordedCall::as_request)
            .collect()
    }

    /// Number of calls made to `path`.
    pub fn call_count(&self, path: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.path == path).count()
    }

    fn behavior_for(&self, path: &str, args: &[Value]) -> Result<(Behavior, Vec<Value>), ProviderError> {
        if let Some(behavior) = self.methods.get(path) {
            return Ok((behavior.clone(), args.to_vec()));
        }

        if path == METHOD_REQUEST && !self.request_methods.is_empty() {
            let request: RequestArguments = args
                .first()
                .cloned()
                .map(serde_json::from_value)
                .transpose()?
                .ok_or_else(|| ProviderError::thrown("request() called without arguments"))?;

            return match self.request_methods.get(&request.method) {
                Some(behavior) => Ok((behavior.clone(), request.params)),
                None => Err(ProviderError::Thrown(serde_json::json!({
                    "code": 4200,
                    "message": format!("The requested method {} is not supported", request.method),
                }))),
            };
        }

        Err(ProviderError::MissingMethod(path.to_string()))
    }
}

#[async_trait(?Send)]
impl ProviderSurface for MockSurface {
    fn has_method(&self, path: &str) -> bool {
        self.methods.contains_key(path)
            || (path == METHOD_REQUEST && !self.request_methods.is_empty())
    }

    fn property(&self, path: &str) -> Option<Value> {
        self.properties.get(path).filter(|v| !v.is_null()).cloned()
    }

    async fn call(&self, path: &str, args: Vec<Value>) -> Result<Value, ProviderError> {
        self.calls.borrow_mut().push(RecordedCall {
            path: path.to_string(),
            args: args.clone(),
        });

        let (behavior, args) = self.behavior_for(path, &args)?;
        match behavior {
            Behavior::Reply(handler) => handler(&args).map_err(ProviderError::Thrown),
            Behavior::Delayed(delay, handler) => {
                futures_timer::Delay::new(delay).await;
                handler(&args).map_err(ProviderError::Thrown)
            }
            Behavior::Hang => futures_util::future::pending().await,
        }
    }
}

// ============================================================================
// MockEnvironment
// ============================================================================

/// A scripted global scope.
///
/// Cheap to clone; clones share the same globals, so a test can keep one
/// handle while a session or detection task owns another.
#[derive(Clone, Default)]
pub struct MockEnvironment {
    inner: Rc<EnvironmentInner>,
}

#[derive(Default)]
struct EnvironmentInner {
    objects: RefCell<HashMap<Vec<String>, SurfaceRef>>,
    listeners: RefCell<Vec<mpsc::UnboundedSender<()>>>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject `surface` at `path`, returning a handle for later inspection.
    pub fn install<S: ProviderSurface + 'static>(&self, path: &[&str], surface: S) -> Rc<S> {
        let surface = Rc::new(surface);
        self.inner
            .objects
            .borrow_mut()
            .insert(key(path), surface.clone() as SurfaceRef);
        surface
    }

    pub fn remove(&self, path: &[&str]) {
        self.inner.objects.borrow_mut().remove(&key(path));
    }

    /// A stream of `initialized` notifications, one per [`notify_initialized`](Self::notify_initialized).
    pub fn initialized_events(&self) -> mpsc::UnboundedReceiver<()> {
        let (tx, rx) = mpsc::unbounded();
        self.inner.listeners.borrow_mut().push(tx);
        rx
    }

    /// Fire the provider-initialized notification at every live listener.
    pub fn notify_initialized(&self) {
        self.inner
            .listeners
            .borrow_mut()
            .retain(|tx| tx.unbounded_send(()).is_ok());
    }

    /// Number of notification listeners still attached.
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.inner.listeners.borrow_mut();
        listeners.retain(|tx| !tx.is_closed());
        listeners.len()
    }
}

impl EnvironmentProbe for MockEnvironment {
    fn object(&self, path: &[&str]) -> Option<SurfaceRef> {
        let objects = self.inner.objects.borrow();
        let wanted = key(path);

        if let Some(surface) = objects.get(&wanted) {
            return Some(surface.clone());
        }

        // Intermediate objects (e.g. the registry map itself) exist whenever
        // something is installed beneath them.
        objects
            .keys()
            .any(|k| k.len() > wanted.len() && k.starts_with(&wanted))
            .then(|| Rc::new(MockSurface::new()) as SurfaceRef)
    }
}

fn key(path: &[&str]) -> Vec<String> {
    path.iter().map(|s| s.to_string()).collect()
}
