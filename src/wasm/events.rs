//! `ethereum#initialized` as a stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::channel::mpsc;
use futures_util::stream::{Stream, StreamExt};
use tracing;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, EventTarget};

use crate::constants::EVENT_PROVIDER_INITIALIZED;

/// Yields once per provider-initialized event on `window`.
///
/// The listener is removed when the stream is dropped. Outside a window
/// context the stream ends immediately.
pub struct InitializedEvents {
    rx: mpsc::UnboundedReceiver<()>,
    listener: Option<(EventTarget, Closure<dyn FnMut(Event)>)>,
}

impl InitializedEvents {
    pub fn listen() -> Self {
        let (tx, rx) = mpsc::unbounded();

        let Some(window) = web_sys::window() else {
            tracing::debug!("No window, provider-initialized events unavailable");
            return Self { rx, listener: None };
        };

        let on_event = Closure::<dyn FnMut(Event)>::new(move |_: Event| {
            let _ = tx.unbounded_send(());
        });

        let target: EventTarget = window.into();
        if let Err(e) = target.add_event_listener_with_callback(
            EVENT_PROVIDER_INITIALIZED,
            on_event.as_ref().unchecked_ref(),
        ) {
            tracing::warn!("Failed to listen for {}: {}", EVENT_PROVIDER_INITIALIZED, super::js_error_message(&e));
            return Self { rx, listener: None };
        }

        Self {
            rx,
            listener: Some((target, on_event)),
        }
    }
}

impl Stream for InitializedEvents {
    type Item = ();

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<()>> {
        self.rx.poll_next_unpin(cx)
    }
}

impl Drop for InitializedEvents {
    fn drop(&mut self) {
        if let Some((target, on_event)) = self.listener.take() {
            let _ = target.remove_event_listener_with_callback(
                EVENT_PROVIDER_INITIALIZED,
                on_event.as_ref().unchecked_ref(),
            );
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use js_sys::{Function, Reflect};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn dispatch_initialized() {
        let window = web_sys::window().unwrap();
        let event = Event::new(EVENT_PROVIDER_INITIALIZED).unwrap();
        window.dispatch_event(&event).unwrap();
    }

    fn listener_errors() -> f64 {
        Reflect::get(&js_sys::global(), &JsValue::from_str("__listenerErrors"))
            .unwrap()
            .as_f64()
            .unwrap_or(0.0)
    }

    #[wasm_bindgen_test]
    async fn test_listener_removed_on_drop() {
        // A closure left attached after drop throws when the event fires,
        // which the browser reports as an `error` event on window.
        Function::new_no_args(
            "globalThis.__listenerErrors = 0; addEventListener('error', () => { globalThis.__listenerErrors += 1; });",
        )
        .call0(&JsValue::NULL)
        .unwrap();

        let mut events = InitializedEvents::listen();
        dispatch_initialized();
        assert_eq!(events.next().await, Some(()));

        drop(events);
        dispatch_initialized();
        assert_eq!(listener_errors(), 0.0);

        let mut fresh = InitializedEvents::listen();
        dispatch_initialized();
        assert_eq!(fresh.next().await, Some(()));
    }
}
