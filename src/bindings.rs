//! JavaScript surface of the embeddable widget
//!
//! ```js
//! const widget = new ChatWidget({ apiBaseUrl: "https://api.example.com", widgetKey: "pk_..." });
//! const { messages } = await widget.start();
//! const outcome = await widget.send("Hello");
//! ```
//!
//! Every async method returns a `Promise`. Controller errors reject with an
//! `Error` whose `message` is ready for display and whose `retryable` flag
//! tells the UI whether to offer a retry.

use std::rc::Rc;

use js_sys::{Promise, Reflect};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};

use crate::config::WidgetConfig;
use crate::domain::services::{
    ConversationController, EndOutcome, RevalidationOutcome, SendOutcome, WidgetPreferences,
};
use crate::infrastructure::api::FetchConversationClient;
use crate::infrastructure::storage::{KeyValueStore, LocalStorageBackend, share};
use crate::shared::errors::ControllerError;
use crate::shared::logging;

#[wasm_bindgen]
pub struct ChatWidget {
    controller: Rc<ConversationController<FetchConversationClient>>,
    preferences: WidgetPreferences,
}

#[wasm_bindgen]
impl ChatWidget {
    /// `options` is a `WidgetConfig` in camelCase; omitted fields use defaults
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<ChatWidget, JsError> {
        logging::init_console_tracing(tracing::Level::INFO);

        let config: WidgetConfig = if options.is_undefined() || options.is_null() {
            WidgetConfig::default()
        } else {
            serde_wasm_bindgen::from_value(options)?
        };

        let client = FetchConversationClient::new(&config)?;
        let store = open_store(&config.storage_prefix);

        Ok(ChatWidget {
            controller: Rc::new(ConversationController::new(client, store.clone())),
            preferences: WidgetPreferences::new(store),
        })
    }

    /// Hydrate the transcript. A cached transcript triggers a background
    /// revalidation that may silently start a new session.
    pub fn start(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let hydration = controller.start().await.map_err(controller_error)?;

            if hydration.needs_revalidation() {
                let background = Rc::clone(&controller);
                spawn_local(async move {
                    if let RevalidationOutcome::Rotated(rotation) = background.revalidate().await {
                        tracing::debug!(current = %rotation.current.id, "Background rotation");
                    }
                });
            }

            to_js(&hydration)
        })
    }

    pub fn send(&self, text: String) -> Promise {
        let controller = Rc::clone(&self.controller);
        let preferences = self.preferences.clone();
        future_to_promise(async move {
            let outcome = controller.send(&text).await.map_err(controller_error)?;
            count_unread(&preferences, &outcome);
            to_js(&outcome)
        })
    }

    pub fn retry(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        let preferences = self.preferences.clone();
        future_to_promise(async move {
            let outcome = controller.retry().await.map_err(controller_error)?;
            count_unread(&preferences, &outcome);
            to_js(&outcome)
        })
    }

    #[wasm_bindgen(js_name = endConversation)]
    pub fn end_conversation(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let outcome = controller.end_conversation().await.map_err(controller_error)?;
            let confirmed = matches!(outcome, EndOutcome::Ended { confirmed: true, .. });
            to_js(&serde_json::json!({ "confirmed": confirmed }))
        })
    }

    #[wasm_bindgen(js_name = clearHistory)]
    pub fn clear_history(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move {
            let rotation = controller.clear_history().await.map_err(controller_error)?;
            to_js(&rotation)
        })
    }

    /// Current session id, phase, transcript and pending text
    pub fn snapshot(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move { to_js(&controller.snapshot().await) })
    }

    /// Locale, translations and greeting from the backend
    #[wasm_bindgen(js_name = serverConfig)]
    pub fn server_config(&self) -> Promise {
        let controller = Rc::clone(&self.controller);
        future_to_promise(async move { to_js(&controller.fetch_server_config().await) })
    }

    #[wasm_bindgen(js_name = isOpen)]
    pub fn is_open(&self) -> bool {
        self.preferences.is_open()
    }

    #[wasm_bindgen(js_name = setOpen)]
    pub fn set_open(&self, open: bool) {
        self.preferences.set_open(open);
    }

    #[wasm_bindgen(js_name = unreadCount)]
    pub fn unread_count(&self) -> u32 {
        self.preferences.unread_count()
    }

    /// Call when the widget is removed from the page. Pending responses are
    /// discarded and later calls resolve without doing anything.
    pub fn destroy(&self) {
        self.controller.shutdown();
    }
}

fn open_store(prefix: &str) -> KeyValueStore {
    match LocalStorageBackend::new() {
        Ok(backend) => KeyValueStore::new(share(backend), prefix),
        Err(e) => {
            tracing::warn!(error = %e, "localStorage unavailable - conversation will not persist");
            KeyValueStore::disabled(prefix)
        }
    }
}

fn count_unread(preferences: &WidgetPreferences, outcome: &SendOutcome) {
    if matches!(outcome, SendOutcome::Delivered { .. }) {
        preferences.increment_unread();
    }
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| js_sys::Error::new(&e.to_string()).into())
}

fn controller_error(error: ControllerError) -> JsValue {
    let js_error = js_sys::Error::new(&error.user_message());
    let _ = Reflect::set(
        &js_error,
        &JsValue::from_str("retryable"),
        &JsValue::from_bool(error.is_retryable()),
    );
    js_error.into()
}
