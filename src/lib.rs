// Public API exports (shared between the browser widget and native clients)
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Browser entry point (wasm-bindgen), NOT compiled natively
#[cfg(target_arch = "wasm32")]
pub mod bindings;

pub use config::WidgetConfig;
pub use domain::models::{Message, MessageRole, Rotation, RotationReason};
pub use domain::services::{
    ConversationController, ConversationSnapshot, ControllerPhase, EndOutcome, Hydration,
    HydrationSource, RevalidationOutcome, SendOutcome, WidgetPreferences,
};
pub use infrastructure::api::{ApiError, ConversationApi};
pub use infrastructure::storage::KeyValueStore;
pub use shared::errors::{AppError, ControllerError, Result};
