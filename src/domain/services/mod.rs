// Business logic services
// Framework-agnostic, every I/O boundary is injected

pub mod controller;
pub mod message_cache;
pub mod preferences;
pub mod session_identity;

pub use controller::{
    ConversationController, ConversationSnapshot, ControllerPhase, EndOutcome, Hydration,
    HydrationSource, RevalidationOutcome, SendOutcome,
};
pub use message_cache::MessageCache;
pub use preferences::WidgetPreferences;
pub use session_identity::{SessionIdentity, generate_session_id, is_well_formed};
