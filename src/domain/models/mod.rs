// Domain models (widget conversation entities)
// Pure Rust, no framework dependencies

pub mod message;
pub mod session;

pub use message::{Message, MessageRole, RawMessage, filter_conversational, parse_timestamp};
pub use session::{Rotation, RotationReason, Session, SessionStatus};
