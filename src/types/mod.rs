//! Core message and identifier types.

mod message;

pub use message::{Message, MessageId, ModelSelection, Role, SessionId};
