//! Convenience re-exports for common use.

pub use crate::cancel::SharedCanceller;
pub use crate::chain::{chains_for_file_type, ChainInfo, ChainType};
pub use crate::document::{detect_file_type, DocumentSource, StaticDocument};
pub use crate::error::{Result, VellumError};
pub use crate::history::{LogLimits, MessageLog};
pub use crate::persist::SavedState;
pub use crate::router::ContextRouter;
pub use crate::service::{
    ContentUpdates, ConversationService, DocumentContext, ServiceFactory, ServiceSpec,
    SharedService,
};
pub use crate::session::{ChainLock, ChatSession};
pub use crate::store::{GovernorSettings, MemoryGovernor, SessionStore, StoreSettings};
pub use crate::streaming::StreamingCoordinator;
pub use crate::types::{Message, MessageId, ModelSelection, Role, SessionId};
