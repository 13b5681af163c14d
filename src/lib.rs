//! Vellum — multi-session conversational context routing
//!
//! Routes chat sessions to specialized conversation chains based on the
//! document each session works against. Sessions keep independent bounded
//! histories, lock onto a file once a specialized chain engages, stream
//! responses with debounced partial updates, and survive restarts through
//! JSON snapshots.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use vellum::prelude::*;
//!
//! # async fn example(factory: Arc<dyn vellum::service::ServiceFactory>) -> vellum::error::Result<()> {
//! let mut store = SessionStore::new(factory);
//! let doc = StaticDocument::new("/novels/ch1.md", "---\ntype: fiction\n---\nOnce upon a time");
//! store.send_message("Tighten the opening paragraph.", Some(&doc)).await?;
//! for message in store.selected_session().current_log().messages() {
//!     println!("{}: {}", message.role, message.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod chain;
pub mod document;
pub mod error;
pub mod history;
pub mod persist;
pub mod prelude;
pub mod router;
pub mod service;
pub mod session;
pub mod store;
pub mod streaming;
pub mod types;

pub use error::{Result, VellumError};
