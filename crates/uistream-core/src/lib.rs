//! Core building blocks for the uistream session runtime.
//!
//! This crate provides the fundamental pieces:
//! - `ContentStore` - Content-addressed in-memory blob store
//! - `UiMessage` - Protocol message model with stable content hashing
//! - Collaborator traits for external state and file managers

pub mod message;
pub mod store;
pub mod traits;

pub use message::{MessageKind, UiMessage, WireMessage};
pub use store::{ContentStore, content_key};
pub use traits::{FileStore, MemoryFileStore, MemoryStateStore, StateStore};
