//! Content-addressed HTTP delivery for the uistream runtime.
//!
//! Provides:
//! - `MessageCache` - Outbound protocol-message cache keyed by content hash
//! - `MediaAssetStore` - In-memory media assets with range-capable serving
//! - `router` - Axum HTTP surface (`/cache`, `/media/{key}`, `/health`)

pub mod cache;
pub mod media;
pub mod routes;

pub use cache::MessageCache;
pub use media::{AssetKind, MediaAsset, MediaAssetStore};
pub use routes::{ServeConfig, ServeError, ServeState, router};
