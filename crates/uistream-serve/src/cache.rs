//! Outbound protocol-message cache.

use bytes::Bytes;
use uistream_core::{ContentStore, UiMessage};

/// Cache of encoded protocol messages keyed by content hash.
///
/// The transport checks the cache before re-sending a payload: a client
/// that has already seen a hash can fetch the bytes over `/cache` instead
/// of receiving them inline again.
#[derive(Default)]
pub struct MessageCache {
    store: ContentStore<Bytes>,
}

impl MessageCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a message and return its content hash.
    ///
    /// Idempotent: re-inserting identical content is a no-op beyond the
    /// hash computation.
    pub fn put(&self, msg: &UiMessage) -> String {
        let hash = msg.content_hash();
        self.store.insert(hash.clone(), msg.encode());
        hash
    }

    /// Look up an encoded message by hash.
    #[must_use]
    pub fn get(&self, hash: &str) -> Option<Bytes> {
        self.store.get(hash).map(|bytes| (*bytes).clone())
    }

    /// Whether a message with this hash is cached.
    #[must_use]
    pub fn contains(&self, hash: &str) -> bool {
        self.store.contains(hash)
    }

    /// Number of cached messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}
