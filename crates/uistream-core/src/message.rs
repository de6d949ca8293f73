//! Protocol message model.
//!
//! A `UiMessage` is one UI-update produced by a script run. The payload is
//! opaque to the runtime; ordering rules and content addressing depend only
//! on the kind tag and the raw bytes.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::store::content_key;

/// Purpose tag for message content keys.
const MESSAGE_PURPOSE: &str = "msg";

/// Message class, which determines dispatch ordering rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Page configuration. Must be the first output of a run if present.
    PageConfig,
    /// Rendered content update.
    Delta,
    /// Session lifecycle event.
    SessionEvent,
}

impl MessageKind {
    const fn tag(self) -> u8 {
        match self {
            Self::PageConfig => 0,
            Self::Delta => 1,
            Self::SessionEvent => 2,
        }
    }

    const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::PageConfig),
            1 => Some(Self::Delta),
            2 => Some(Self::SessionEvent),
            _ => None,
        }
    }
}

/// One UI-update message produced by a script run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiMessage {
    kind: MessageKind,
    payload: Bytes,
}

impl UiMessage {
    /// Create a page-configuration message.
    pub fn page_config(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::PageConfig,
            payload: payload.into(),
        }
    }

    /// Create a content-update message.
    pub fn delta(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::Delta,
            payload: payload.into(),
        }
    }

    /// Create a session lifecycle event.
    pub fn session_event(payload: impl Into<Bytes>) -> Self {
        Self {
            kind: MessageKind::SessionEvent,
            payload: payload.into(),
        }
    }

    /// The message class.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.kind
    }

    /// The opaque payload bytes.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Whether this is a page-configuration message.
    #[must_use]
    pub fn is_page_config(&self) -> bool {
        self.kind == MessageKind::PageConfig
    }

    /// Whether this is a content-update message.
    #[must_use]
    pub fn is_delta(&self) -> bool {
        self.kind == MessageKind::Delta
    }

    /// Binary encoding: one tag byte followed by the payload.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.payload.len());
        buf.put_u8(self.kind.tag());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a binary-encoded message.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let (&tag, payload) = bytes.split_first()?;
        Some(Self {
            kind: MessageKind::from_tag(tag)?,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Stable content hash of the encoded message.
    ///
    /// Identical messages always hash to the same key, so a transport can
    /// reference a previously delivered payload instead of re-sending it.
    #[must_use]
    pub fn content_hash(&self) -> String {
        content_key(MESSAGE_PURPOSE, &self.encode())
    }

    /// JSON wire form for text-framed transports.
    #[must_use]
    pub fn to_wire(&self) -> WireMessage {
        let data = BASE64.encode(&self.payload);
        match self.kind {
            MessageKind::PageConfig => WireMessage::PageConfig { data },
            MessageKind::Delta => WireMessage::Delta { data },
            MessageKind::SessionEvent => WireMessage::SessionEvent { data },
        }
    }
}

/// JSON wire form of a `UiMessage` (payload base64 encoded).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Page configuration.
    PageConfig { data: String },
    /// Rendered content update.
    Delta { data: String },
    /// Session lifecycle event.
    SessionEvent { data: String },
}

impl WireMessage {
    /// Decode back into a `UiMessage`.
    #[must_use]
    pub fn into_message(self) -> Option<UiMessage> {
        let (kind, data) = match self {
            Self::PageConfig { data } => (MessageKind::PageConfig, data),
            Self::Delta { data } => (MessageKind::Delta, data),
            Self::SessionEvent { data } => (MessageKind::SessionEvent, data),
        };
        let payload = BASE64.decode(data).ok()?;
        Some(UiMessage {
            kind,
            payload: payload.into(),
        })
    }
}
