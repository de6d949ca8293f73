//! Argument description and type-name resolution.
//!
//! Resolution never fails outward: every step degrades to the
//! [`UNRESOLVED`] sentinel instead of propagating an error into the
//! wrapped operation.

use std::collections::{BTreeMap, HashMap, HashSet};

use once_cell::sync::Lazy;
use uistream_core::UiMessage;

use super::record::{ArgMetadata, ArgRecord};

/// Sentinel recorded when a name cannot be resolved.
pub const UNRESOLVED: &str = "unresolved";

/// Process-wide immutable alias table: full type paths to short tags.
static TYPE_ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("&str", "str"),
        ("alloc::string::String", "str"),
        ("uistream_core::message::UiMessage", "Msg"),
        ("bytes::bytes::Bytes", "bytes"),
        ("serde_json::value::Value", "json"),
    ])
});

/// Resolve a raw type path to its recorded name.
///
/// Known paths map through the alias table; everything else keeps its last
/// path segment with any generic parameters stripped. An empty input
/// degrades to [`UNRESOLVED`].
#[must_use]
pub fn resolve_type_name(raw: &str) -> String {
    if raw.is_empty() {
        return UNRESOLVED.to_owned();
    }
    if let Some(alias) = TYPE_ALIASES.get(raw) {
        return (*alias).to_owned();
    }
    let base = raw.split('<').next().unwrap_or(raw);
    let segment = base.rsplit("::").next().unwrap_or(base);
    let segment = segment.trim();
    if segment.is_empty() {
        UNRESOLVED.to_owned()
    } else {
        segment.to_owned()
    }
}

/// Descriptor for one argument of an instrumented call.
///
/// Implementations decide how much of a value becomes observable: a
/// rendered literal for cheap scalars, a length for sized containers, and
/// nothing at all for arbitrary objects.
pub trait CallArg {
    /// Full type name, resolved through the alias table when recorded.
    fn type_name(&self) -> &'static str;

    /// Bounded metadata for the value, if any.
    fn metadata(&self) -> Option<ArgMetadata> {
        None
    }

    /// User-assigned component name, surfaced for factory-style receivers.
    fn component_name(&self) -> Option<String> {
        None
    }
}

/// Build the record for one argument.
#[must_use]
pub fn describe(position: u32, keyword: Option<&str>, arg: &dyn CallArg) -> ArgRecord {
    ArgRecord {
        keyword: keyword.map_or_else(|| position.to_string(), ToOwned::to_owned),
        position,
        type_name: resolve_type_name(arg.type_name()),
        metadata: arg.metadata(),
    }
}

impl CallArg for bool {
    fn type_name(&self) -> &'static str {
        "bool"
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Value(self.to_string()))
    }
}

macro_rules! impl_call_arg_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CallArg for $ty {
                fn type_name(&self) -> &'static str {
                    stringify!($ty)
                }

                fn metadata(&self) -> Option<ArgMetadata> {
                    Some(ArgMetadata::Value(self.to_string()))
                }
            }
        )*
    };
}

impl_call_arg_for_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

macro_rules! impl_call_arg_for_float {
    ($($ty:ty),* $(,)?) => {
        $(
            impl CallArg for $ty {
                fn type_name(&self) -> &'static str {
                    stringify!($ty)
                }
            }
        )*
    };
}

impl_call_arg_for_float!(f32, f64);

impl CallArg for &str {
    fn type_name(&self) -> &'static str {
        "&str"
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl CallArg for String {
    fn type_name(&self) -> &'static str {
        "alloc::string::String"
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl<T> CallArg for Vec<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl<T> CallArg for [T] {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl<K, V> CallArg for HashMap<K, V> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl<K, V> CallArg for BTreeMap<K, V> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl<T> CallArg for HashSet<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl CallArg for bytes::Bytes {
    fn type_name(&self) -> &'static str {
        "bytes::bytes::Bytes"
    }

    fn metadata(&self) -> Option<ArgMetadata> {
        Some(ArgMetadata::Length(self.len()))
    }
}

impl CallArg for UiMessage {
    fn type_name(&self) -> &'static str {
        "uistream_core::message::UiMessage"
    }
}

impl CallArg for serde_json::Value {
    fn type_name(&self) -> &'static str {
        "serde_json::value::Value"
    }
}
