//! In-memory media assets and download naming.

use std::sync::Arc;

use bytes::Bytes;
use uistream_core::{ContentStore, content_key};

/// Purpose tag for media content keys.
const MEDIA_PURPOSE: &str = "media";

/// Stem used when a download has neither a filename nor a usable title.
const DEFAULT_STEM: &str = "download";

/// How an asset is meant to be consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// Served with a `Content-Disposition: attachment` header.
    Downloadable,
    /// Served inline (images, audio, video).
    Media,
}

/// One stored asset.
#[derive(Debug, Clone)]
pub struct MediaAsset {
    content: Bytes,
    mime_type: String,
    kind: AssetKind,
    filename: Option<String>,
}

impl MediaAsset {
    /// The raw content.
    #[must_use]
    pub const fn content(&self) -> &Bytes {
        &self.content
    }

    /// The asset's MIME type.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// How the asset is meant to be consumed.
    #[must_use]
    pub const fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Explicit filename supplied at registration, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// End-exclusive byte slice, clamped to the content bounds.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Bytes {
        let end = end.min(self.content.len());
        let start = start.min(end);
        self.content.slice(start..end)
    }

    /// Resolve the filename offered on download.
    ///
    /// The explicit filename wins; otherwise the title is slugged into a
    /// filesystem-safe stem and the extension is derived from the MIME type.
    #[must_use]
    pub fn download_filename(&self, title: Option<&str>) -> String {
        if let Some(name) = &self.filename {
            return name.clone();
        }
        let stem = title.map_or_else(String::new, slugify);
        let stem = if stem.is_empty() {
            DEFAULT_STEM.to_owned()
        } else {
            stem
        };
        format!("{stem}{}", extension_for_mime(&self.mime_type))
    }
}

/// Shared in-memory asset store with content-addressed keys.
#[derive(Default)]
pub struct MediaAssetStore {
    store: ContentStore<MediaAsset>,
}

impl MediaAssetStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset under its content hash and return the key.
    pub fn put(
        &self,
        content: impl Into<Bytes>,
        mime_type: impl Into<String>,
        kind: AssetKind,
        filename: Option<String>,
    ) -> String {
        let content = content.into();
        let key = content_key(MEDIA_PURPOSE, &content);
        self.insert(key.clone(), content, mime_type.into(), kind, filename);
        key
    }

    /// Register an asset under a caller-supplied logical key.
    pub fn put_at(
        &self,
        key: impl Into<String>,
        content: impl Into<Bytes>,
        mime_type: impl Into<String>,
        kind: AssetKind,
        filename: Option<String>,
    ) -> String {
        let key = key.into();
        self.insert(key.clone(), content.into(), mime_type.into(), kind, filename);
        key
    }

    fn insert(
        &self,
        key: String,
        content: Bytes,
        mime_type: String,
        kind: AssetKind,
        filename: Option<String>,
    ) {
        self.store.insert(
            key,
            MediaAsset {
                content,
                mime_type,
                kind,
                filename,
            },
        );
    }

    /// Look up an asset by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<MediaAsset>> {
        self.store.get(key)
    }

    /// Release an asset. Returns true if it was present.
    pub fn remove(&self, key: &str) -> bool {
        self.store.remove(key)
    }

    /// Number of stored assets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Build the `Content-Disposition` value for a downloadable asset.
///
/// Pure-ASCII names use the quoted form; anything else falls back to the
/// RFC 5987 `filename*=utf-8''` encoding instead of being rejected.
#[must_use]
pub fn content_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        let safe = filename.replace('"', "_");
        format!("attachment; filename=\"{safe}\"")
    } else {
        format!("attachment; filename*=utf-8''{}", urlencoding::encode(filename))
    }
}

/// Reduce a download title to a filesystem-safe stem.
fn slugify(title: &str) -> String {
    title
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// File extension (with leading dot) for a MIME type, empty when unknown.
fn extension_for_mime(mime_type: &str) -> String {
    mime_guess::get_mime_extensions_str(mime_type)
        .and_then(|extensions| extensions.first())
        .map_or_else(String::new, |ext| format!(".{ext}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf_asset(filename: Option<String>) -> MediaAsset {
        MediaAsset {
            content: Bytes::from_static(b"PDFDATA"),
            mime_type: "application/pdf".to_owned(),
            kind: AssetKind::Downloadable,
            filename,
        }
    }

    #[test]
    fn test_put_is_content_addressed() {
        let store = MediaAssetStore::new();
        let a = store.put(&b"PDFDATA"[..], "application/pdf", AssetKind::Downloadable, None);
        let b = store.put(&b"PDFDATA"[..], "application/pdf", AssetKind::Downloadable, None);

        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&a).unwrap().content(), &Bytes::from_static(b"PDFDATA"));
    }

    #[test]
    fn test_put_at_logical_key() {
        let store = MediaAssetStore::new();
        let key = store.put_at(
            "charts/latest.png",
            &b"\x89PNG"[..],
            "image/png",
            AssetKind::Media,
            None,
        );

        assert_eq!(key, "charts/latest.png");
        assert!(store.get("charts/latest.png").is_some());
    }

    #[test]
    fn test_remove_releases_asset() {
        let store = MediaAssetStore::new();
        let key = store.put(&b"x"[..], "text/plain", AssetKind::Media, None);
        assert!(store.remove(&key));
        assert!(store.get(&key).is_none());
        assert!(!store.remove(&key));
    }

    #[test]
    fn test_slice_is_end_exclusive() {
        let store = MediaAssetStore::new();
        let key = store.put(&b"abcdefgh"[..], "text/plain", AssetKind::Media, None);
        let asset = store.get(&key).unwrap();

        assert_eq!(asset.slice(3, 7), Bytes::from_static(b"defg"));
    }

    #[test]
    fn test_slice_clamps_out_of_range() {
        let asset = pdf_asset(None);
        assert_eq!(asset.slice(0, 100), Bytes::from_static(b"PDFDATA"));
        assert_eq!(asset.slice(100, 200), Bytes::new());
        assert_eq!(asset.slice(5, 3), Bytes::new());
    }

    #[test]
    fn test_download_filename_from_title() {
        let asset = pdf_asset(None);
        assert_eq!(
            asset.download_filename(Some("My Report")),
            "My_Report.pdf"
        );
    }

    #[test]
    fn test_download_filename_prefers_explicit_name() {
        let asset = pdf_asset(Some("q3-summary.pdf".to_owned()));
        assert_eq!(asset.download_filename(Some("ignored")), "q3-summary.pdf");
    }

    #[test]
    fn test_download_filename_without_title() {
        let asset = pdf_asset(None);
        assert_eq!(asset.download_filename(None), "download.pdf");
        assert_eq!(asset.download_filename(Some("   ")), "download.pdf");
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("My_Report.pdf"),
            "attachment; filename=\"My_Report.pdf\""
        );
    }

    #[test]
    fn test_content_disposition_utf8() {
        let value = content_disposition("Bericht_über_Q3.pdf");
        assert!(value.starts_with("attachment; filename*=utf-8''"));
        assert!(value.contains("Bericht_%C3%BCber_Q3.pdf"));
    }

    #[test]
    fn test_slugify_keeps_unicode_letters() {
        assert_eq!(slugify("My Report (v2)"), "My_Report__v2_");
        assert_eq!(slugify("Überblick 2024"), "Überblick_2024");
    }
}
