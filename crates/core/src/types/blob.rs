//! Opaque blob handles for images and downloadable files.
//!
//! A blob is either a reference to a remotely stored file (a directly
//! fetchable URL) or raw bytes held by the client, typically a file that is
//! about to be uploaded. Upload progress can only be observed on the bytes
//! path.
//!
//! On the wire a blob is `{"url": "..."}` or `{"bytes": "<base64>"}`.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Callback receiving upload progress as a percentage (0-100).
pub type UploadProgress = Arc<dyn Fn(u8) + Send + Sync>;

/// Handle to a file stored by the backend or held in memory.
#[derive(Clone)]
pub enum ExternalBlob {
    /// Remote file reachable at a direct URL.
    Url(String),
    /// In-memory file content.
    Bytes {
        data: Arc<[u8]>,
        progress: Option<UploadProgress>,
    },
}

impl ExternalBlob {
    /// Create a handle referencing a URL.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Create a handle holding raw bytes.
    #[must_use]
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            data: Arc::from(data.into()),
            progress: None,
        }
    }

    /// Attach an upload progress callback.
    ///
    /// Only byte blobs are uploaded, so URL handles are returned unchanged.
    #[must_use]
    pub fn with_upload_progress(self, on_progress: impl Fn(u8) + Send + Sync + 'static) -> Self {
        match self {
            Self::Bytes { data, .. } => Self::Bytes {
                data,
                progress: Some(Arc::new(on_progress)),
            },
            url @ Self::Url(_) => url,
        }
    }

    /// Resolve to a URL usable for display or download.
    ///
    /// Byte blobs resolve to a `data:` URL.
    #[must_use]
    pub fn direct_url(&self) -> Cow<'_, str> {
        match self {
            Self::Url(url) => Cow::Borrowed(url),
            Self::Bytes { data, .. } => Cow::Owned(format!(
                "data:application/octet-stream;base64,{}",
                STANDARD.encode(data)
            )),
        }
    }

    /// Raw bytes when the content is held in memory.
    #[must_use]
    pub fn inline_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes { data, .. } => Some(data.as_ref()),
            Self::Url(_) => None,
        }
    }

    /// Whether the content is held in memory.
    #[must_use]
    pub const fn is_inline(&self) -> bool {
        matches!(self, Self::Bytes { .. })
    }

    /// Report upload progress to the attached callback, if any.
    pub fn report_progress(&self, percentage: u8) {
        if let Self::Bytes {
            progress: Some(on_progress),
            ..
        } = self
        {
            on_progress(percentage.min(100));
        }
    }
}

impl fmt::Debug for ExternalBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Bytes { data, progress } => f
                .debug_struct("Bytes")
                .field("len", &data.len())
                .field("progress", &progress.is_some())
                .finish(),
        }
    }
}

impl PartialEq for ExternalBlob {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Url(a), Self::Url(b)) => a == b,
            (Self::Bytes { data: a, .. }, Self::Bytes { data: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Eq for ExternalBlob {}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
enum BlobRepr<'a> {
    Url(Cow<'a, str>),
    Bytes(Cow<'a, str>),
}

impl Serialize for ExternalBlob {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            Self::Url(url) => BlobRepr::Url(Cow::Borrowed(url)),
            Self::Bytes { data, .. } => BlobRepr::Bytes(Cow::Owned(STANDARD.encode(data))),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ExternalBlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match BlobRepr::deserialize(deserializer)? {
            BlobRepr::Url(url) => Ok(Self::Url(url.into_owned())),
            BlobRepr::Bytes(encoded) => STANDARD
                .decode(encoded.as_bytes())
                .map(Self::from_bytes)
                .map_err(serde::de::Error::custom),
        }
    }
}
