//! The in-memory image handle passed through the workflow.

use bytes::Bytes;
use std::fmt;

/// An image file selected by the caller.
///
/// Immutable once built. The payload is a [`Bytes`] so cloning an asset (for
/// retries or batch fan-out) never copies the image data.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageAsset {
    name: String,
    mime_type: Option<String>,
    data: Bytes,
}

impl ImageAsset {
    /// Build an asset, inferring the MIME type from the file extension.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let name = name.into();
        let mime_type = crate::pipeline::validate::mime_for_extension(
            &crate::pipeline::validate::file_extension(&name),
        )
        .map(str::to_string);
        Self {
            name,
            mime_type,
            data: data.into(),
        }
    }

    /// Override the declared MIME type (`None` clears it).
    pub fn with_mime_type(mut self, mime: Option<impl Into<String>>) -> Self {
        self.mime_type = mime.map(Into::into);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    /// Borrow the raw payload.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Cheap handle to the payload for transports that need ownership.
    pub fn payload(&self) -> Bytes {
        self.data.clone()
    }
}

impl fmt::Debug for ImageAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageAsset")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("size_bytes", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_inferred_from_extension() {
        let a = ImageAsset::new("Photo.JPG", vec![1u8, 2, 3]);
        assert_eq!(a.mime_type(), Some("image/jpeg"));
        assert_eq!(a.size_bytes(), 3);

        let b = ImageAsset::new("notes.txt", vec![1u8]);
        assert_eq!(b.mime_type(), None);
    }

    #[test]
    fn clone_shares_payload() {
        let a = ImageAsset::new("a.png", vec![0u8; 1024]);
        let b = a.clone();
        assert_eq!(a.bytes().as_ptr(), b.bytes().as_ptr());
    }

    #[test]
    fn debug_omits_payload() {
        let a = ImageAsset::new("a.png", vec![7u8; 16]);
        let dbg = format!("{a:?}");
        assert!(dbg.contains("size_bytes: 16"));
        assert!(!dbg.contains("[7, 7"));
    }
}
