//! Data-URI encoding for the pass-through fallback.
//!
//! When every attempt fails and fallback is enabled, the caller still gets an
//! `image_url` it can display: the original bytes inlined as
//! `data:<mime>;base64,<payload>`. The same module decodes such URIs back to
//! bytes so `enhance_to_file` can write degraded results to disk.

use crate::asset::ImageAsset;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Inline the asset's original bytes as a base64 data URI.
pub fn to_data_uri(asset: &ImageAsset) -> String {
    let mime = asset.mime_type().unwrap_or(DEFAULT_MIME);
    let b64 = STANDARD.encode(asset.bytes());
    debug!("Encoded {} → {} bytes base64", asset.name(), b64.len());
    format!("data:{mime};base64,{b64}")
}

/// Decode a base64 data URI produced by [`to_data_uri`].
///
/// Returns `None` for anything that is not a base64 `data:` URI.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let mime = meta.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

pub fn is_data_uri(s: &str) -> bool {
    s.starts_with("data:")
}
