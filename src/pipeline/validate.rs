//! Pre-flight validation of a candidate image.
//!
//! [`validate`] is synchronous and cheap: it only looks at the name, the
//! declared MIME type, and the payload length. Every check runs so the caller
//! gets the full list of problems in one pass.
//!
//! [`validate_dimensions`] is separate and optional because it has to decode
//! the image header, which happens on the blocking pool.

use crate::asset::ImageAsset;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

pub const SUPPORTED_FORMATS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "gif"];
pub const MAX_SIZE_MB: f64 = 20.0;
pub const MIN_DIMENSION: u32 = 50;
pub const MAX_DIMENSION: u32 = 5000;

const MIME_TYPES: [(&str, &str); 6] = [
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("png", "image/png"),
    ("bmp", "image/bmp"),
    ("webp", "image/webp"),
    ("gif", "image/gif"),
];

/// Outcome of a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, msg: String) {
        self.valid = false;
        self.errors.push(msg);
    }
}

/// Overridable validation limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOptions {
    /// Upper size bound in megabytes (1 MB = 1 048 576 bytes). Default: 20.
    pub max_size_mb: f64,
    /// Accepted lowercase extensions. Default: jpg, jpeg, png, bmp, webp, gif.
    pub formats: Vec<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            max_size_mb: MAX_SIZE_MB,
            formats: SUPPORTED_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Run every pre-flight check against `asset`.
///
/// Order of reported errors: presence, payload, extension, MIME type, size.
/// The asset is only read.
pub fn validate(asset: Option<&ImageAsset>, options: &ValidationOptions) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let Some(asset) = asset else {
        result.fail("No image file provided".to_string());
        return result;
    };

    if asset.bytes().is_empty() {
        result.fail("Invalid file object: the file is empty".to_string());
    }

    if !asset.name().is_empty() {
        let ext = file_extension(asset.name());
        if !options.formats.iter().any(|f| f.eq_ignore_ascii_case(&ext)) {
            result.fail(format!(
                "Unsupported format: {}. Please use: {}",
                ext,
                options.formats.join(", ")
            ));
        }
    }

    if let Some(mime) = asset.mime_type().filter(|m| !m.is_empty()) {
        if !MIME_TYPES.iter().any(|(_, m)| *m == mime) {
            result.fail(format!(
                "Invalid file type: {mime}. Please upload a valid image file."
            ));
        }
    }

    let size_mb = asset.size_bytes() as f64 / (1024.0 * 1024.0);
    if size_mb > options.max_size_mb {
        result.fail(format!(
            "Image too large: {:.2}MB. Maximum allowed: {}MB",
            size_mb, options.max_size_mb
        ));
    }

    debug!(
        "Validated '{}': {} error(s)",
        asset.name(),
        result.errors.len()
    );
    result
}

/// Decode the image header and check both axes against
/// [`MIN_DIMENSION`]..=[`MAX_DIMENSION`].
pub async fn validate_dimensions(asset: &ImageAsset) -> ValidationResult {
    let mut result = ValidationResult::ok();

    let (width, height) = match probe_dimensions(asset).await {
        Some(dims) => dims,
        None => {
            result.fail("Failed to load image for dimension validation".to_string());
            return result;
        }
    };

    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        result.fail(format!(
            "Image dimensions too small: {width}x{height}px. Minimum dimensions: {MIN_DIMENSION}x{MIN_DIMENSION}px"
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        result.fail(format!(
            "Image dimensions too large: {width}x{height}px. Maximum dimensions: {MAX_DIMENSION}x{MAX_DIMENSION}px"
        ));
    }
    result
}

/// Read width and height from the image header without decoding pixels.
///
/// Returns `None` when the format is unknown or the header is corrupt.
pub(crate) async fn probe_dimensions(asset: &ImageAsset) -> Option<(u32, u32)> {
    let payload = asset.payload();
    tokio::task::spawn_blocking(move || {
        image::ImageReader::new(Cursor::new(payload.as_ref()))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    })
    .await
    .ok()
    .flatten()
}

/// Lowercase suffix after the last `.`; the whole name when there is none.
pub fn file_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or_default().to_lowercase()
}

/// Canonical MIME type for a supported extension.
pub fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let ext = ext.to_lowercase();
    MIME_TYPES
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
}

/// Human-readable size: bytes, KB, MB or GB.
pub fn readable_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    match bytes {
        b if b < KB => format!("{b} bytes"),
        b if b < MB => format!("{:.1} KB", b as f64 / KB as f64),
        b if b < GB => format!("{:.1} MB", b as f64 / MB as f64),
        b => format!("{:.1} GB", b as f64 / GB as f64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

    const MB: usize = 1024 * 1024;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 20, 30, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .expect("encode png");
        buf
    }

    #[test]
    fn accepts_small_png() {
        let asset = ImageAsset::new("cat.png", png(64, 64));
        let r = validate(Some(&asset), &ValidationOptions::default());
        assert!(r.valid, "{:?}", r.errors);
        assert!(r.errors.is_empty());
    }

    #[test]
    fn missing_asset() {
        let r = validate(None, &ValidationOptions::default());
        assert!(!r.valid);
        assert_eq!(r.errors, vec!["No image file provided"]);
    }

    #[test]
    fn oversized_jpeg_reports_exact_message() {
        let asset = ImageAsset::new("big.jpg", vec![0u8; 25 * MB]);
        let r = validate(Some(&asset), &ValidationOptions::default());
        assert!(!r.valid);
        assert_eq!(
            r.errors,
            vec!["Image too large: 25.00MB. Maximum allowed: 20MB"]
        );
    }

    #[test]
    fn size_checked_regardless_of_other_failures() {
        let asset = ImageAsset::new("big.tiff", vec![0u8; 21 * MB])
            .with_mime_type(Some("application/pdf"));
        let r = validate(Some(&asset), &ValidationOptions::default());
        assert_eq!(r.errors.len(), 3);
        assert!(r.errors[0].starts_with("Unsupported format: tiff"));
        assert!(r.errors[1].starts_with("Invalid file type: application/pdf"));
        assert!(r.errors[2].starts_with("Image too large: 21.00MB"));
    }

    #[test]
    fn unsupported_extension_flagged_even_with_valid_mime() {
        let asset =
            ImageAsset::new("photo.heic", vec![1u8; 10]).with_mime_type(Some("image/jpeg"));
        let r = validate(Some(&asset), &ValidationOptions::default());
        assert!(!r.valid);
        assert_eq!(r.errors.len(), 1);
        assert_eq!(
            r.errors[0],
            "Unsupported format: heic. Please use: jpg, jpeg, png, bmp, webp, gif"
        );
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let asset = ImageAsset::new("SCAN.PNG", vec![1u8; 10]);
        assert!(validate(Some(&asset), &ValidationOptions::default()).valid);
    }

    #[test]
    fn empty_payload_is_invalid_object() {
        let asset = ImageAsset::new("a.png", Vec::<u8>::new());
        let r = validate(Some(&asset), &ValidationOptions::default());
        assert_eq!(r.errors, vec!["Invalid file object: the file is empty"]);
    }

    #[test]
    fn options_override_limits() {
        let opts = ValidationOptions {
            max_size_mb: 0.5,
            formats: vec!["png".into()],
        };
        let asset = ImageAsset::new("a.jpg", vec![0u8; MB]);
        let r = validate(Some(&asset), &opts);
        assert_eq!(r.errors.len(), 2);
        assert_eq!(r.errors[0], "Unsupported format: jpg. Please use: png");
        assert_eq!(r.errors[1], "Image too large: 1.00MB. Maximum allowed: 0.5MB");
    }

    #[test]
    fn missing_mime_is_not_an_error() {
        let asset = ImageAsset::new("a.png", vec![1u8; 4]).with_mime_type(None::<String>);
        assert!(validate(Some(&asset), &ValidationOptions::default()).valid);
    }

    #[test]
    fn validation_does_not_touch_asset() {
        let asset = ImageAsset::new("a.gif", vec![9u8; 32]);
        let before = asset.clone();
        let _ = validate(Some(&asset), &ValidationOptions::default());
        assert_eq!(asset, before);
    }

    #[tokio::test]
    async fn dimensions_within_bounds() {
        let asset = ImageAsset::new("ok.png", png(50, 120));
        let r = validate_dimensions(&asset).await;
        assert!(r.valid, "{:?}", r.errors);
    }

    #[tokio::test]
    async fn dimensions_too_small() {
        let asset = ImageAsset::new("tiny.png", png(49, 80));
        let r = validate_dimensions(&asset).await;
        assert!(!r.valid);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].starts_with("Image dimensions too small: 49x80px"));
    }

    #[tokio::test]
    async fn dimensions_too_large() {
        let asset = ImageAsset::new("wide.png", png(5001, 60));
        let r = validate_dimensions(&asset).await;
        assert!(r.errors[0].starts_with("Image dimensions too large: 5001x60px"));
    }

    #[tokio::test]
    async fn undecodable_image() {
        let asset = ImageAsset::new("junk.png", b"definitely not an image".to_vec());
        let r = validate_dimensions(&asset).await;
        assert_eq!(
            r.errors,
            vec!["Failed to load image for dimension validation"]
        );
    }

    #[test]
    fn helpers() {
        assert_eq!(file_extension("a.b.JPEG"), "jpeg");
        assert_eq!(file_extension("noext"), "noext");
        assert_eq!(mime_for_extension("WEBP"), Some("image/webp"));
        assert_eq!(mime_for_extension("tiff"), None);
        assert_eq!(readable_file_size(512), "512 bytes");
        assert_eq!(readable_file_size(1536), "1.5 KB");
        assert_eq!(readable_file_size(2 * 1024 * 1024), "2.0 MB");
        assert_eq!(readable_file_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
