//! End-to-end tests against the live enhancement service.
//!
//! These make real uploads and are gated behind the `E2E_ENABLED`
//! environment variable so they do not run in CI unless explicitly
//! requested. `SUPERRES_API_KEY` must hold a valid key.
//!
//! Run with:
//!   E2E_ENABLED=1 SUPERRES_API_KEY=... cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_enhance_small_png -- --nocapture

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use superres_client::{
    EnhanceConfig, EnhanceOptions, EnhanceProgressCallback, Enhancer, ErrorKind, ImageAsset,
    NoopProgressCallback,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Skip this test unless E2E_ENABLED and an API key are both set.
macro_rules! e2e_skip_unless_ready {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if std::env::var("SUPERRES_API_KEY").map_or(true, |k| k.is_empty()) {
            println!("SKIP — SUPERRES_API_KEY is not set");
            return;
        }
    }};
}

/// A gradient PNG with enough structure for the upscaler to work on.
fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 128])
    });
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("encode sample png");
    buf
}

fn enhancer(config: EnhanceConfig) -> Enhancer {
    Enhancer::from_config(config).expect("service should resolve from SUPERRES_API_KEY")
}

// ── Live tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_enhance_small_png() {
    e2e_skip_unless_ready!();

    let asset = ImageAsset::new("gradient.png", sample_png(160, 120));
    let out = enhancer(EnhanceConfig::default())
        .enhance(&asset, &EnhanceOptions::strict())
        .await
        .expect("enhance() should succeed");

    assert!(!out.degraded);
    assert!(
        out.image_url.starts_with("http"),
        "unexpected result url: {}",
        out.image_url
    );
    assert!(out.task_id.is_some());
    println!("Enhanced → {} ({}x{})", out.image_url, out.width, out.height);
}

#[tokio::test]
async fn test_enhance_to_file_downloads_result() {
    e2e_skip_unless_ready!();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("gradient_hd.png");
    let asset = ImageAsset::new("gradient.png", sample_png(200, 200));

    let out = enhancer(EnhanceConfig::default())
        .enhance_to_file(&asset, &target, &EnhanceOptions::strict())
        .await
        .expect("enhance_to_file() should succeed");

    let written = std::fs::read(&target).unwrap();
    assert!(!written.is_empty());
    let (w, h) = image::ImageReader::new(Cursor::new(&written))
        .with_guessed_format()
        .unwrap()
        .into_dimensions()
        .expect("result should be a readable image");
    println!("Wrote {} bytes, {}x{} (reported {}x{})", written.len(), w, h, out.width, out.height);
    assert!(w >= 200 && h >= 200, "result should not be smaller than the input");
}

#[tokio::test]
async fn test_bad_key_is_api_error() {
    e2e_skip_unless_ready!();

    let config = EnhanceConfig::builder()
        .api_key("definitely-not-a-valid-key")
        .max_retries(0)
        .build()
        .unwrap();
    let err = enhancer(config)
        .enhance(
            &ImageAsset::new("gradient.png", sample_png(80, 80)),
            &EnhanceOptions::strict(),
        )
        .await
        .expect_err("a bogus key must be rejected");

    println!("Got [{}] {} ({:?})", err.kind, err, err.detail());
    assert!(matches!(err.kind, ErrorKind::Api | ErrorKind::Upload));
}

#[tokio::test]
async fn test_progress_callback_sees_polls() {
    e2e_skip_unless_ready!();

    struct Counter(AtomicU32);
    impl EnhanceProgressCallback for Counter {
        fn on_uploaded(&self, _name: &str, task_id: &str) {
            println!("uploaded as {task_id}");
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let counter = Arc::new(Counter(AtomicU32::new(0)));
    let config = EnhanceConfig::builder()
        .progress_callback(Arc::clone(&counter) as Arc<dyn EnhanceProgressCallback>)
        .build()
        .unwrap();
    enhancer(config)
        .enhance(
            &ImageAsset::new("gradient.png", sample_png(120, 120)),
            &EnhanceOptions::strict(),
        )
        .await
        .expect("enhance() should succeed");
    assert!(counter.0.load(Ordering::SeqCst) >= 1);
}

// ── Offline checks (always run) ──────────────────────────────────────────────

#[test]
fn test_noop_callback_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<NoopProgressCallback>();
    assert_send_sync::<Enhancer>();
}

#[tokio::test]
async fn test_enhancer_is_usable_from_spawned_tasks() {
    let svc: Arc<dyn superres_client::EnhanceService> =
        Arc::new(superres_client::testing::ScriptedService::new());
    let enhancer = Enhancer::new(svc, EnhanceConfig::default());
    let handle = tokio::spawn(async move {
        enhancer
            .enhance(&ImageAsset::new("x.bmp", Vec::<u8>::new()), &EnhanceOptions::default())
            .await
    });
    let err = handle.await.unwrap().unwrap_err();
    assert_eq!(err.kind, ErrorKind::Validation);
}
