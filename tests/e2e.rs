//! End-to-end integration tests for edgequake-img2text.
//!
//! The preprocessing tests generate their own images in a temp directory and
//! always run. The extraction tests make live LLM API calls against images in
//! `./test_cases/` and are gated behind `E2E_ENABLED` plus the provider key.
//!
//! Run with:
//!   E2E_ENABLED=1 ANTHROPIC_API_KEY=... cargo test --test e2e -- --nocapture

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_img2text::{
    inspect_image, preprocess_image, ExtractionConfig, ExtractionError,
    ExtractionProgressCallback, Extractor, PreprocessError, PreprocessOptions, PromptStyle,
};
use image::{GenericImageView, ImageFormat, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

/// Deterministic high-entropy pixels so encoders cannot compress them away.
fn noisy_image(w: u32, h: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9;
    RgbImage::from_fn(w, h, |_, _| {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        let [r, g, b, _] = state.to_le_bytes();
        Rgb([r, g, b])
    })
}

fn save(dir: &TempDir, name: &str, img: &RgbImage, format: ImageFormat) -> PathBuf {
    let path = dir.path().join(name);
    img.save_with_format(&path, format).unwrap();
    path
}

fn file_len(path: &Path) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

/// Skip this test if E2E_ENABLED or the API key is unset, or no file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        if std::env::var("ANTHROPIC_API_KEY").is_err() {
            println!("SKIP — ANTHROPIC_API_KEY not set");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

// ── Preprocessing (no LLM, always run) ───────────────────────────────────────

#[test]
fn test_small_png_passes_through_unmodified() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "page.png", &noisy_image(800, 600), ImageFormat::Png);
    let raw = std::fs::read(&path).unwrap();
    assert!(raw.len() as u64 <= 5 * 1024 * 1024);

    let payload = preprocess_image(&path, &PreprocessOptions::default()).unwrap();

    assert!(!payload.resized);
    assert_eq!(payload.media_type, "image/png");
    assert_eq!((payload.width, payload.height), (800, 600));
    assert_eq!(STANDARD.decode(&payload.data).unwrap(), raw);
}

#[test]
fn test_small_jpeg_declared_as_jpeg() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "photo.jpg", &noisy_image(320, 240), ImageFormat::Jpeg);
    let raw = std::fs::read(&path).unwrap();

    let payload = preprocess_image(&path, &PreprocessOptions::default()).unwrap();

    assert!(!payload.resized);
    assert_eq!(payload.media_type, "image/jpeg");
    assert_eq!(payload.decode().unwrap(), raw);
}

#[test]
fn test_large_jpeg_is_downscaled_to_png() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "scan.jpg", &noisy_image(4000, 3000), ImageFormat::Jpeg);

    // Anything strictly larger than the threshold is downscaled.
    let opts = PreprocessOptions {
        size_threshold_bytes: file_len(&path) - 1,
        max_dimension: 2048,
    };
    let payload = preprocess_image(&path, &opts).unwrap();

    assert!(payload.resized);
    assert_eq!(payload.media_type, "image/png");
    assert_eq!(payload.original_byte_len, file_len(&path));

    let bytes = payload.decode().unwrap();
    assert_eq!(bytes.len(), payload.byte_len);
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);

    let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png).unwrap();
    assert_eq!(img.dimensions(), (2048, 1536));
}

#[test]
fn test_threshold_is_strictly_greater_than() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "edge.png", &noisy_image(64, 64), ImageFormat::Png);

    let opts = PreprocessOptions {
        size_threshold_bytes: file_len(&path),
        max_dimension: 32,
    };
    let payload = preprocess_image(&path, &opts).unwrap();
    assert!(!payload.resized, "a file exactly at the threshold is sent as-is");
    assert_eq!((payload.width, payload.height), (64, 64));
}

#[test]
fn test_portrait_aspect_ratio_preserved() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "tall.png", &noisy_image(600, 1800), ImageFormat::Png);

    let opts = PreprocessOptions {
        size_threshold_bytes: 1,
        max_dimension: 300,
    };
    let payload = preprocess_image(&path, &opts).unwrap();
    assert_eq!((payload.width, payload.height), (100, 300));
}

#[test]
fn test_corrupt_file_yields_decode_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.jpg");
    // JPEG SOI marker followed by junk
    std::fs::write(&path, [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x01, 0x02, 0x03]).unwrap();

    let err = preprocess_image(&path, &PreprocessOptions::default()).unwrap_err();
    assert!(
        matches!(err, PreprocessError::ImageDecode { .. }),
        "expected ImageDecode, got {err:?}"
    );
}

#[test]
fn test_text_file_yields_decode_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("readme.png");
    std::fs::write(&path, "not an image, despite the name").unwrap();

    let err = preprocess_image(&path, &PreprocessOptions::default()).unwrap_err();
    assert!(matches!(err, PreprocessError::ImageDecode { .. }));
}

#[test]
fn test_missing_file_yields_not_found() {
    let err = preprocess_image(
        Path::new("/definitely/not/a/real/file.png"),
        &PreprocessOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err, PreprocessError::FileNotFound { .. }));
}

#[test]
fn test_inspect_reports_dimensions() {
    let dir = TempDir::new().unwrap();
    let path = save(&dir, "a.jpg", &noisy_image(120, 90), ImageFormat::Jpeg);
    let asset = inspect_image(&path).unwrap();
    assert_eq!(asset.format, ImageFormat::Jpeg);
    assert_eq!((asset.width, asset.height), (120, 90));
}

// ── Credential handling (no LLM, always run) ─────────────────────────────────

#[test]
fn test_missing_credential_blocks_extractor() {
    if std::env::var("GEMINI_API_KEY").is_ok() || std::env::var("GOOGLE_API_KEY").is_ok() {
        println!("SKIP — a Gemini key is set");
        return;
    }
    let config = ExtractionConfig::builder()
        .provider_name("gemini")
        .model("gemini-2.0-flash")
        .build()
        .unwrap();
    let err = Extractor::new(config).unwrap_err();
    assert!(err.to_string().contains("GEMINI_API_KEY"), "got: {err}");
}

// ── Live extraction (gated) ──────────────────────────────────────────────────

struct CountingCallback {
    completes: AtomicUsize,
    errors: AtomicUsize,
}

impl ExtractionProgressCallback for CountingCallback {
    fn on_image_complete(&self, _index: usize, _total: usize, _text_len: usize) {
        self.completes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_image_error(&self, _index: usize, _total: usize, _error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_extract_sample_image() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.png"));

    let config = ExtractionConfig::builder()
        .prompt_style(PromptStyle::Basic)
        .max_tokens(1000)
        .build()
        .unwrap();
    let extractor = Extractor::new(config).expect("ANTHROPIC_API_KEY is set");

    let result = extractor
        .extract(path.to_str().unwrap())
        .await
        .expect("extraction should succeed");

    assert!(!result.text.trim().is_empty());
    assert!(result.stats.output_tokens > 0);
    println!("{}", result.text);
}

#[tokio::test]
async fn test_batch_continues_after_bad_image() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample.png"));
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("sample.txt");

    let cb = Arc::new(CountingCallback {
        completes: AtomicUsize::new(0),
        errors: AtomicUsize::new(0),
    });
    let config = ExtractionConfig::builder()
        .progress_callback(cb.clone() as Arc<dyn ExtractionProgressCallback>)
        .build()
        .unwrap();
    let extractor = Extractor::new(config).unwrap();

    let inputs = vec![
        "/definitely/not/a/real/file.png".to_string(),
        path.to_string_lossy().to_string(),
    ];
    let results = extractor.extract_all(&inputs).await;

    assert!(matches!(results[0], Err(ExtractionError::Preprocess(_))));
    let ok = results[1].as_ref().expect("second image should succeed");
    assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
    assert_eq!(cb.completes.load(Ordering::SeqCst), 1);

    extractor
        .extract_to_file(path.to_str().unwrap(), &out)
        .await
        .expect("write should succeed");
    assert!(!std::fs::read_to_string(&out).unwrap().is_empty());
    assert!(!ok.text.is_empty());
}
