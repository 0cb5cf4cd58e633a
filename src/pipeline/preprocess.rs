//! Image preprocessing: file on disk → base64 payload with a truthful MIME type.
//!
//! Vision APIs cap the size of inline attachments and bill by pixel area, so
//! oversized files are downscaled before upload. Small files are sent
//! byte-for-byte: re-encoding a JPEG that already fits would only add
//! generation loss.
//!
//! The declared media type is always derived from the bytes being sent.
//! A downscaled image is PNG; a pass-through image keeps whatever format
//! its content actually is, regardless of the file extension.

use crate::config::{DEFAULT_MAX_DIMENSION, DEFAULT_SIZE_THRESHOLD_BYTES};
use crate::error::{ExtractionError, PreprocessError};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Size threshold and target bound for downscaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreprocessOptions {
    pub size_threshold_bytes: u64,
    pub max_dimension: u32,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

/// A validated image as found on disk.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    pub path: PathBuf,
    pub byte_size: u64,
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// Base64 image bytes ready to be attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    /// Standard-alphabet base64, padded, no line breaks.
    pub data: String,
    /// MIME type of the encoded bytes, e.g. `image/png`.
    pub media_type: String,
    /// Length of the bytes before base64 encoding.
    pub byte_len: usize,
    /// Size of the original file on disk.
    pub original_byte_len: u64,
    pub width: u32,
    pub height: u32,
    /// True when the image was downscaled and re-encoded as PNG.
    pub resized: bool,
}

impl EncodedPayload {
    /// Decode the base64 text back into raw image bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }

    /// Wrap the payload as a provider image attachment.
    pub fn into_image_data(self) -> ImageData {
        ImageData::new(self.data, self.media_type.as_str())
    }
}

/// Read, validate and (if too large) downscale an image, then base64 it.
///
/// Returns either a complete payload or the first failure; never a partial
/// result. Performs no disk writes. CPU-bound: call from
/// `spawn_blocking` inside async code.
pub fn preprocess_image(
    path: &Path,
    options: &PreprocessOptions,
) -> Result<EncodedPayload, PreprocessError> {
    let bytes = read_image_bytes(path)?;
    let (asset, img) = decode_asset(path, &bytes)?;

    debug!(
        "{}: {} bytes, {}x{} {:?}",
        path.display(),
        asset.byte_size,
        asset.width,
        asset.height,
        asset.format
    );

    if asset.byte_size > options.size_threshold_bytes {
        let (png, width, height) = downscale_to_png(path, &img, options.max_dimension)?;
        debug!(
            "{}: over {} byte threshold, re-encoded {}x{} → {}x{} PNG ({} bytes)",
            path.display(),
            options.size_threshold_bytes,
            asset.width,
            asset.height,
            width,
            height,
            png.len()
        );
        Ok(EncodedPayload {
            data: STANDARD.encode(&png),
            media_type: ImageFormat::Png.to_mime_type().to_string(),
            byte_len: png.len(),
            original_byte_len: asset.byte_size,
            width,
            height,
            resized: true,
        })
    } else {
        Ok(EncodedPayload {
            data: STANDARD.encode(&bytes),
            media_type: asset.format.to_mime_type().to_string(),
            byte_len: bytes.len(),
            original_byte_len: asset.byte_size,
            width: asset.width,
            height: asset.height,
            resized: false,
        })
    }
}

/// Run [`preprocess_image`] on the blocking thread pool.
///
/// Decoding and Lanczos resampling of a 12-megapixel photo takes long
/// enough to stall a Tokio worker, so it never runs on one.
pub async fn preprocess_image_async(
    path: &Path,
    options: PreprocessOptions,
) -> Result<EncodedPayload, ExtractionError> {
    let path = path.to_path_buf();
    let payload = tokio::task::spawn_blocking(move || preprocess_image(&path, &options))
        .await
        .map_err(|e| ExtractionError::Internal(format!("Preprocess task panicked: {}", e)))??;
    Ok(payload)
}

/// Inspect an image without encoding it.
pub fn inspect_image(path: &Path) -> Result<ImageAsset, PreprocessError> {
    let bytes = read_image_bytes(path)?;
    decode_asset(path, &bytes).map(|(asset, _)| asset)
}

/// Target size that fits within `max_dim` on both sides, keeping aspect ratio.
///
/// Never upscales and never returns a zero dimension.
pub fn fit_within(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }
    let scale = f64::from(max_dim) / f64::from(width.max(height));
    let w = (f64::from(width) * scale).round().max(1.0) as u32;
    let h = (f64::from(height) * scale).round().max(1.0) as u32;
    (w.min(max_dim), h.min(max_dim))
}

fn read_image_bytes(path: &Path) -> Result<Vec<u8>, PreprocessError> {
    std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => PreprocessError::FileNotFound {
            path: path.to_path_buf(),
        },
        std::io::ErrorKind::PermissionDenied => PreprocessError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PreprocessError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        },
    })
}

fn decode_asset(path: &Path, bytes: &[u8]) -> Result<(ImageAsset, DynamicImage), PreprocessError> {
    let decode_err = |source| PreprocessError::ImageDecode {
        path: path.to_path_buf(),
        source,
    };
    let format = image::guess_format(bytes).map_err(decode_err)?;
    let img = image::load_from_memory_with_format(bytes, format).map_err(decode_err)?;
    let (width, height) = img.dimensions();

    let asset = ImageAsset {
        path: path.to_path_buf(),
        byte_size: bytes.len() as u64,
        width,
        height,
        format,
    };
    Ok((asset, img))
}

fn downscale_to_png(
    path: &Path,
    img: &DynamicImage,
    max_dim: u32,
) -> Result<(Vec<u8>, u32, u32), PreprocessError> {
    let (w, h) = img.dimensions();
    let (tw, th) = fit_within(w, h, max_dim);

    let resized = if (tw, th) == (w, h) {
        img.clone()
    } else {
        img.resize_exact(tw, th, FilterType::Lanczos3)
    };

    let mut buf = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| PreprocessError::ImageResize {
            path: path.to_path_buf(),
            detail: format!("PNG encoding failed: {e}"),
        })?;

    Ok((buf, resized.width(), resized.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_pixel(w, h, Rgb([250, 250, 250]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    #[test]
    fn fit_within_keeps_small_images() {
        assert_eq!(fit_within(800, 600, 2048), (800, 600));
        assert_eq!(fit_within(2048, 2048, 2048), (2048, 2048));
    }

    #[test]
    fn fit_within_scales_longest_side() {
        assert_eq!(fit_within(4000, 3000, 2048), (2048, 1536));
        assert_eq!(fit_within(3000, 4000, 2048), (1536, 2048));
        assert_eq!(fit_within(10_000, 10, 2048), (2048, 2));
        assert_eq!(fit_within(100_000, 1, 2048), (2048, 1));
    }

    #[test]
    fn small_png_passes_through() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "small.png", 80, 60);
        let raw = std::fs::read(&path).unwrap();

        let payload = preprocess_image(&path, &PreprocessOptions::default()).unwrap();
        assert!(!payload.resized);
        assert_eq!(payload.media_type, "image/png");
        assert_eq!(payload.decode().unwrap(), raw);
        assert_eq!(payload.byte_len, raw.len());
        assert_eq!((payload.width, payload.height), (80, 60));
    }

    #[test]
    fn media_type_follows_content_not_extension() {
        let dir = TempDir::new().unwrap();
        // PNG bytes behind a .jpg name
        let path = write_png(&dir, "mislabelled.jpg", 16, 16);
        let payload = preprocess_image(&path, &PreprocessOptions::default()).unwrap();
        assert_eq!(payload.media_type, "image/png");
    }

    #[test]
    fn over_threshold_is_reencoded_as_png() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "wide.png", 300, 100);
        let opts = PreprocessOptions {
            size_threshold_bytes: 1,
            max_dimension: 150,
        };

        let payload = preprocess_image(&path, &opts).unwrap();
        assert!(payload.resized);
        assert_eq!(payload.media_type, "image/png");
        assert_eq!((payload.width, payload.height), (150, 50));

        let bytes = payload.decode().unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Png);
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!(img.dimensions(), (150, 50));
    }

    #[test]
    fn sixteen_bit_png_downscales_at_native_depth() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deep.png");
        image::ImageBuffer::<Rgb<u16>, _>::from_pixel(200, 100, Rgb([40_000, 1_000, 65_535]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        let opts = PreprocessOptions {
            size_threshold_bytes: 1,
            max_dimension: 50,
        };

        let payload = preprocess_image(&path, &opts).unwrap();
        let img = image::load_from_memory(&payload.decode().unwrap()).unwrap();
        assert_eq!(img.dimensions(), (50, 25));
        assert!(matches!(img, DynamicImage::ImageRgb16(_)));
    }

    #[test]
    fn over_threshold_within_bounds_is_not_upscaled() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "tiny.png", 40, 30);
        let opts = PreprocessOptions {
            size_threshold_bytes: 1,
            max_dimension: 2048,
        };
        let payload = preprocess_image(&path, &opts).unwrap();
        assert!(payload.resized);
        assert_eq!((payload.width, payload.height), (40, 30));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = preprocess_image(
            Path::new("/definitely/not/here.png"),
            &PreprocessOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PreprocessError::FileNotFound { .. }), "got {err:?}");
    }

    #[test]
    fn garbage_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"this is not an image at all").unwrap();
        let err = preprocess_image(&path, &PreprocessOptions::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::ImageDecode { .. }), "got {err:?}");
    }

    #[test]
    fn truncated_png_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let good = write_png(&dir, "good.png", 64, 64);
        let mut bytes = std::fs::read(&good).unwrap();
        bytes.truncate(bytes.len() / 2);
        let bad = dir.path().join("truncated.png");
        std::fs::write(&bad, &bytes).unwrap();

        let err = preprocess_image(&bad, &PreprocessOptions::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::ImageDecode { .. }), "got {err:?}");
    }

    #[test]
    fn inspect_reports_format_and_size() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "scan.png", 32, 24);
        let asset = inspect_image(&path).unwrap();
        assert_eq!(asset.format, ImageFormat::Png);
        assert_eq!((asset.width, asset.height), (32, 24));
        assert_eq!(asset.byte_size, std::fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn into_image_data_keeps_mime() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "x.png", 4, 4);
        let payload = preprocess_image(&path, &PreprocessOptions::default()).unwrap();
        let data = payload.into_image_data();
        assert_eq!(data.mime_type, "image/png");
    }
}
