//! Decoding synthesis output and packaging it for client-side transfer.

use crate::error::{ImgDropError, Result};
use crate::synthesis::ImageFormat;
use base64::Engine;
use chrono::{DateTime, TimeZone};
use image::DynamicImage;
use std::io::Cursor;

/// MIME type of every delivered artifact.
pub const PNG_MIME: &str = "image/png";

/// Filename prefix for delivered artifacts.
const FILENAME_PREFIX: &str = "generated_image_";

/// An in-memory bitmap decoded from synthesis output.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    image: DynamicImage,
    source_format: Option<ImageFormat>,
}

impl DecodedImage {
    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Format the service returned, when recognisable.
    pub fn source_format(&self) -> Option<ImageFormat> {
        self.source_format
    }

    /// The decoded bitmap.
    pub fn as_image(&self) -> &DynamicImage {
        &self.image
    }

    /// Encodes the bitmap as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.image
            .write_to(&mut buf, image::ImageFormat::Png)
            .map_err(|e| ImgDropError::Delivery(format!("PNG encoding failed: {e}")))?;
        Ok(buf.into_inner())
    }
}

/// A packaged, text-safe image ready for a delivery directive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "artifact should be delivered"]
pub struct DeliveryArtifact {
    /// Base64 (standard alphabet, padded) PNG bytes.
    pub payload: String,
    /// Suggested download filename.
    pub filename: String,
    /// Always `image/png`.
    pub mime_type: &'static str,
}

impl DeliveryArtifact {
    /// Decodes the payload back into PNG bytes.
    pub fn png_bytes(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.payload)
            .map_err(|e| ImgDropError::Delivery(format!("invalid payload: {e}")))
    }

    /// Returns the artifact as a data URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.payload)
    }

    /// Size of the encoded payload in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

/// Decodes raw synthesis output into a bitmap.
///
/// Failure here means the call succeeded but its result is unreadable, which
/// is reported as [`ImgDropError::Decode`] rather than a transport failure.
pub fn decode(raw: &[u8]) -> Result<DecodedImage> {
    let source_format = ImageFormat::from_magic_bytes(raw);
    let image = image::load_from_memory(raw).map_err(|e| {
        tracing::error!(bytes = raw.len(), format = ?source_format, "decode failed: {e}");
        ImgDropError::Decode(e.to_string())
    })?;
    Ok(DecodedImage {
        image,
        source_format,
    })
}

/// Re-encodes the image as PNG and wraps it for delivery.
///
/// `completed_at` should be the time packaging happens so the filename
/// reflects completion, not submission.
pub fn package<Tz>(image: &DecodedImage, completed_at: DateTime<Tz>) -> Result<DeliveryArtifact>
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let png = image.to_png().inspect_err(|e| {
        tracing::error!("packaging failed: {e}");
    })?;
    let payload = base64::engine::general_purpose::STANDARD.encode(&png);
    let filename = filename_for(&completed_at);

    tracing::debug!(
        filename = %filename,
        png_bytes = png.len(),
        payload_bytes = payload.len(),
        "artifact packaged"
    );

    Ok(DeliveryArtifact {
        payload,
        filename,
        mime_type: PNG_MIME,
    })
}

/// `generated_image_{YYYYMMDD_HHMMSS}.png`
pub fn filename_for<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("{}{}.png", FILENAME_PREFIX, at.format("%Y%m%d_%H%M%S"))
}

/// True if `name` has the shape of a delivered artifact's filename.
pub fn is_artifact_filename(name: &str) -> bool {
    let Some(stamp) = name
        .strip_prefix(FILENAME_PREFIX)
        .and_then(|s| s.strip_suffix(".png"))
    else {
        return false;
    };
    let bytes = stamp.as_bytes();
    bytes.len() == 15
        && bytes[8] == b'_'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..].iter().all(u8::is_ascii_digit)
}
