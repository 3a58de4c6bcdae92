//! Core types for repaint calls.

use crate::error::{RepaintError, Result};
use crate::repaint::prompt;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Supported image formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    #[default]
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::WebP => "webp",
        }
    }

    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
        }
    }

    /// Maps a MIME type back to a format.
    pub fn from_mime_type(mime: &str) -> Option<Self> {
        match mime.trim().to_lowercase().as_str() {
            "image/png" => Some(Self::Png),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/webp" => Some(Self::WebP),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 12 {
            return None;
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // WebP: RIFF....WEBP
        if data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// The room photo to repaint, held as base64 text.
///
/// The MIME type sent upstream is `image/png` unless the input says
/// otherwise: [`from_bytes`](Self::from_bytes) sniffs magic bytes and
/// [`from_data_url`](Self::from_data_url) reads the URL's media type.
/// The client never mutates or persists it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    data: String,
    format: ImageFormat,
}

impl SourceImage {
    /// Wraps an already base64-encoded PNG.
    pub fn from_base64(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            format: ImageFormat::Png,
        }
    }

    /// Encodes raw image bytes, sniffing the format and falling back to PNG.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            format: ImageFormat::from_magic_bytes(bytes).unwrap_or_default(),
        }
    }

    /// Parses a `data:<mime>;base64,<payload>` URL, as produced by browser
    /// file readers.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| RepaintError::InvalidRequest("not a data URL".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| RepaintError::InvalidRequest("data URL has no payload".into()))?;
        let mime = header.strip_suffix(";base64").ok_or_else(|| {
            RepaintError::InvalidRequest("only base64 data URLs are supported".into())
        })?;

        Ok(Self {
            data: payload.to_string(),
            format: ImageFormat::from_mime_type(mime).unwrap_or_default(),
        })
    }

    /// Reads and encodes an image file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::from_bytes(&bytes))
    }

    /// The base64 payload.
    pub fn data(&self) -> &str {
        &self.data
    }

    /// MIME type sent alongside the payload.
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// Returns true when there is no payload to send.
    pub fn is_empty(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// One zone→color instruction, e.g. `wall` → `#FFAA00`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDirective {
    /// Free-form zone name ("wall", "ceiling", ...).
    pub zone: String,
    /// Free-form color spec: a hex code or a description.
    pub color: String,
}

impl ZoneDirective {
    /// Creates a new directive.
    pub fn new(zone: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            zone: zone.into(),
            color: color.into(),
        }
    }
}

impl<Z: Into<String>, C: Into<String>> From<(Z, C)> for ZoneDirective {
    fn from((zone, color): (Z, C)) -> Self {
        Self::new(zone, color)
    }
}

impl FromStr for ZoneDirective {
    type Err = RepaintError;

    /// Parses `zone=color`.
    fn from_str(s: &str) -> Result<Self> {
        let (zone, color) = s
            .split_once('=')
            .ok_or_else(|| RepaintError::InvalidRequest(format!("expected zone=color, got `{s}`")))?;
        let (zone, color) = (zone.trim(), color.trim());
        if zone.is_empty() || color.is_empty() {
            return Err(RepaintError::InvalidRequest(format!(
                "zone and color must both be non-empty in `{s}`"
            )));
        }
        Ok(Self::new(zone, color))
    }
}

/// A single repaint call: one image plus its ordered directives.
#[derive(Debug, Clone)]
pub struct RepaintRequest {
    /// The photo to repaint.
    pub image: SourceImage,
    /// Zone directives, in prompt order.
    pub directives: Vec<ZoneDirective>,
}

impl RepaintRequest {
    /// Creates a request from an image and any sequence of directives.
    pub fn new<I, D>(image: SourceImage, directives: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<ZoneDirective>,
    {
        Self {
            image,
            directives: directives.into_iter().map(Into::into).collect(),
        }
    }

    /// Appends a directive.
    pub fn with_directive(mut self, zone: impl Into<String>, color: impl Into<String>) -> Self {
        self.directives.push(ZoneDirective::new(zone, color));
        self
    }

    /// The instruction text sent to the model.
    pub fn instruction(&self) -> String {
        prompt::build_instruction(&self.directives)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.image.is_empty() {
            return Err(RepaintError::InvalidRequest(
                "source image payload is empty".into(),
            ));
        }
        Ok(())
    }
}

/// Metadata about a completed call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepaintMetadata {
    /// Model that produced the image.
    pub model: Option<String>,
    /// Round-trip duration in milliseconds.
    pub duration_ms: Option<u64>,
}

/// The repainted image, exactly as the endpoint returned it.
#[derive(Debug, Clone)]
#[must_use = "repainted image should be saved or displayed"]
pub struct RepaintedImage {
    /// Base64 payload from the response.
    pub data: String,
    /// MIME type reported by the endpoint, if any.
    pub mime_type: Option<String>,
    /// Call metadata.
    pub metadata: RepaintMetadata,
}

impl RepaintedImage {
    /// Format reported by the endpoint, defaulting to PNG.
    pub fn format(&self) -> ImageFormat {
        self.mime_type
            .as_deref()
            .and_then(ImageFormat::from_mime_type)
            .unwrap_or_default()
    }

    /// Decodes the base64 payload.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(self.data.trim())
            .map_err(|e| RepaintError::Decode(e.to_string()))
    }

    /// Decodes and writes the image to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.decode()?)?;
        Ok(())
    }

    /// Returns the image as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.format().mime_type(), self.data)
    }
}

/// Outcome of one repaint call, delivered exactly once.
pub type RepaintResult = Result<RepaintedImage>;
