//! Core types for synthesis requests.

use crate::error::{ImgDropError, Result};
use serde::Serialize;

/// Image formats a synthesis service may return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
}

impl ImageFormat {
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

/// A validated, non-empty text prompt.
///
/// Surrounding whitespace is trimmed during validation; the trimmed text is
/// what gets sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    /// Validates raw user input, rejecting empty or whitespace-only text.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ImgDropError::EmptyPrompt);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the prompt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request to synthesize an image from a prompt.
///
/// Immutable once built. Serializes to the wire body `{"inputs": "<prompt>"}`.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    #[serde(rename = "inputs")]
    prompt: Prompt,
}

impl SynthesisRequest {
    /// Creates a request for the given prompt.
    pub fn new(prompt: Prompt) -> Self {
        Self { prompt }
    }

    /// Returns the prompt carried by this request.
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }
}
