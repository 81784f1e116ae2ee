//! Error types for prompt-to-image generation and delivery.

use std::time::Duration;

/// Maximum length of a provider error body kept for logging.
const MAX_LOGGED_MESSAGE_LEN: usize = 512;

/// Errors that can occur while generating, packaging or delivering an image.
#[derive(Debug, thiserror::Error)]
pub enum ImgDropError {
    /// Prompt was empty or whitespace-only.
    #[error("prompt is empty")]
    EmptyPrompt,

    /// API token missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request did not complete in time.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Any other client-side fault during the call.
    #[error("unexpected error: {0}")]
    Unexpected(String),

    /// Returned bytes are not a readable image.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Building the download directive failed.
    #[error("failed to prepare download: {0}")]
    Delivery(String),

    /// A generation is already in flight for this session.
    #[error("a generation is already in progress")]
    Busy,

    /// I/O error (e.g., saving the delivered file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classification surfaced to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Local validation rejected the prompt; nothing was sent.
    EmptyPrompt,
    /// Network, timeout, authentication or non-2xx status.
    Transport,
    /// Any other failure during the call.
    Unexpected,
    /// Generation succeeded but the result could not be read.
    Decode,
    /// The download could not be prepared.
    Delivery,
}

impl ErrorKind {
    /// Short, safe message shown to the end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::EmptyPrompt => "Please enter a prompt for image generation.",
            Self::Transport => "Failed to generate image. Please try again later.",
            Self::Unexpected => "An unexpected error occurred while generating the image.",
            Self::Decode => "The image was generated but could not be read. Please try again.",
            Self::Delivery => "The image was generated but the download could not be prepared.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPrompt => write!(f, "empty_prompt"),
            Self::Transport => write!(f, "transport"),
            Self::Unexpected => write!(f, "unexpected"),
            Self::Decode => write!(f, "decode"),
            Self::Delivery => write!(f, "delivery"),
        }
    }
}

impl ImgDropError {
    /// Maps this error onto the user-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyPrompt => ErrorKind::EmptyPrompt,
            Self::Auth(_) | Self::Api { .. } | Self::Network(_) | Self::Timeout(_) => {
                ErrorKind::Transport
            }
            Self::Decode(_) => ErrorKind::Decode,
            Self::Delivery(_) => ErrorKind::Delivery,
            Self::Unexpected(_) | Self::Busy | Self::Io(_) => ErrorKind::Unexpected,
        }
    }

    /// Returns the safe message for this error's kind.
    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    /// Returns true if this error is likely transient.
    ///
    /// Nothing in this crate retries; a failed turn needs a fresh submission.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Api { status, .. } => *status == 429 || *status == 503,
            _ => false,
        }
    }
}

/// Prepares a provider response body for logging.
///
/// Truncates long bodies and masks anything following a `Bearer ` marker,
/// matched in any letter case, so echoed credentials never reach the log.
pub(crate) fn sanitize_error_message(raw: &str) -> String {
    const MARKER: &str = "bearer ";

    let mut out = String::with_capacity(raw.len().min(MAX_LOGGED_MESSAGE_LEN));
    let mut rest = raw.trim();
    // ASCII lowercasing keeps byte offsets aligned with `rest`
    while let Some(pos) = rest.to_ascii_lowercase().find(MARKER) {
        let pos = pos + MARKER.len();
        out.push_str(&rest[..pos]);
        out.push_str("***");
        rest = &rest[pos..];
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '"' || c == ',')
            .unwrap_or(rest.len());
        rest = &rest[end..];
    }
    out.push_str(rest);

    if out.chars().count() > MAX_LOGGED_MESSAGE_LEN {
        let truncated: String = out.chars().take(MAX_LOGGED_MESSAGE_LEN).collect();
        return format!("{truncated}...");
    }
    out
}

/// Result type alias for imgdrop operations.
pub type Result<T> = std::result::Result<T, ImgDropError>;
