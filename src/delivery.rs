//! Download directives that make the client save a packaged artifact.
//!
//! The server renders the page and the browser saves the file, so the
//! artifact travels inline as a `data:` URL inside a small HTML fragment.
//! [`DeliveryMode::Auto`] clicks a hidden anchor from script;
//! [`DeliveryMode::Manual`] renders a visible control for the user. Both
//! carry the same href and filename.

use crate::artifact::DeliveryArtifact;
use crate::error::{ImgDropError, Result};
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Element id prefix for automatic directives.
const AUTO_ID_PREFIX: &str = "download-";

/// Element id prefix for manual download controls.
const MANUAL_ID_PREFIX: &str = "download-button-";

/// Largest base64 payload inlined into a directive by default (32 MiB).
pub const DEFAULT_MAX_PAYLOAD: usize = 32 * 1024 * 1024;

/// How the download is triggered. Never changes the delivered content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryMode {
    /// Best effort, no user action: a script clicks a hidden anchor.
    Auto,
    /// An explicit control the user clicks.
    Manual,
}

impl std::fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// A client-executable instruction that saves an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientDirective {
    /// Trigger mechanism.
    pub mode: DeliveryMode,
    /// Unique DOM id of the anchor.
    pub element_id: String,
    /// Filename the client will save as.
    pub filename: String,
    /// HTML fragment to embed in the page.
    pub html: String,
}

impl ClientDirective {
    /// Returns the `href` value embedded in the directive.
    pub fn href(&self) -> Option<&str> {
        let start = self.html.find("href=\"")? + 6;
        let len = self.html[start..].find('"')?;
        Some(&self.html[start..start + len])
    }
}

/// Builds a directive for `artifact`.
///
/// Each call mints a fresh element id, so directives rendered within one page
/// never share an anchor even when their filenames collide.
pub fn build_directive(artifact: &DeliveryArtifact, mode: DeliveryMode) -> Result<ClientDirective> {
    build_directive_within(artifact, mode, DEFAULT_MAX_PAYLOAD)
}

/// Like [`build_directive`], rejecting payloads longer than `max_payload`
/// base64 characters.
pub fn build_directive_within(
    artifact: &DeliveryArtifact,
    mode: DeliveryMode,
    max_payload: usize,
) -> Result<ClientDirective> {
    validate(artifact, max_payload).inspect_err(|e| {
        tracing::error!(mode = %mode, "directive construction failed: {e}");
    })?;

    let href = artifact.data_url();
    let (element_id, html) = match mode {
        DeliveryMode::Auto => {
            let id = format!("{}{}", AUTO_ID_PREFIX, uuid::Uuid::new_v4());
            let html = auto_html(&id, &href, &artifact.filename);
            (id, html)
        }
        DeliveryMode::Manual => {
            let id = format!("{}{}", MANUAL_ID_PREFIX, uuid::Uuid::new_v4());
            let html = manual_html(&id, &href, &artifact.filename);
            (id, html)
        }
    };

    tracing::debug!(mode = %mode, element_id = %element_id, filename = %artifact.filename, "directive built");

    Ok(ClientDirective {
        mode,
        element_id,
        filename: artifact.filename.clone(),
        html,
    })
}

/// Writes the artifact into `dir` under its filename.
///
/// This is the native rendering of a directive for clients that share the
/// process's filesystem (the CLI). An existing file is never overwritten;
/// a name collision is a [`ImgDropError::Delivery`] error.
pub fn save_to_dir(artifact: &DeliveryArtifact, dir: impl AsRef<Path>) -> Result<PathBuf> {
    validate(artifact, usize::MAX)?;
    let bytes = artifact.png_bytes()?;
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&artifact.filename);
    let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::warn!(path = %path.display(), "refusing to overwrite existing file");
            return Err(ImgDropError::Delivery(format!(
                "{} already exists",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };
    file.write_all(&bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "artifact saved");
    Ok(path)
}

/// Rejects artifacts that cannot be inlined safely into HTML or a path.
fn validate(artifact: &DeliveryArtifact, max_payload: usize) -> Result<()> {
    let name = &artifact.filename;
    if name.is_empty()
        || name.starts_with('.')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(ImgDropError::Delivery(format!("unsafe filename: {name:?}")));
    }
    if artifact.payload.is_empty() {
        return Err(ImgDropError::Delivery("empty payload".into()));
    }
    if artifact.payload.len() > max_payload {
        return Err(ImgDropError::Delivery(format!(
            "payload of {} bytes exceeds the {max_payload} byte limit",
            artifact.payload.len()
        )));
    }
    if !artifact
        .payload
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
    {
        return Err(ImgDropError::Delivery(
            "payload is not standard base64".into(),
        ));
    }
    if artifact.mime_type != crate::artifact::PNG_MIME {
        return Err(ImgDropError::Delivery(format!(
            "unsupported MIME type: {}",
            artifact.mime_type
        )));
    }
    Ok(())
}

fn auto_html(id: &str, href: &str, filename: &str) -> String {
    format!(
        r#"<div>
    <a id="{id}" class="auto-download" href="{href}" download="{filename}" style="display: none;">download</a>
    <script>
        (() => {{
            try {{
                const link = document.getElementById("{id}");
                if (link) {{
                    link.click();
                    link.remove();
                }}
            }} catch (e) {{
                console.error("Auto download failed:", e);
            }}
        }})();
    </script>
</div>"#
    )
}

fn manual_html(id: &str, href: &str, filename: &str) -> String {
    format!(
        r#"<a id="{id}" class="download-button" href="{href}" download="{filename}">Download Image</a>"#
    )
}
