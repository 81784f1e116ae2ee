#![warn(missing_docs)]
//! imgdrop - Prompt-to-image generation with automatic download delivery.
//!
//! This crate submits a text prompt to a remote text-to-image service,
//! decodes the returned image, and packages it as a download the client saves
//! without a manual step.
//!
//! # Quick Start
//!
//! ```no_run
//! use imgdrop::{GenerationSession, HuggingFaceProvider, SessionState};
//!
//! #[tokio::main]
//! async fn main() -> imgdrop::Result<()> {
//!     let provider = HuggingFaceProvider::builder().build()?;
//!     let mut session = GenerationSession::new(provider);
//!
//!     if session.submit("A red bicycle leaning on a wall").await == SessionState::Succeeded {
//!         let directive = session.auto_directive().expect("succeeded turns carry directives");
//!         println!("{}", directive.html);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Pipeline
//!
//! - [`synthesis`]: prompt validation and the remote service call
//! - [`progress`]: time-indexed status messages while the call runs
//! - [`artifact`]: decoding and PNG/base64 packaging
//! - [`delivery`]: automatic and manual download directives
//! - [`session`]: the per-user state machine tying the steps together
//!
//! # Features
//!
//! - `huggingface`: Hugging Face inference API provider (default)
//! - `cli`: Command-line interface

mod error;

pub mod artifact;
pub mod config;
pub mod delivery;
pub mod page;
pub mod progress;
pub mod session;
pub mod synthesis;

// Re-export error types at crate root
pub use error::{ErrorKind, ImgDropError, Result};

pub use artifact::{DecodedImage, DeliveryArtifact};
pub use config::Settings;
pub use delivery::{ClientDirective, DeliveryMode};
pub use progress::ProgressNarrator;
pub use session::{
    Completion, Failure, GenerationSession, PendingTurn, SessionState, SynthesisOutcome,
    TurnId, TurnOutput,
};
pub use synthesis::{
    Credentials, EnvCredentials, ImageFormat, Prompt, StaticCredentials, SynthesisRequest,
    SynthesisService,
};

#[cfg(feature = "huggingface")]
pub use synthesis::providers::{HuggingFaceProvider, HuggingFaceProviderBuilder};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{ErrorKind, ImgDropError, Result};
    pub use crate::session::{GenerationSession, SessionState};
    pub use crate::synthesis::{Prompt, SynthesisService};

    #[cfg(feature = "huggingface")]
    pub use crate::synthesis::providers::HuggingFaceProvider;
}
