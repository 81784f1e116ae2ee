//! Synthesis client: prompt validation, the service trait and providers.

pub mod providers;
mod service;
mod types;

pub use service::{Credentials, EnvCredentials, StaticCredentials, SynthesisService};
pub use types::{ImageFormat, Prompt, SynthesisRequest};
