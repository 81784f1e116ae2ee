//! Synthesis service trait and credential sources.

use crate::error::Result;
use crate::synthesis::types::SynthesisRequest;
use async_trait::async_trait;

/// Trait for remote text-to-image services.
///
/// One call is one atomic request/response; implementations never retry.
#[async_trait]
pub trait SynthesisService: Send + Sync {
    /// Sends the request and returns the raw image bytes on success.
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;

    /// Returns the name of this service for display.
    fn name(&self) -> &str;

    /// Checks if the service is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}

#[async_trait]
impl<T: SynthesisService + ?Sized> SynthesisService for std::sync::Arc<T> {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        (**self).synthesize(request).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn health_check(&self) -> Result<()> {
        (**self).health_check().await
    }
}

/// Source of the bearer token used to authorize synthesis calls.
///
/// Resolved at call time, so a missing token only fails the call that needs it.
pub trait Credentials: Send + Sync {
    /// Returns the bearer token, if one is configured.
    fn bearer_token(&self) -> Option<String>;
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    /// Default variable holding the Hugging Face token.
    pub const DEFAULT_VAR: &'static str = "HUGGINGFACE_API_KEY";

    /// Creates a source reading the given variable.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvCredentials {
    fn default() -> Self {
        Self::new(Self::DEFAULT_VAR)
    }
}

impl Credentials for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// A fixed token supplied by the caller.
#[derive(Clone)]
pub struct StaticCredentials(String);

impl StaticCredentials {
    /// Wraps the given token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticCredentials(***)")
    }
}

impl Credentials for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone()).filter(|t| !t.is_empty())
    }
}
