//! Hugging Face inference API provider.

use crate::error::{sanitize_error_message, ImgDropError, Result};
use crate::synthesis::service::{Credentials, EnvCredentials, StaticCredentials, SynthesisService};
use crate::synthesis::types::{ImageFormat, SynthesisRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";

/// Default text-to-image model.
pub const DEFAULT_MODEL: &str = "black-forest-labs/FLUX.1-dev";

/// Builder for HuggingFaceProvider.
#[derive(Clone)]
pub struct HuggingFaceProviderBuilder {
    credentials: Option<Arc<dyn Credentials>>,
    model: String,
    endpoint: Option<String>,
    timeout: Duration,
}

impl Default for HuggingFaceProviderBuilder {
    fn default() -> Self {
        Self {
            credentials: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: None,
            timeout: Duration::from_secs(120),
        }
    }
}

impl HuggingFaceProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed API token. Falls back to `HUGGINGFACE_API_KEY` at call time.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.credentials = Some(Arc::new(StaticCredentials::new(key)));
        self
    }

    /// Sets the credential source.
    pub fn credentials(mut self, credentials: Arc<dyn Credentials>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the model id, e.g. `black-forest-labs/FLUX.1-dev`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Overrides the full endpoint URL (the model id is then ignored).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Builds the provider.
    ///
    /// A missing token is not an error here; it fails the first call instead.
    pub fn build(self) -> Result<HuggingFaceProvider> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| ImgDropError::Unexpected(format!("failed to build HTTP client: {e}")))?;

        let endpoint = self
            .endpoint
            .unwrap_or_else(|| format!("{}/{}", DEFAULT_BASE_URL, self.model));

        Ok(HuggingFaceProvider {
            client,
            credentials: self
                .credentials
                .unwrap_or_else(|| Arc::new(EnvCredentials::default())),
            model: self.model,
            endpoint,
            timeout: self.timeout,
        })
    }
}

/// Text-to-image provider backed by the Hugging Face inference API.
pub struct HuggingFaceProvider {
    client: reqwest::Client,
    credentials: Arc<dyn Credentials>,
    model: String,
    endpoint: String,
    timeout: Duration,
}

impl HuggingFaceProvider {
    /// Creates a new `HuggingFaceProviderBuilder`.
    pub fn builder() -> HuggingFaceProviderBuilder {
        HuggingFaceProviderBuilder::new()
    }

    /// Returns the endpoint requests are sent to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the configured model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn token(&self) -> Result<String> {
        self.credentials.bearer_token().ok_or_else(|| {
            ImgDropError::Auth("HUGGINGFACE_API_KEY not set and no API key provided".into())
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> ImgDropError {
        if err.is_timeout() {
            ImgDropError::Timeout(self.timeout)
        } else {
            ImgDropError::Network(err)
        }
    }

    fn parse_error(status: u16, body: &str) -> ImgDropError {
        let message = sanitize_error_message(body);
        match status {
            401 | 403 => ImgDropError::Auth(message),
            _ => ImgDropError::Api { status, message },
        }
    }
}

#[async_trait]
impl SynthesisService for HuggingFaceProvider {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        let start = Instant::now();
        let token = self.token()?;

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &text));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(e))?
            .to_vec();

        if data.is_empty() {
            return Err(ImgDropError::Unexpected(
                "service returned an empty body".into(),
            ));
        }

        tracing::debug!(
            model = %self.model,
            bytes = data.len(),
            format = ?ImageFormat::from_magic_bytes(&data),
            duration_ms = start.elapsed().as_millis() as u64,
            "synthesis complete"
        );

        Ok(data)
    }

    fn name(&self) -> &str {
        "Hugging Face Inference"
    }

    async fn health_check(&self) -> Result<()> {
        let token = self.token()?;
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = Self::parse_error(status.as_u16(), &text);
            tracing::warn!(model = %self.model, status = status.as_u16(), "health check failed: {err}");
            return Err(err);
        }
        Ok(())
    }
}
