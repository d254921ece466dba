use crate::error::{AccountingError, Result};
use crate::llm::client::{GeminiClient, ModelBackend};
use crate::llm::prompts::classification_prompt;
use crate::llm::types::*;
use crate::schema::TransactionAnalysis;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::time::timeout;

pub const API_KEY_ENV: &str = "GOOGLE_GEMINI_API_KEY";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const LOGGED_MODEL_NAMES: usize = 10;

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub models: Vec<ModelCandidate>,
    pub temperature: f32,
    pub max_output_tokens: u32,
    /// Upper bound on a single candidate's round-trip.
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            models: ModelCandidate::defaults(),
            temperature: 0.1,
            max_output_tokens: 500,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClassifierConfig {
    /// Reads the API key (and an optional base URL override) from the process
    /// environment. A missing key is not an error here; `classify` reports it.
    pub fn from_env() -> Self {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());
        let base_url = std::env::var(BASE_URL_ENV).ok();
        Self {
            api_key,
            base_url,
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_models(mut self, models: Vec<ModelCandidate>) -> Self {
        self.models = models;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Turns one free-text description into a [`TransactionAnalysis`], trying
/// each configured model in order until one yields usable output.
pub struct TransactionClassifier<B = GeminiClient> {
    backend: B,
    config: ClassifierConfig,
}

impl TransactionClassifier<GeminiClient> {
    pub fn from_env() -> Result<Self> {
        let config = ClassifierConfig::from_env();
        let mut client = GeminiClient::with_timeout(config.timeout)?;
        if let Some(base_url) = &config.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Ok(Self::new(client, config))
    }
}

impl<B: ModelBackend> TransactionClassifier<B> {
    pub fn new(backend: B, config: ClassifierConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn classify(&self, text: &str) -> Result<TransactionAnalysis> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AccountingError::MissingCredential { var: API_KEY_ENV })?;

        if text.trim().is_empty() {
            return Err(AccountingError::ValidationError(
                "transaction description is empty".to_string(),
            ));
        }

        let available = self.available_models(api_key).await;
        if !available.is_empty() {
            let shown: Vec<&String> = available.iter().take(LOGGED_MODEL_NAMES).collect();
            debug!("Available models: {:?}", shown);
        }

        let request = GenerateContentRequest {
            contents: vec![Content::text(classification_prompt(text))],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        for candidate in &self.config.models {
            info!("Trying: {}", candidate);
            match self.try_candidate(api_key, candidate, &request).await {
                Ok(analysis) => {
                    info!("Successfully used: {}", candidate);
                    return Ok(analysis);
                }
                Err(e) => warn!("Failed {}: {}", candidate, e),
            }
        }

        Err(AccountingError::AllModelsFailed { available })
    }

    async fn available_models(&self, api_key: &str) -> Vec<String> {
        match timeout(self.config.timeout, self.backend.list_models(api_key)).await {
            Ok(Ok(models)) => models,
            Ok(Err(e)) => {
                debug!("Could not list models: {}", e);
                Vec::new()
            }
            Err(_) => {
                debug!("Model listing timed out");
                Vec::new()
            }
        }
    }

    async fn try_candidate(
        &self,
        api_key: &str,
        candidate: &ModelCandidate,
        request: &GenerateContentRequest,
    ) -> Result<TransactionAnalysis> {
        let raw = timeout(
            self.config.timeout,
            self.backend.generate(api_key, candidate, request),
        )
        .await
        .map_err(|_| AccountingError::Timeout {
            model: candidate.to_string(),
            timeout: self.config.timeout,
        })??;

        parse_model_output(&candidate.to_string(), &raw)
    }
}

/// Parses the model's reply into a validated analysis.
pub fn parse_model_output(model: &str, raw: &str) -> Result<TransactionAnalysis> {
    let cleaned = strip_code_fences(raw);
    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| AccountingError::MalformedResponse {
            model: model.to_string(),
            details: e.to_string(),
        })?;

    TransactionAnalysis::from_model_value(&value).ok_or_else(|| {
        AccountingError::MalformedResponse {
            model: model.to_string(),
            details: "expected a JSON object".to_string(),
        }
    })
}

/// Removes a surrounding markdown code fence (optionally tagged `json`), if any.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut cleaned = raw.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}
