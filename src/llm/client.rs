use std::env;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use schemars::gen::SchemaSettings;
use serde_json::{Map, Value};

use crate::config::InsightsConfig;
use crate::error::{InsightsError, Result};
use crate::insights::InsightGenerator;
use crate::llm::types::*;
use crate::schema::InsightResponse;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Schema keywords the `responseSchema` field accepts.
const GEMINI_SCHEMA_KEYS: &[&str] = &[
    "type",
    "properties",
    "required",
    "items",
    "enum",
    "nullable",
    "description",
    "format",
];

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        }
    }

    /// Reads `GEMINI_API_KEY`; the model comes from `config`.
    pub fn from_env(config: &InsightsConfig) -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok(), config)
    }

    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        config: &InsightsConfig,
    ) -> Result<Self> {
        let api_key = lookup("GEMINI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| InsightsError::Config("GEMINI_API_KEY is not set".to_string()))?;

        Ok(Self::new(api_key, config.gemini_model.clone()))
    }

    /// Points the client at another endpoint, e.g. a proxy or a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        )
    }

    pub async fn generate_content(&self, prompt: &str) -> Result<String> {
        let payload = GenerateContentRequest {
            contents: vec![Content::user_text(prompt)],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: Some(insight_response_schema()?),
            },
        };

        debug!("Requesting insights from model {}", self.model);

        let res = self.client.post(self.endpoint()).json(&payload).send().await?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await?;
            return Err(InsightsError::GenerationFailed(format!(
                "Gemini API Error (status {}): {}",
                status, err_text
            )));
        }

        let body: GenerateContentResponse = res.json().await?;
        first_text(body)
    }
}

#[async_trait]
impl InsightGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.generate_content(prompt).await
    }
}

fn first_text(body: GenerateContentResponse) -> Result<String> {
    let candidate = body
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .ok_or_else(|| InsightsError::GenerationFailed("No candidates returned".to_string()))?;

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    let part = candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .ok_or_else(|| {
            InsightsError::GenerationFailed(format!(
                "No parts in content (finish reason: {})",
                finish_reason
            ))
        })?;

    match part {
        Part::Text { text } => Ok(text),
        Part::Other(_) => Err(InsightsError::GenerationFailed(
            "Model returned non-text content".to_string(),
        )),
    }
}

/// JSON schema of [`InsightResponse`] reduced to what Gemini understands.
pub fn insight_response_schema() -> Result<Value> {
    let mut settings = SchemaSettings::openapi3();
    settings.inline_subschemas = true;
    let schema = settings.into_generator().into_root_schema_for::<InsightResponse>();
    Ok(gemini_schema(serde_json::to_value(schema)?))
}

fn gemini_schema(value: Value) -> Value {
    match value {
        Value::Object(object) => {
            let mut cleaned = Map::new();
            for (key, child) in object {
                if !GEMINI_SCHEMA_KEYS.contains(&key.as_str()) {
                    continue;
                }
                let child = match key.as_str() {
                    // property names are user data, only their schemas get filtered
                    "properties" => match child {
                        Value::Object(props) => Value::Object(
                            props
                                .into_iter()
                                .map(|(name, prop)| (name, gemini_schema(prop)))
                                .collect(),
                        ),
                        other => other,
                    },
                    "items" => gemini_schema(child),
                    _ => child,
                };
                cleaned.insert(key, child);
            }
            Value::Object(cleaned)
        }
        other => other,
    }
}
