use crate::error::ModelError;
use crate::ollama::OllamaClient;
use crate::traits::LanguageModel;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LLM_MODEL: &str = "llama3.2";

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Non-streaming text generation through `/api/generate`.
pub struct OllamaLlm {
    client: OllamaClient,
    model: String,
}

impl OllamaLlm {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaLlm {
    async fn invoke(&self, prompt: &str) -> Result<String, ModelError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };
        let response: GenerateResponse = self
            .client
            .post_json("api/generate", &self.model, &request)
            .await?;
        response_text(&self.model, response)
    }
}

fn response_text(model: &str, response: GenerateResponse) -> Result<String, ModelError> {
    if let Some(error) = response.error {
        return Err(ModelError::BadResponse {
            model: model.to_string(),
            details: error,
        });
    }

    response.response.ok_or_else(|| ModelError::BadResponse {
        model: model.to_string(),
        details: "response field missing".to_string(),
    })
}
