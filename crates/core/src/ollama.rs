//! Thin HTTP client for a local Ollama server.

use crate::error::ModelError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base: Url,
    client: Arc<Client>,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Result<Self, ModelError> {
        let mut base = Url::parse(base_url.trim())?;
        // `Url::join` replaces the last path segment unless the base ends in '/'.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self {
            base,
            client: Arc::new(Client::new()),
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, ModelError> {
        Ok(self.base.join(path)?)
    }

    pub(crate) async fn post_json<B, R>(&self, path: &str, model: &str, body: &B) -> Result<R, ModelError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self.client.post(url).json(body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::BadResponse {
                model: model.to_string(),
                details: format!("{status}: {}", body.trim()),
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::OllamaClient;

    #[test]
    fn endpoints_are_joined_under_base_path() {
        let client = OllamaClient::new("http://localhost:11434").unwrap();
        assert_eq!(
            client.endpoint("api/generate").unwrap().as_str(),
            "http://localhost:11434/api/generate"
        );

        let proxied = OllamaClient::new("http://gpu-box:8080/ollama").unwrap();
        assert_eq!(
            proxied.endpoint("api/embed").unwrap().as_str(),
            "http://gpu-box:8080/ollama/api/embed"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(OllamaClient::new("not a url").is_err());
    }
}
