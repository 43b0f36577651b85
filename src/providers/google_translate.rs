/*!
 * Google Translate client.
 *
 * Without an API key the public `translate_a/single` endpoint is used, which
 * returns a nested array of segment translations. With a key the request goes
 * to the Cloud Translation v2 API.
 */

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::{error_from_response, MachineTranslator};

const PUBLIC_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";
const CLOUD_ENDPOINT: &str = "https://translation.googleapis.com/language/translate/v2";

/// Google Translate NMT backend
#[derive(Clone)]
pub struct GoogleTranslate {
    /// HTTP client for API requests
    client: reqwest::Client,
    /// Optional Cloud Translation API key
    api_key: Option<String>,
    /// Endpoint override (tests, proxies)
    endpoint: Option<String>,
}

impl std::fmt::Debug for GoogleTranslate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslate")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Default for GoogleTranslate {
    fn default() -> Self {
        Self::new(None)
    }
}

impl GoogleTranslate {
    /// Create a client; `api_key` selects the Cloud Translation API
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            endpoint: None,
        }
    }

    /// Point the client at another base URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = (!endpoint.is_empty()).then_some(endpoint);
        self
    }

    async fn translate_public(&self, text: &str, source: &str, target: &str) -> Result<String, ProviderError> {
        let base = self.endpoint.as_deref().unwrap_or(PUBLIC_ENDPOINT);
        let url = url::Url::parse_with_params(
            base,
            &[
                ("client", "gtx"),
                ("sl", source),
                ("tl", target),
                ("dt", "t"),
                ("q", text),
            ],
        )
        .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint URL: {}", e)))?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response("Google Translate", response).await);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        parse_public_response(&json)
    }

    async fn translate_cloud(
        &self,
        api_key: &str,
        text: &str,
        source: &str,
        target: &str,
    ) -> Result<String, ProviderError> {
        let base = self.endpoint.as_deref().unwrap_or(CLOUD_ENDPOINT);
        let url = url::Url::parse_with_params(base, &[("key", api_key)])
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint URL: {}", e)))?;

        let body = json!({
            "q": [text],
            "source": source,
            "target": target,
            "format": "text"
        });

        let response = self.client.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(error_from_response("Google Translate", response).await);
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;
        json["data"]["translations"][0]["translatedText"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| {
                ProviderError::ParseError("Missing 'data.translations[0].translatedText'".to_string())
            })
    }
}

/// Concatenate the translated segments of a `translate_a/single` response
pub fn parse_public_response(json: &Value) -> Result<String, ProviderError> {
    let segments = json
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::ParseError("Missing translation segments".to_string()))?;

    Ok(segments
        .iter()
        .filter_map(|segment| segment.get(0).and_then(Value::as_str))
        .collect())
}

#[async_trait]
impl MachineTranslator for GoogleTranslate {
    async fn translate_unit(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, ProviderError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }
        debug!(
            "Google Translate {} -> {} ({} chars)",
            source_language,
            target_language,
            text.chars().count()
        );
        match &self.api_key {
            Some(key) => self.translate_cloud(key, text, source_language, target_language).await,
            None => self.translate_public(text, source_language, target_language).await,
        }
    }
}
