use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use super::provider::LlmProvider;
use super::types::ChatRequest;

/// Client for any endpoint speaking the OpenAI REST dialect
/// (`/v1/chat/completions`, `/v1/embeddings`, `/v1/models`).
#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            client,
        })
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        let res = self.authorized(self.client.get(&url)).send().await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
            if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        }

        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ApiError::generation)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Generation(format!(
                "chat completion failed with {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::generation)?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                ApiError::Generation("chat completion response had no message content".to_string())
            })?
            .to_string();

        Ok(content)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ApiError::embedding)?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::EmbeddingService(format!(
                "embedding request failed with {}: {}",
                status, text
            )));
        }

        let payload: Value = res.json().await.map_err(ApiError::embedding)?;
        parse_embeddings(&payload)
    }
}

/// Reads `data[*].embedding`, honouring `data[*].index` when present.
fn parse_embeddings(payload: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    let data = payload["data"].as_array().ok_or_else(|| {
        ApiError::EmbeddingService("embedding response had no data array".to_string())
    })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        let values = item["embedding"].as_array().ok_or_else(|| {
            ApiError::EmbeddingService(format!("embedding {} is not an array", position))
        })?;

        let mut vector = Vec::with_capacity(values.len());
        for value in values {
            let number = value.as_f64().ok_or_else(|| {
                ApiError::EmbeddingService(format!("embedding {} has a non-numeric value", position))
            })?;
            vector.push(number as f32);
        }
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    if let Some((position, (index, _))) = indexed
        .iter()
        .enumerate()
        .find(|(position, (index, _))| index != position)
    {
        return Err(ApiError::EmbeddingService(format!(
            "embedding indices must be 0..{} but position {} holds index {}",
            indexed.len(),
            position,
            index
        )));
    }
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

#[cfg(test)]
mod parse_tests {
    use super::*;

    #[test]
    fn parse_embeddings_orders_by_index() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });

        let vectors = parse_embeddings(&payload).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn parse_embeddings_rejects_non_numeric_values() {
        let payload = json!({ "data": [ { "embedding": [0.5, "x"] } ] });
        let err = parse_embeddings(&payload).unwrap_err();
        assert_eq!(err.kind(), "embedding_service_error");
    }

    #[test]
    fn parse_embeddings_rejects_duplicate_or_missing_indices() {
        for indices in [[0, 0], [0, 2], [1, 2]] {
            let payload = json!({
                "data": [
                    { "index": indices[0], "embedding": [1.0] },
                    { "index": indices[1], "embedding": [2.0] }
                ]
            });
            let err = parse_embeddings(&payload).unwrap_err();
            assert_eq!(err.kind(), "embedding_service_error", "{:?}", indices);
        }
    }

    #[test]
    fn parse_embeddings_requires_data() {
        let err = parse_embeddings(&json!({ "error": "quota" })).unwrap_err();
        assert!(err.to_string().contains("no data array"));
    }
}
