//! Generation engine seam
//!
//! The language model is a black box that can be asked to generate and
//! asked to stop. Preload and heartbeat drive it through
//! [`GenerationEngine`]; [`LlamaCompletionEngine`] talks to a llama.cpp
//! compatible `POST /completion` endpoint.

use crate::config::BackendConfig;
use crate::error::{SlotkeeperError, SlotkeeperResult};
use crate::pool::{GenerationKind, ParticipantId};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub participant: Option<ParticipantId>,
    /// Slot to pin the request to; `None` lets the server choose
    pub slot: Option<usize>,
    pub prompt: String,
    pub max_tokens: u32,
    pub kind: GenerationKind,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationOutput {
    pub text: String,
    pub prompt_tokens: Option<u64>,
    pub cached_tokens: Option<u64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationEngine: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> SlotkeeperResult<GenerationOutput>;

    /// Abort whatever generation is in flight
    async fn stop(&self) -> SlotkeeperResult<()>;
}

pub struct LlamaCompletionEngine {
    client: Client,
    base_url: String,
    inflight: Mutex<CancellationToken>,
}

impl LlamaCompletionEngine {
    pub fn new(config: &BackendConfig) -> SlotkeeperResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeouts.connect))
            .build()
            .map_err(|e| SlotkeeperError::backend(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, &config.slots_url))
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            inflight: Mutex::new(CancellationToken::new()),
        }
    }

    fn current_token(&self) -> CancellationToken {
        let mut token = self.inflight.lock();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    async fn send(&self, request: &GenerationRequest) -> SlotkeeperResult<GenerationOutput> {
        let body = json!({
            "prompt": request.prompt,
            "n_predict": request.max_tokens,
            "cache_prompt": true,
            "id_slot": request.slot.map(|s| s as i64).unwrap_or(-1),
        });

        let response = self
            .client
            .post(format!("{}/completion", self.base_url))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SlotkeeperError::backend_status(
                format!("Generation failed: {}", text.trim()),
                status.as_u16(),
            ));
        }

        let value: Value = response.json().await?;
        Ok(GenerationOutput {
            text: value
                .get("content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            prompt_tokens: value.get("tokens_evaluated").and_then(Value::as_u64),
            cached_tokens: value.get("tokens_cached").and_then(Value::as_u64),
        })
    }
}

#[async_trait]
impl GenerationEngine for LlamaCompletionEngine {
    #[instrument(skip(self, request), fields(slot = ?request.slot, kind = ?request.kind), level = "debug")]
    async fn generate(&self, request: GenerationRequest) -> SlotkeeperResult<GenerationOutput> {
        let token = self.current_token();
        tokio::select! {
            _ = token.cancelled() => {
                debug!("generation aborted");
                Err(SlotkeeperError::Cancelled)
            }
            result = self.send(&request) => result,
        }
    }

    async fn stop(&self) -> SlotkeeperResult<()> {
        self.inflight.lock().cancel();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn engine(uri: &str) -> LlamaCompletionEngine {
        let client = Client::builder().no_proxy().build().expect("client");
        LlamaCompletionEngine::with_client(client, uri)
    }

    fn request(slot: Option<usize>) -> GenerationRequest {
        GenerationRequest {
            participant: Some(ParticipantId::new("A")),
            slot,
            prompt: "A:".to_string(),
            max_tokens: 1,
            kind: GenerationKind::Quiet,
        }
    }

    #[tokio::test]
    async fn test_generate_pins_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .and(body_partial_json(json!({"id_slot": 2, "n_predict": 1, "cache_prompt": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "Hi",
                "tokens_evaluated": 812,
                "tokens_cached": 800
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = engine(&server.uri()).generate(request(Some(2))).await.unwrap();
        assert_eq!(output.text, "Hi");
        assert_eq!(output.prompt_tokens, Some(812));
        assert_eq!(output.cached_tokens, Some(800));
    }

    #[tokio::test]
    async fn test_unpinned_request_uses_any_slot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .and(body_partial_json(json!({"id_slot": -1})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": ""})))
            .expect(1)
            .mount(&server)
            .await;

        engine(&server.uri()).generate(request(None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_aborts_inflight_generation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/completion"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"content": "late"}))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let engine = Arc::new(engine(&server.uri()));
        let running = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.generate(request(Some(0))).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.stop().await.unwrap();

        let result = running.await.unwrap();
        assert!(matches!(result, Err(SlotkeeperError::Cancelled)));
    }
}
