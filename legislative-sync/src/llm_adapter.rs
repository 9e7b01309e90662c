use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use interfaces::services::{GeneratedImage, ImageGenerator, TextModel, VisionModel};
use interfaces::{ServiceError, ServiceResult};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::fetcher::{status_error, transport_error};
use crate::types::{Result, SyncError};
use crate::utils::chunk_text;

/// Instructions handed to the language model at each enrichment step.
pub mod prompts {
    pub const PROPOSITION_SUMMARY: &str = "Você é um jornalista que explica projetos de lei para o público geral. \
        Resuma o texto da proposição em linguagem simples, em até três parágrafos, \
        destacando o que muda na vida das pessoas.";

    pub const PROPOSITION_TITLE: &str = "Crie um título jornalístico curto, objetivo e sem aspas \
        para a proposição legislativa resumida a seguir.";

    pub const ILLUSTRATION: &str = "Ilustração editorial, estilo flat, cores sóbrias, sem texto, \
        representando o tema do seguinte resumo de proposição legislativa: ";

    pub const IMAGE_DESCRIPTION: &str = "Descreva esta imagem em uma frase, para uso como texto alternativo.";

    pub const EVENT_DESCRIPTION: &str = "Você é um jornalista que cobre a Câmara dos Deputados. \
        Escreva uma descrição clara do evento a seguir e dos itens da sua pauta, em até dois parágrafos.";

    pub const EVENT_TITLE: &str = "Crie um título jornalístico curto e sem aspas para o evento legislativo descrito a seguir.";

    pub const NEWSLETTER_DESCRIPTION: &str = "Você edita um boletim diário sobre a atividade legislativa. \
        Escreva um resumo curto do dia a partir das matérias a seguir.";

    pub const NEWSLETTER_TITLE: &str = "Crie um título curto e sem aspas para o boletim diário resumido a seguir.";

    pub const RUNNING_CONTEXT: &str = "Resumo do trecho anterior do mesmo documento:";
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageResponseRaw {
    data: Vec<ImageData>,
}

/// OpenAI-compatible client for text, vision and image generation.
#[derive(Clone)]
pub struct OpenAiAdapter {
    http_client: Client,
    config: LlmConfig,
}

impl OpenAiAdapter {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self {
            http_client,
            config,
        })
    }

    async fn post(&self, path: &str, body: &Value) -> ServiceResult<reqwest::Response> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.config.base_url.trim_end_matches('/'), path))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "OpenAI request failed");
                transport_error(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, error = %error_text, "OpenAI API error");
            return Err(status_error(status, path));
        }
        Ok(response)
    }

    async fn chat(&self, model: &str, messages: Value, purpose: &str) -> ServiceResult<String> {
        let start = Instant::now();
        let response = self
            .post("chat/completions", &json!({ "model": model, "messages": messages }))
            .await?;

        let raw: ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ServiceError::Transient(format!("empty completion for {}", purpose)))?;

        debug!(
            model = %model,
            purpose = %purpose,
            duration_ms = start.elapsed().as_millis() as u64,
            "OpenAI chat completion"
        );
        Ok(content)
    }
}

#[async_trait]
impl TextModel for OpenAiAdapter {
    async fn complete(&self, prompt: &str, text: &str, purpose: &str) -> ServiceResult<String> {
        let messages = json!([
            { "role": "system", "content": prompt },
            { "role": "user", "content": text },
        ]);
        self.chat(&self.config.text_model, messages, purpose).await
    }
}

#[async_trait]
impl VisionModel for OpenAiAdapter {
    async fn describe_image(&self, image_url: &str) -> ServiceResult<String> {
        let messages = json!([{
            "role": "user",
            "content": [
                { "type": "text", "text": prompts::IMAGE_DESCRIPTION },
                { "type": "image_url", "image_url": { "url": image_url } },
            ],
        }]);
        self.chat(&self.config.vision_model, messages, "image description").await
    }
}

#[async_trait]
impl ImageGenerator for OpenAiAdapter {
    async fn generate_image(&self, prompt: &str) -> ServiceResult<GeneratedImage> {
        let body = json!({
            "model": self.config.image_model,
            "prompt": prompt,
            "n": 1,
            "size": "1024x1024",
        });
        let raw: ImageResponseRaw = self
            .post("images/generations", &body)
            .await?
            .json()
            .await
            .map_err(|e| ServiceError::Malformed(e.to_string()))?;

        let source_url = raw
            .data
            .into_iter()
            .find_map(|d| d.url)
            .ok_or_else(|| ServiceError::Transient("image generation returned no image".into()))?;

        let response = self
            .http_client
            .get(&source_url)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(status_error(response.status(), &source_url));
        }
        let bytes = response.bytes().await.map_err(transport_error)?.to_vec();
        debug!("Downloaded generated image ({} bytes)", bytes.len());

        Ok(GeneratedImage { source_url, bytes })
    }
}

/// Summarizes text of any length: input over the character limit is split
/// into chunks, each summarized with the previous chunk's summary as context.
#[derive(Clone)]
pub struct Summarizer {
    model: Arc<dyn TextModel>,
    char_limit: usize,
    call_delay: Duration,
}

impl Summarizer {
    pub fn new(model: Arc<dyn TextModel>, char_limit: usize, call_delay: Duration) -> Self {
        Self {
            model,
            char_limit,
            call_delay,
        }
    }

    pub fn from_config(model: Arc<dyn TextModel>, config: &LlmConfig) -> Self {
        Self::new(model, config.char_limit, config.call_delay())
    }

    pub async fn summarize(&self, prompt: &str, text: &str, purpose: &str) -> ServiceResult<String> {
        let chunks = chunk_text(text, self.char_limit);
        if chunks.is_empty() {
            return Err(ServiceError::Malformed(format!("nothing to send for {}", purpose)));
        }
        if chunks.len() > 1 {
            debug!("Splitting {} input into {} chunks", purpose, chunks.len());
        }

        let mut running = String::new();
        for chunk in &chunks {
            let input = if running.is_empty() {
                chunk.clone()
            } else {
                format!("{}\n{}\n\n{}", prompts::RUNNING_CONTEXT, running, chunk)
            };
            running = self.model.complete(prompt, &input, purpose).await?;
            if !self.call_delay.is_zero() {
                tokio::time::sleep(self.call_delay).await;
            }
        }
        Ok(running)
    }
}
