//! ElevenLabs synthesis client.
//!
//! `POST {base}/v1/text-to-speech/{voice_id}?optimize_streaming_latency=N`
//! with the `xi-api-key` header; the response body is MP3.

use async_trait::async_trait;

use crate::config::TtsConfig;
use crate::tts::{SpeechSynthesizer, TtsError};

pub struct ElevenLabsSynthesizer {
    client: reqwest::Client,
    config: TtsConfig,
}

impl ElevenLabsSynthesizer {
    pub fn from_config(config: &TtsConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            config: config.clone(),
        }
    }

    fn url(&self, voice_id: &str) -> String {
        format!(
            "{}/v1/text-to-speech/{}?optimize_streaming_latency={}",
            self.config.base_url.trim_end_matches('/'),
            voice_id,
            self.config.optimize_streaming_latency
        )
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<Vec<u8>, TtsError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| TtsError::Config("no ElevenLabs API key".into()))?;

        let body = serde_json::json!({
            "text":     text,
            "model_id": self.config.model_id,
        });

        let response = self
            .client
            .post(self.url(voice_id))
            .header("xi-api-key", key)
            .header("Accept", "audio/mpeg")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TtsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(TtsError::EmptyAudio);
        }
        Ok(bytes.to_vec())
    }
}
