use anyhow::anyhow;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use report_flow::{Captioner, ChatMessage, ChatModel, FlowError, MessageRole, Result};
use reqwest::Client;
use rig::client::CompletionClient;
use rig::completion::{Chat, Message};
use rig::providers::openrouter;
use serde_json::{Value, json};
use tracing::info;

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const VISION_MODEL: &str = "openai/gpt-4.1-mini";
const CHAT_MODEL: &str = "openai/gpt-4o-mini";

/// The diagnostic caption is a single short sentence; generation is capped.
const CAPTION_MAX_TOKENS: u32 = 50;

const CAPTION_PROMPT: &str = "You are a radiology assistant. Describe the findings visible in this \
MRI scan in one short diagnostic sentence. Return only the sentence, without commentary.";

const CHAT_PREAMBLE: &str = "You are a medical assistant helping a clinician work through an MRI \
report. Answer precisely, ground every statement in the report under discussion, and flag \
uncertainty explicitly.";

/// Vision captioner backed by the OpenRouter chat-completions API.
pub struct OpenRouterCaptioner {
    api_key: String,
    client: Client,
}

impl OpenRouterCaptioner {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow!("OPENROUTER_API_KEY not set"))?;
        Ok(Self {
            api_key,
            client: Client::new(),
        })
    }
}

#[async_trait]
impl Captioner for OpenRouterCaptioner {
    async fn caption(&self, image_bytes: &[u8]) -> Result<String> {
        let base64_image = STANDARD.encode(image_bytes);
        let content = vec![
            json!({
                "type": "text",
                "text": CAPTION_PROMPT
            }),
            json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:image/png;base64,{}", base64_image)
                }
            }),
        ];

        let caption = call_openrouter_api(
            &self.client,
            &self.api_key,
            VISION_MODEL,
            content,
            CAPTION_MAX_TOKENS,
        )
        .await
        .map_err(|e| FlowError::CaptionFailure(e.to_string()))?;

        info!("Vision model returned caption ({} characters)", caption.len());
        Ok(caption.trim().to_string())
    }
}

async fn call_openrouter_api(
    client: &Client,
    api_key: &str,
    model: &str,
    content: Vec<Value>,
    max_tokens: u32,
) -> anyhow::Result<String> {
    let payload = json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": content
            }
        ],
        "max_tokens": max_tokens
    });

    let response = client
        .post(OPENROUTER_URL)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&payload)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(anyhow!("LLM API request failed: {}", response.status()));
    }

    let response_json: Value = response.json().await?;
    let content = response_json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| anyhow!("Invalid response format from LLM"))?;

    Ok(content.to_string())
}

/// Conversational model backed by a rig OpenRouter agent. The accumulated
/// session history is passed explicitly on every call.
pub struct OpenRouterChatModel {
    api_key: String,
}

impl OpenRouterChatModel {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow!("OPENROUTER_API_KEY not set"))?;
        Ok(Self { api_key })
    }
}

fn to_rig_message(msg: &ChatMessage) -> Message {
    match msg.role {
        MessageRole::User => Message::user(msg.content.clone()),
        MessageRole::Assistant => Message::assistant(msg.content.clone()),
        // rig has no system message type in chat history
        MessageRole::System => Message::user(format!("[SYSTEM] {}", msg.content)),
    }
}

#[async_trait]
impl ChatModel for OpenRouterChatModel {
    async fn reply(&self, history: &[ChatMessage], message: &str) -> Result<String> {
        let chat_history: Vec<Message> = history.iter().map(to_rig_message).collect();

        let client = openrouter::Client::new(&self.api_key);
        let agent = client.agent(CHAT_MODEL).preamble(CHAT_PREAMBLE).build();

        let response = agent
            .chat(message, chat_history)
            .await
            .map_err(|e| FlowError::ChatCallFailure(e.to_string()))?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_conversion_covers_all_roles() {
        let messages = [
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
            ChatMessage::system("be brief"),
        ];

        for message in &messages {
            // Conversion must not panic for any role.
            let _ = to_rig_message(message);
        }
    }

    /// Live captioning test.
    /// Usage: OPENROUTER_API_KEY=key cargo test caption_live -- --ignored
    #[tokio::test]
    #[ignore]
    async fn caption_live() -> anyhow::Result<()> {
        if std::env::var("OPENROUTER_API_KEY").is_err() {
            println!("Skipping test - set OPENROUTER_API_KEY environment variable");
            return Ok(());
        }

        let captioner = OpenRouterCaptioner::from_env()?;
        let image = image::DynamicImage::new_rgb8(64, 64);
        let mut buffer = Vec::new();
        image.write_to(
            &mut std::io::Cursor::new(&mut buffer),
            image::ImageFormat::Png,
        )?;

        match captioner.caption(&buffer).await {
            Ok(caption) => {
                println!("Caption: {}", caption);
                assert!(!caption.trim().is_empty());
            }
            Err(e) => {
                // Expected with a blank test image on some models.
                println!("Captioning blank image failed: {}", e);
            }
        }
        Ok(())
    }
}
