//! Blueprint generation through a remote chat completion service.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::blueprint::{Blueprint, FallbackCause};
use crate::config::{ChatSettings, non_empty};
use crate::constants::{APP_REFERER, APP_TITLE, CHAT_TEMPERATURE};
use crate::janitor::janitor;

/// Instructions sent with every scene.
pub const SYSTEM_PROMPT: &str = r#"You are 'The Architect', an expert manga layout strategist.
Your goal is to analyze a story segment and determine the best page layout and panel visual descriptions.

You must output a strictly valid JSON object. Do not include markdown formatting like ```json ... ```.

Analyze the provided text and choose ONE of the following layouts:
1. "splash": Use for major reveals, climactic moments, or establishing shots. (1 panel)
2. "grid": Use for fast-paced action, fight scenes, or conversations. (4 panels)
3. "cinematic": Use for tense dialogue, wide shots, or dramatic pacing. (3 panels)

Output structure:
{
  "layout": "splash" | "grid" | "cinematic",
  "reasoning": "Brief explanation of why this layout fits the tone.",
  "panels": [
    {
      "id": 1,
      "description": "Visual description of the panel. Focus on composition, subject, action, and lighting. Do not include text bubbles."
    },
    ...
  ]
}

Ensure the number of panels matches the layout:
- splash: 1 panel
- grid: 4 panels
- cinematic: 3 panels
"#;

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatRequestMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize, Debug)]
struct ChatRequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize, Debug)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Turns scene text into a [`Blueprint`].
#[derive(Clone, Debug)]
pub struct Architect {
    client: reqwest::Client,
    settings: ChatSettings,
}

impl Architect {
    /// New architect talking to the service in `settings`.
    pub fn new(client: reqwest::Client, settings: ChatSettings) -> Self {
        Self { client, settings }
    }

    /// Uses `api_key` instead of the configured credential when it's given
    /// and not blank.
    pub fn with_api_key(mut self, api_key: Option<&str>) -> Self {
        if let Some(key) = non_empty(api_key) {
            self.settings.api_key = Some(key);
        }
        self
    }

    /// Asks the model for a blueprint of `scene_text`.
    ///
    /// Never fails: transport problems and unparseable replies both resolve
    /// to [`Blueprint::fallback`].
    pub async fn get_blueprint(&self, scene_text: &str) -> Blueprint {
        let content = match self.request_content(scene_text).await {
            Ok(content) => content,
            Err(err) => {
                warn!("Architect API error: {err:#}");
                return Blueprint::fallback(FallbackCause::Transport);
            }
        };
        debug!("Architect replied: {content}");

        match janitor(&content).as_ref().and_then(Blueprint::from_value) {
            Some(blueprint) => {
                info!(
                    "Architect chose {} with {} panels",
                    blueprint.layout,
                    blueprint.panels.len()
                );
                blueprint
            }
            None => {
                warn!("Could not parse architect output, using the fallback grid layout");
                Blueprint::fallback(FallbackCause::Parse)
            }
        }
    }

    async fn request_content(&self, scene_text: &str) -> Result<String> {
        let user_message = format!("Analyze this scene:\n\n{scene_text}");
        let body = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatRequestMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatRequestMessage {
                    role: "user",
                    content: &user_message,
                },
            ],
            temperature: CHAT_TEMPERATURE,
        };

        let mut request = self
            .client
            .post(self.settings.endpoint.clone())
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&body);
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .context("Request to the chat completion endpoint failed")?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .context("Failed reading the chat completion body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "Chat completion error {status}: {}",
                String::from_utf8_lossy(&bytes)
            ));
        }

        let parsed: ChatCompletionResponse = serde_json::from_slice(&bytes)
            .context("Failed to parse the chat completion JSON")?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("Chat completion reply has no message content"))
    }
}
