use std::sync::Arc;

use crate::client::{ChatMessage, ChatOptions, InferenceClient};
use crate::error::GatewayError;

/// Options for [`CustomerEngagementService::chat_with_customer`].
#[derive(Debug, Clone)]
pub struct ChatTurnOptions {
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for ChatTurnOptions {
    fn default() -> Self {
        Self {
            model: None,
            system_prompt: None,
            temperature: 0.2,
            max_tokens: 512,
        }
    }
}

/// Single-turn customer chat over `chat/completions`.
pub struct CustomerEngagementService {
    client: Arc<InferenceClient>,
    default_model: Option<String>,
}

impl CustomerEngagementService {
    #[must_use]
    pub fn new(client: Arc<InferenceClient>) -> Self {
        Self {
            client,
            default_model: None,
        }
    }

    #[must_use]
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Send one user prompt (with an optional system instruction) and return
    /// the assistant text.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::UnexpectedResponse`] when the response carries no
    /// assistant text, plus any invocation error.
    pub async fn chat_with_customer(
        &self,
        prompt: &str,
        options: &ChatTurnOptions,
    ) -> Result<String, GatewayError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system_prompt) = options.system_prompt.as_deref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(prompt));

        let chat_options = ChatOptions {
            model: options.model.clone().or_else(|| self.default_model.clone()),
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..ChatOptions::default()
        };
        self.client.chat_messages(messages, &chat_options).await
    }
}
