//! Completion collaborator abstraction
//!
//! Wraps the async-openai crate behind the [`ModelProvider`] trait so the
//! orchestration core sees exactly one external capability: `complete`.
//! Transport failures, rate limiting, and malformed payloads are mapped onto
//! the crate's error taxonomy here, at the boundary.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolArgs,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::config::ModelSettings;
use crate::error::{ChatError, Result};
use crate::items::{Message, ModelResponse, Role, ToolCall};
use crate::tool::Tool;
use crate::usage::Usage;

/// Trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a completion for the given history.
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<Arc<dyn Tool>>,
        settings: &ModelSettings,
    ) -> Result<(ModelResponse, Usage)>;
}

/// OpenAI model provider using async-openai
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
}

impl OpenAIProvider {
    /// Create a provider from the ambient `OPENAI_API_KEY` configuration.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Create a provider with a custom client.
    pub fn with_client(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }

    /// Convert our Message to OpenAI's format
    fn convert_message(msg: &Message) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()
                .expect("system message")
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .name(msg.sender.clone())
                .build()
                .expect("user message")
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                builder.content(msg.content.clone()).name(msg.sender.clone());

                if !msg.tool_calls.is_empty() {
                    let openai_tool_calls: Vec<_> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| async_openai::types::ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: async_openai::types::FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(openai_tool_calls);
                }

                builder.build().expect("assistant message").into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()
                .expect("tool message")
                .into(),
        }
    }

    /// Convert tools to OpenAI function specs
    fn convert_tools(tools: &[Arc<dyn Tool>]) -> Vec<ChatCompletionTool> {
        tools
            .iter()
            .map(|tool| {
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(
                        FunctionObjectArgs::default()
                            .name(tool.name())
                            .description(tool.description())
                            .parameters(tool.parameters_schema())
                            .build()
                            .expect("function object"),
                    )
                    .build()
                    .expect("chat tool")
            })
            .collect()
    }

    fn map_error(err: OpenAIError) -> ChatError {
        match err {
            OpenAIError::Reqwest(e) => ChatError::Unreachable {
                message: e.to_string(),
            },
            OpenAIError::StreamError(e) => ChatError::Unreachable { message: e },
            OpenAIError::ApiError(e) => {
                let kind = e.r#type.clone().unwrap_or_default();
                if kind.contains("rate_limit") || e.message.to_lowercase().contains("rate limit") {
                    ChatError::RateLimited { message: e.message }
                } else {
                    ChatError::Unreachable { message: e.message }
                }
            }
            OpenAIError::JSONDeserialize(e) => ChatError::InvalidResponse {
                message: e.to_string(),
            },
            other => ChatError::InvalidResponse {
                message: other.to_string(),
            },
        }
    }

    async fn complete_once(
        &self,
        messages: &[Message],
        tools: &[Arc<dyn Tool>],
        settings: &ModelSettings,
    ) -> Result<(ModelResponse, Usage)> {
        let openai_messages: Vec<ChatCompletionRequestMessage> =
            messages.iter().map(Self::convert_message).collect();

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(&settings.model).messages(openai_messages);

        if !tools.is_empty() {
            request.tools(Self::convert_tools(tools));
        }
        if let Some(temp) = settings.temperature {
            request.temperature(temp);
        }
        if let Some(max) = settings.max_tokens {
            #[allow(deprecated)]
            request.max_tokens(max);
        }

        let request = request.build().map_err(Self::map_error)?;

        let response = tokio::time::timeout(settings.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| ChatError::Unreachable {
                message: format!("request timed out after {:?}", settings.timeout),
            })?
            .map_err(Self::map_error)?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| ChatError::InvalidResponse {
                message: "no choices in response".to_string(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tc| ToolCall {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                arguments: serde_json::from_str(&tc.function.arguments).unwrap_or(Value::Null),
            })
            .collect();

        let model_response = ModelResponse {
            id: response.id.clone(),
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            created_at: chrono::Utc::now(),
        };

        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens as usize, u.completion_tokens as usize))
            .unwrap_or_else(Usage::empty);

        Ok((model_response, usage))
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        tools: Vec<Arc<dyn Tool>>,
        settings: &ModelSettings,
    ) -> Result<(ModelResponse, Usage)> {
        let mut attempt = 0;
        loop {
            match self.complete_once(&messages, &tools, settings).await {
                Ok(out) => return Ok(out),
                Err(e)
                    if attempt < settings.max_retries
                        && matches!(
                            e,
                            ChatError::Unreachable { .. } | ChatError::RateLimited { .. }
                        ) =>
                {
                    attempt += 1;
                    let delay = std::time::Duration::from_millis(100 << attempt.min(6));
                    warn!(attempt, error = %e, "retrying provider call after {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// One entry in a [`ScriptedProvider`] script.
enum ScriptedStep {
    Respond(ModelResponse),
    Fail(ChatError),
}

/// Scripted model provider for tests and offline runs.
///
/// Pops the next scripted step on every call; an exhausted script yields a
/// fixed default message so bounded loops still converge.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<ScriptedStep>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
        }
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedStep::Respond(response));
        self
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.with_response(ModelResponse::new_message(content))
    }

    pub fn with_tool_call(self, tool_name: impl Into<String>, args: Value) -> Self {
        let tool_call = ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            name: tool_name.into(),
            arguments: args,
        };
        self.with_response(ModelResponse::new_tool_calls(vec![tool_call]))
    }

    pub fn with_failure(self, error: ChatError) -> Self {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedStep::Fail(error));
        self
    }
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: Vec<Message>,
        _tools: Vec<Arc<dyn Tool>>,
        _settings: &ModelSettings,
    ) -> Result<(ModelResponse, Usage)> {
        debug!(history_len = messages.len(), "scripted provider call");
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(ScriptedStep::Respond(response)) => Ok((response, Usage::new(10, 5))),
            Some(ScriptedStep::Fail(error)) => Err(error),
            None => Ok((
                ModelResponse::new_message("Default response"),
                Usage::new(10, 5),
            )),
        }
    }
}
