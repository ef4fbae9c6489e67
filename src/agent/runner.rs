//! OpenAI tool-calling agent.
//!
//! Runs a chat-completions loop where the model may call any tool the MCP
//! session advertised. Tool results are fed back until the model answers
//! without calling a tool.

use super::framework::{AgentError, AgentFramework, ExecutionResult, ToolCallRecord};
use super::profile::AgentProfile;
use crate::config::AgentSettings;
use crate::mcp::{ToolDescriptor, ToolSession};
use crate::openai::create_client_with_timeout;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObject,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info};

/// Agent framework backed by the OpenAI chat completions API.
pub struct OpenAiAgent {
    model: String,
    max_iterations: usize,
}

impl OpenAiAgent {
    /// Create a new agent for the given model.
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            max_iterations: 15,
        }
    }

    pub fn from_settings(settings: &AgentSettings) -> Self {
        Self::new(&settings.model).with_max_iterations(settings.max_iterations)
    }

    /// Set maximum iterations for the agent loop.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(
        &self,
        session: &dyn ToolSession,
        tool_call: &ChatCompletionMessageToolCall,
    ) -> Result<ToolCallRecord, AgentError> {
        let name = &tool_call.function.name;
        let arguments = &tool_call.function.arguments;

        info!("Agent calling tool: {} with args: {}", name, arguments);

        // Bad arguments are the model's mistake; let it see the error and retry.
        let result = match serde_json::from_str::<serde_json::Value>(arguments) {
            Ok(args) => {
                let output = session
                    .invoke(name, args)
                    .await
                    .map_err(|e| AgentError::ToolInvocation {
                        tool: name.clone(),
                        message: e.to_string(),
                    })?;
                if output.is_error {
                    format!("Tool error: {}", output.text)
                } else {
                    output.text
                }
            }
            Err(e) => format!("Failed to parse tool arguments: {}", e),
        };

        Ok(ToolCallRecord {
            name: name.clone(),
            arguments: arguments.clone(),
            result,
        })
    }
}

#[async_trait]
impl AgentFramework for OpenAiAgent {
    async fn execute(
        &self,
        profile: &AgentProfile,
        task_description: &str,
        session: &dyn ToolSession,
        timeout: Duration,
    ) -> Result<ExecutionResult, AgentError> {
        let client =
            create_client_with_timeout(timeout).map_err(|e| AgentError::Framework(e.to_string()))?;
        let tools = tool_definitions(session.tools());

        let mut messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(profile.system_prompt())
                .build()
                .map_err(|e| AgentError::MalformedTask(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(task_description.to_string())
                .build()
                .map_err(|e| AgentError::MalformedTask(e.to_string()))?
                .into(),
        ];

        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(AgentError::Framework(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}", iterations);

            let mut builder = CreateChatCompletionRequestArgs::default();
            builder.model(&self.model).messages(messages.clone());
            if !tools.is_empty() {
                builder.tools(tools.clone());
            }
            let request = builder
                .build()
                .map_err(|e| AgentError::MalformedTask(e.to_string()))?;

            let response = client
                .chat()
                .create(request)
                .await
                .map_err(|e| AgentError::Framework(format!("Agent API error: {}", e)))?;

            let choice = response
                .choices
                .first()
                .ok_or_else(|| AgentError::Framework("No response from model".to_string()))?;

            match choice.message.tool_calls.as_ref() {
                Some(tool_calls) if !tool_calls.is_empty() => {
                    let assistant_msg = ChatCompletionRequestAssistantMessageArgs::default()
                        .tool_calls(tool_calls.clone())
                        .build()
                        .map_err(|e| AgentError::Framework(e.to_string()))?;
                    messages.push(assistant_msg.into());

                    for tool_call in tool_calls {
                        let record = self.execute_tool_call(session, tool_call).await?;

                        let tool_msg = ChatCompletionRequestToolMessageArgs::default()
                            .tool_call_id(&tool_call.id)
                            .content(record.result.clone())
                            .build()
                            .map_err(|e| AgentError::Framework(e.to_string()))?;
                        messages.push(tool_msg.into());

                        tool_calls_made.push(record);
                    }
                }
                _ => {
                    return Ok(ExecutionResult {
                        output: choice.message.content.clone().unwrap_or_default(),
                        tool_calls: tool_calls_made,
                        iterations,
                    });
                }
            }
        }
    }
}

/// Convert MCP tool descriptors into OpenAI function tools.
pub fn tool_definitions(tools: &[ToolDescriptor]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: Some(tool.input_schema.clone()),
                strict: None,
            },
        })
        .collect()
}
