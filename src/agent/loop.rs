//! Agent turn loop implementation
//!
//! One turn: append the user message, then alternate model requests and
//! tool executions until the model answers without tool calls or the
//! iteration cap is reached.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::bus::{AgentEvent, EventBus};
use crate::config::AgentDefaults;
use crate::context::ContextManager;
use crate::error::{HostError, Result};
use crate::mcp::{result_text, ClientManager};
use crate::providers::{GatewayEvent, LlmGateway};
use crate::session::{Message, Role, ToolCall};
use crate::utils::string::preview;

/// Turn loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentOptions {
    /// Upper bound on model round-trips that request tools.
    pub max_tool_iterations: u32,
    /// Use [`LlmGateway::stream`] and forward deltas as `Chunk` events.
    pub stream: bool,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self::from(&AgentDefaults::default())
    }
}

impl From<&AgentDefaults> for AgentOptions {
    fn from(defaults: &AgentDefaults) -> Self {
        Self {
            max_tool_iterations: defaults.max_tool_iterations,
            stream: defaults.stream,
        }
    }
}

/// Drives one session's conversation.
///
/// Turns are serialised: a second `run_turn` on the same agent waits for
/// the first to finish.
pub struct Agent {
    context: ContextManager,
    clients: Arc<ClientManager>,
    gateway: Arc<dyn LlmGateway>,
    bus: EventBus,
    options: AgentOptions,
    turn_lock: Mutex<()>,
}

impl Agent {
    pub fn new(
        context: ContextManager,
        clients: Arc<ClientManager>,
        gateway: Arc<dyn LlmGateway>,
        bus: EventBus,
        options: AgentOptions,
    ) -> Self {
        Self {
            context,
            clients,
            gateway,
            bus,
            options,
            turn_lock: Mutex::new(()),
        }
    }

    pub fn session_id(&self) -> &str {
        self.context.session_id()
    }

    pub fn context(&self) -> &ContextManager {
        &self.context
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run one user turn and return the final assistant text.
    ///
    /// Tool failures and denials do not end the turn: they are fed back to
    /// the model as tool results. Context, formatting and gateway failures
    /// do, after an `Error` event.
    pub async fn run_turn(&self, user_message: Message) -> Result<String> {
        let _turn = self.turn_lock.lock().await;
        let span = info_span!("turn", session_id = %self.session_id());

        async {
            match self.turn(user_message).await {
                Ok(text) => {
                    self.publish(AgentEvent::Response {
                        session_id: self.session_id().to_string(),
                        text: text.clone(),
                    });
                    Ok(text)
                }
                Err(e) => {
                    warn!(error = %e, "Turn failed");
                    self.publish(AgentEvent::Error {
                        session_id: self.session_id().to_string(),
                        message: e.to_string(),
                    });
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Clear the session history.
    pub async fn reset(&self) -> Result<()> {
        let _turn = self.turn_lock.lock().await;
        self.context.reset().await?;
        info!(session_id = %self.session_id(), "Conversation reset");
        self.publish(AgentEvent::ConversationReset {
            session_id: self.session_id().to_string(),
        });
        Ok(())
    }

    async fn turn(&self, user_message: Message) -> Result<String> {
        if user_message.role != Role::User {
            return Err(HostError::Config(format!(
                "run_turn expects a user message, got {}",
                user_message.role
            )));
        }
        self.context.append(user_message).await?;

        let max_iterations = self.options.max_tool_iterations;
        let mut iteration = 0;

        loop {
            self.publish(AgentEvent::Thinking {
                session_id: self.session_id().to_string(),
            });

            let tools = self.clients.get_all_tools().await;
            let payload = self.context.format_for_provider(&tools).await?;
            let response = if self.options.stream {
                self.stream_response(payload).await?
            } else {
                self.gateway.complete(payload).await?
            };

            let replies = self.context.ingest_response(&response).await?;
            let text = replies
                .iter()
                .rev()
                .find(|m| m.role == Role::Assistant)
                .map(Message::text)
                .unwrap_or_default();
            let calls: Vec<ToolCall> = replies
                .into_iter()
                .flat_map(|m| m.tool_calls)
                .collect();

            if calls.is_empty() {
                return Ok(text);
            }

            if iteration >= max_iterations {
                info!(
                    iterations = iteration,
                    "Tool loop reached maximum iterations, returning partial response"
                );
                // Answer every call so the history stays well-formed.
                for call in &calls {
                    let note = format!(
                        "Error: tool iteration limit ({}) reached; call not executed",
                        max_iterations
                    );
                    self.context
                        .append(Message::tool_error(&call.id, &call.name, &note))
                        .await?;
                }
                return Ok(text);
            }

            iteration += 1;
            debug!("Tool iteration {} of {}", iteration, max_iterations);

            for call in &calls {
                self.execute_call(call).await?;
            }
        }
    }

    /// Execute one tool call and append its result.
    async fn execute_call(&self, call: &ToolCall) -> Result<()> {
        let args = call.parse_arguments();
        self.publish(AgentEvent::ToolCall {
            session_id: self.session_id().to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: args.clone(),
        });

        info!(
            tool = %call.name,
            id = %call.id,
            args = %preview(&call.arguments, 80),
            "Executing tool"
        );
        let tool_start = std::time::Instant::now();
        let (result, is_error) = match self
            .clients
            .execute_tool(&call.name, args, Some(self.session_id()))
            .await
        {
            Ok(value) => {
                let latency_ms = tool_start.elapsed().as_millis() as u64;
                debug!(tool = %call.name, latency_ms, "Tool executed successfully");
                (result_text(&value), false)
            }
            Err(e) => {
                if e.is_denied() {
                    info!(tool = %call.name, "Tool call denied");
                } else {
                    warn!(tool = %call.name, error = %e, "Tool execution failed");
                }
                (format!("Error: {}", e), true)
            }
        };

        let message = if is_error {
            Message::tool_error(&call.id, &call.name, &result)
        } else {
            Message::tool_result(&call.id, &call.name, &result)
        };
        self.context.append(message).await?;
        self.publish(AgentEvent::ToolResult {
            session_id: self.session_id().to_string(),
            call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result,
            is_error,
        });
        Ok(())
    }

    /// Drain a gateway stream, forwarding deltas as `Chunk` events.
    async fn stream_response(&self, payload: Value) -> Result<Value> {
        let mut rx = self.gateway.stream(payload).await?;
        while let Some(event) = rx.recv().await {
            match event {
                GatewayEvent::Delta(text) => self.publish(AgentEvent::Chunk {
                    session_id: self.session_id().to_string(),
                    text,
                }),
                GatewayEvent::Done(response) => return Ok(response),
                GatewayEvent::Error(message) => return Err(HostError::Gateway(message)),
            }
        }
        Err(HostError::Gateway(
            "stream ended without a final response".into(),
        ))
    }

    fn publish(&self, event: AgentEvent) {
        self.bus.publish(event);
    }
}
