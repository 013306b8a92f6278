// Agent service
// ReAct loop over OpenAI function calling: the model either answers or asks
// for tools, whose results are fed back until it answers.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::events::AgentEvent;
use crate::core::config::settings::AgentSettings;
use crate::core::errors::ApiError;
use crate::core::text::truncate_chars;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider, Role, ToolCall};
use crate::tools::{ToolRegistry, ToolSummary};

pub const ITERATION_LIMIT_MESSAGE: &str = "Sorry, need more steps to process this request.";

const STREAM_BUFFER: usize = 32;

#[derive(Debug, Clone, Serialize)]
pub struct AgentInfo {
    pub model: String,
    pub tools_count: usize,
    pub tools: Vec<String>,
    pub system_message: Option<String>,
    pub max_iterations: usize,
}

/// Outcome of one blocking run.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Everything sent to or produced by the model, in order.
    pub messages: Vec<ChatMessage>,
    /// Tools executed during the run, in call order.
    pub tools_used: Vec<String>,
}

impl AgentRun {
    /// Text of the last assistant message.
    pub fn answer(&self) -> &str {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.text().trim().is_empty())
            .map(ChatMessage::text)
            .unwrap_or_default()
    }

    /// The user/assistant exchange without system prompts, tool results or
    /// assistant turns that only requested tools.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .filter(|m| matches!(m.role, Role::User | Role::Assistant))
            .filter(|m| !m.text().trim().is_empty())
            .map(|m| ChatMessage {
                tool_calls: Vec::new(),
                ..m.clone()
            })
            .collect()
    }
}

pub struct AgentService {
    llm: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    settings: AgentSettings,
}

impl AgentService {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: ToolRegistry, settings: AgentSettings) -> Self {
        tracing::info!(
            "Agent ready: model {} with {} tools ({})",
            settings.model_name,
            tools.len(),
            tools.names().join(", ")
        );
        Self {
            llm,
            tools,
            settings,
        }
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn tool_summaries(&self) -> Vec<ToolSummary> {
        self.tools.summaries()
    }

    pub fn info(&self) -> AgentInfo {
        AgentInfo {
            model: self.settings.model_name.clone(),
            tools_count: self.tools.len(),
            tools: self.tools.names(),
            system_message: self.settings.system_message.clone(),
            max_iterations: self.settings.max_iterations,
        }
    }

    /// System message (if configured), prior turns, then the new message.
    /// Tool messages in the history are dropped; they cannot be replayed
    /// without the assistant turn that requested them.
    pub fn build_messages(&self, message: &str, history: &[ChatMessage]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = self
            .settings
            .system_message
            .as_deref()
            .filter(|s| !s.trim().is_empty())
        {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(
            history
                .iter()
                .filter(|m| m.role != Role::Tool)
                .map(|m| ChatMessage {
                    tool_calls: Vec::new(),
                    tool_call_id: None,
                    ..m.clone()
                }),
        );
        messages.push(ChatMessage::user(message));
        messages
    }

    pub async fn invoke(&self, message: &str, history: &[ChatMessage]) -> Result<AgentRun, ApiError> {
        tracing::info!("Invoking agent with message: {}", truncate_chars(message, 100));
        let run = self.run(self.build_messages(message, history), None).await?;
        tracing::info!("Agent invocation complete ({} tool calls)", run.tools_used.len());
        Ok(run)
    }

    /// Runs the agent on a background task. The receiver yields one event per
    /// model turn and tool result and always ends with `End` or `Error`.
    pub fn stream(self: &Arc<Self>, message: String, history: Vec<ChatMessage>) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        let agent = Arc::clone(self);

        tokio::spawn(async move {
            tracing::info!("Streaming agent run for message: {}", truncate_chars(&message, 100));
            let messages = agent.build_messages(&message, &history);
            let terminal = match agent.run(messages, Some(&tx)).await {
                Ok(_) => AgentEvent::End,
                Err(err) => {
                    tracing::error!("Agent stream failed: {}", err);
                    AgentEvent::Error(err.to_string())
                }
            };
            if tx.send(terminal).await.is_err() {
                tracing::debug!("Stream client went away before the final event");
            }
        });

        rx
    }

    async fn run(
        &self,
        mut messages: Vec<ChatMessage>,
        sink: Option<&mpsc::Sender<AgentEvent>>,
    ) -> Result<AgentRun, ApiError> {
        let definitions = self.tools.definitions();
        let mut tools_used = Vec::new();
        let max_steps = self.settings.max_iterations.max(1);

        for step in 0..max_steps {
            tracing::debug!("Reasoning step {}/{}", step + 1, max_steps);
            let request = ChatRequest::new(&self.settings.model_name, messages.clone())
                .with_tools(definitions.clone())
                .with_sampling(self.settings.temperature, self.settings.max_tokens);

            let mut reply = self.llm.chat(request).await?;
            reply.role = Role::Assistant;
            let calls = reply.tool_calls.clone();
            messages.push(reply.clone());

            emit(
                sink,
                AgentEvent::Agent {
                    content: reply.text().to_string(),
                    tool_calls: calls.iter().map(|c| c.function.name.clone()).collect(),
                },
            )
            .await?;

            if calls.is_empty() {
                return Ok(AgentRun {
                    messages,
                    tools_used,
                });
            }

            for call in &calls {
                let output = self.execute_tool(call).await;
                tools_used.push(call.function.name.clone());
                messages.push(ChatMessage::tool_result(&call.id, output.clone()));
                emit(
                    sink,
                    AgentEvent::Tool {
                        name: call.function.name.clone(),
                        content: output,
                    },
                )
                .await?;
            }
        }

        tracing::warn!("Agent stopped after {} model calls without an answer", max_steps);
        messages.push(ChatMessage::assistant(ITERATION_LIMIT_MESSAGE));
        emit(
            sink,
            AgentEvent::Agent {
                content: ITERATION_LIMIT_MESSAGE.to_string(),
                tool_calls: Vec::new(),
            },
        )
        .await?;

        Ok(AgentRun {
            messages,
            tools_used,
        })
    }

    /// Tool output, or the failure text handed back to the model.
    async fn execute_tool(&self, call: &ToolCall) -> String {
        let name = &call.function.name;
        let args = match call.parsed_arguments() {
            Ok(args) => args,
            Err(err) => {
                tracing::warn!("Invalid arguments for tool {}: {}", name, err);
                return format!("Tool `{}` failed: invalid arguments: {}", name, err);
            }
        };

        tracing::info!("Executing tool {} with {}", name, args);
        match self.tools.execute(name, &args).await {
            Ok(output) => output,
            Err(err) => {
                tracing::warn!("Tool {} failed: {}", name, err);
                format!("Tool `{}` failed: {}", name, err)
            }
        }
    }
}

async fn emit(sink: Option<&mpsc::Sender<AgentEvent>>, event: AgentEvent) -> Result<(), ApiError> {
    let Some(sink) = sink else {
        return Ok(());
    };
    sink.send(event)
        .await
        .map_err(|_| ApiError::Internal("stream client disconnected".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::scripted::ScriptedProvider;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct Weather;

    #[async_trait]
    impl Tool for Weather {
        fn name(&self) -> &str {
            "weather"
        }

        fn description(&self) -> &str {
            "Current weather for a city"
        }

        fn parameters(&self) -> Value {
            crate::tools::single_string_schema("city", "City name")
        }

        async fn call(&self, args: &Value) -> Result<String, ApiError> {
            match args["city"].as_str() {
                Some("Pune") => Ok("31°C and sunny".to_string()),
                _ => Err(ApiError::BadRequest("unknown city".to_string())),
            }
        }
    }

    fn agent(llm: Arc<ScriptedProvider>, settings: AgentSettings) -> AgentService {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(Weather));
        AgentService::new(llm, tools, settings)
    }

    fn tool_call(id: &str, city: &str) -> ChatMessage {
        ChatMessage {
            tool_calls: vec![ToolCall::function(id, "weather", json!({ "city": city }))],
            content: None,
            ..ChatMessage::assistant("")
        }
    }

    #[tokio::test]
    async fn tool_results_are_fed_back_until_an_answer() {
        let llm = Arc::new(ScriptedProvider::new());
        llm.push_reply(tool_call("call_1", "Pune"))
            .push_reply(ChatMessage::assistant("It is 31°C and sunny in Pune."));

        let settings = AgentSettings {
            system_message: Some("You are helpful.".to_string()),
            ..AgentSettings::default()
        };
        let agent = agent(llm.clone(), settings);
        let history = vec![
            ChatMessage::user("Hi"),
            ChatMessage::assistant("Hello!"),
            ChatMessage::tool_result("stale", "ignored"),
        ];
        let run = agent.invoke("Weather in Pune?", &history).await.unwrap();

        assert_eq!(run.answer(), "It is 31°C and sunny in Pune.");
        assert_eq!(run.tools_used, vec!["weather"]);

        let requests = llm.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].model, "gpt-4o");
        assert_eq!(requests[0].tools.len(), 1);
        assert_eq!(requests[0].messages.len(), 4);
        assert_eq!(requests[0].messages[0].role, Role::System);
        let fed_back = requests[1].messages.last().unwrap();
        assert_eq!(fed_back.role, Role::Tool);
        assert_eq!(fed_back.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(fed_back.text(), "31°C and sunny");

        let conversation = run.conversation();
        let texts: Vec<&str> = conversation.iter().map(ChatMessage::text).collect();
        assert_eq!(
            texts,
            vec!["Hi", "Hello!", "Weather in Pune?", "It is 31°C and sunny in Pune."]
        );
    }

    #[tokio::test]
    async fn tool_failures_do_not_abort_the_run() {
        let llm = Arc::new(ScriptedProvider::new());
        let mut bad_args = tool_call("call_2", "x");
        bad_args.tool_calls[0].function.arguments = "{not json".to_string();
        llm.push_reply(tool_call("call_1", "Atlantis"))
            .push_reply(bad_args)
            .push_reply(ChatMessage::assistant("I could not find that city."));

        let agent = agent(llm.clone(), AgentSettings::default());
        let run = agent.invoke("Weather in Atlantis?", &[]).await.unwrap();
        assert_eq!(run.answer(), "I could not find that city.");

        let requests = llm.requests();
        assert!(requests[1]
            .messages
            .last()
            .unwrap()
            .text()
            .starts_with("Tool `weather` failed: bad request: unknown city"));
        assert!(requests[2]
            .messages
            .last()
            .unwrap()
            .text()
            .starts_with("Tool `weather` failed: invalid arguments"));
    }

    #[tokio::test]
    async fn iteration_limit_ends_with_apology() {
        let llm = Arc::new(ScriptedProvider::new());
        for idx in 0..3 {
            llm.push_reply(tool_call(&format!("call_{}", idx), "Pune"));
        }
        let settings = AgentSettings {
            max_iterations: 2,
            ..AgentSettings::default()
        };
        let agent = agent(llm.clone(), settings);
        let run = agent.invoke("loop forever", &[]).await.unwrap();

        assert_eq!(run.answer(), ITERATION_LIMIT_MESSAGE);
        assert_eq!(llm.requests().len(), 2);
        assert_eq!(run.tools_used.len(), 2);
    }

    #[tokio::test]
    async fn llm_errors_propagate_from_invoke() {
        let llm = Arc::new(ScriptedProvider::new());
        llm.push_failure("upstream 500");
        let agent = agent(llm, AgentSettings::default());
        assert!(matches!(
            agent.invoke("hi", &[]).await,
            Err(ApiError::Internal(_))
        ));
    }

    #[tokio::test]
    async fn stream_emits_steps_and_one_terminal_event() {
        let llm = Arc::new(ScriptedProvider::new());
        llm.push_reply(tool_call("call_1", "Pune"))
            .push_reply(ChatMessage::assistant("Sunny."));
        let agent = Arc::new(agent(llm, AgentSettings::default()));

        let mut rx = agent.stream("Weather?".to_string(), Vec::new());
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                AgentEvent::Agent {
                    content: String::new(),
                    tool_calls: vec!["weather".to_string()]
                },
                AgentEvent::Tool {
                    name: "weather".to_string(),
                    content: "31°C and sunny".to_string()
                },
                AgentEvent::Agent {
                    content: "Sunny.".to_string(),
                    tool_calls: Vec::new()
                },
                AgentEvent::End,
            ]
        );
    }

    #[tokio::test]
    async fn stream_reports_failures_as_error_event() {
        let llm = Arc::new(ScriptedProvider::new());
        llm.push_failure("upstream 500");
        let agent = Arc::new(agent(llm, AgentSettings::default()));

        let mut rx = agent.stream("hi".to_string(), Vec::new());
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], AgentEvent::Error(msg) if msg.contains("upstream 500")));
    }

    #[test]
    fn info_reports_tools() {
        let agent = agent(Arc::new(ScriptedProvider::new()), AgentSettings::default());
        let info = agent.info();
        assert_eq!(info.tools, vec!["weather"]);
        assert_eq!(info.tools_count, 1);
        assert_eq!(info.max_iterations, 12);
    }
}
