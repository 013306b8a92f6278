use serde::Serialize;

use crate::core::text::timestamp;

/// One step of an agent run, as observed by a streaming client.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A model turn. `tool_calls` names the tools it asked for; empty on the
    /// final answer.
    Agent {
        content: String,
        tool_calls: Vec<String>,
    },
    Tool {
        name: String,
        content: String,
    },
    End,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamEventType {
    Agent,
    Tool,
    End,
    Error,
}

/// Wire form of an [`AgentEvent`], sent as the `data:` line of an SSE frame.
#[derive(Debug, Clone, Serialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub kind: StreamEventType,
    pub content: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<String>>,
}

impl From<AgentEvent> for StreamEvent {
    fn from(event: AgentEvent) -> Self {
        let (kind, content, name, tool_calls) = match event {
            AgentEvent::Agent {
                content,
                tool_calls,
            } => (
                StreamEventType::Agent,
                content,
                None,
                (!tool_calls.is_empty()).then_some(tool_calls),
            ),
            AgentEvent::Tool { name, content } => (StreamEventType::Tool, content, Some(name), None),
            AgentEvent::End => (StreamEventType::End, "Streaming complete".to_string(), None, None),
            AgentEvent::Error(message) => (StreamEventType::Error, message, None, None),
        };
        Self {
            kind,
            content,
            timestamp: timestamp(),
            name,
            tool_calls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape() {
        let agent = serde_json::to_value(StreamEvent::from(AgentEvent::Agent {
            content: String::new(),
            tool_calls: vec!["WikipediaSearch".to_string()],
        }))
        .unwrap();
        assert_eq!(agent["type"], "agent");
        assert_eq!(agent["tool_calls"], json!(["WikipediaSearch"]));
        assert!(agent.get("name").is_none());
        assert!(agent["timestamp"].as_str().unwrap().ends_with('Z'));

        let tool = serde_json::to_value(StreamEvent::from(AgentEvent::Tool {
            name: "WikipediaSearch".to_string(),
            content: "Page: Rust".to_string(),
        }))
        .unwrap();
        assert_eq!(tool["type"], "tool");
        assert_eq!(tool["name"], "WikipediaSearch");
        assert!(tool.get("tool_calls").is_none());

        let end = serde_json::to_value(StreamEvent::from(AgentEvent::End)).unwrap();
        assert_eq!(end["type"], "end");
        assert_eq!(end["content"], "Streaming complete");

        let error = serde_json::to_value(StreamEvent::from(AgentEvent::Error("boom".to_string()))).unwrap();
        assert_eq!(error["type"], "error");
        assert_eq!(error["content"], "boom");
    }
}
