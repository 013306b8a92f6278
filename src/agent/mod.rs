pub mod events;
pub mod service;

pub use events::{AgentEvent, StreamEvent, StreamEventType};
pub use service::{AgentInfo, AgentRun, AgentService, ITERATION_LIMIT_MESSAGE};
