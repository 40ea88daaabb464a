//! # ragent-agent
//!
//! The [`LlmAgent`] drives a language model through a bounded loop: the
//! model either answers or requests tool calls, the agent runs the tools and
//! feeds their results back, and the loop repeats until an answer arrives or
//! the round budget is spent.
//!
//! ```text
//! Start ──▶ Agent ──(tool calls)──▶ Tools
//!             │  ▲                    │
//!             │  └────────────────────┘
//!             └──(no tool calls)──▶ End
//! ```

mod llm_agent;
mod registry;

pub use llm_agent::{AgentRun, DEFAULT_MAX_ROUNDS, LlmAgent, LlmAgentBuilder};
pub use registry::ToolRegistry;
