//! Agent module - the turn loop
//!
//! An [`Agent`] ties one session's [`ContextManager`](crate::context::ContextManager)
//! to the shared [`ClientManager`](crate::mcp::ClientManager), an
//! [`LlmGateway`](crate::providers::LlmGateway) and an
//! [`EventBus`](crate::bus::EventBus).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Context   │<───>│    Agent    │────>│ LlmGateway  │
//! │   Manager   │     │  run_turn   │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!               ┌────────────┴────────────┐
//!               ▼                         ▼
//!        ┌─────────────┐           ┌─────────────┐
//!        │   Client    │           │  EventBus   │
//!        │   Manager   │           │  (events)   │
//!        └─────────────┘           └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mcphost::agent::{Agent, AgentOptions};
//! use mcphost::session::Message;
//!
//! async fn chat(context: ContextManager, clients: Arc<ClientManager>, gateway: Arc<dyn LlmGateway>) {
//!     let agent = Agent::new(context, clients, gateway, EventBus::default(), AgentOptions::default());
//!     let reply = agent.run_turn(Message::user("List my files")).await.unwrap();
//!     println!("{}", reply);
//! }
//! ```

mod r#loop;

pub use r#loop::{Agent, AgentOptions};
