//! A multi-agent orchestration bus.
//!
//! This crate provides the wire schema and validator ([`schema`]), a
//! length-prefixed framed transport over a Unix domain socket
//! ([`transport`]), a per-process worker bridge ([`bridge`], [`worker`]),
//! an orchestrator-side agent manager and keyword router ([`router`]), and
//! a permissioned tool registry ([`tool_registry`], [`tools`]).
//!
//! # Example
//!
//! ```
//! use agentbus::router::{AgentManager, route_by_keywords, SUPERVISOR_AGENT_ID};
//!
//! assert_eq!(route_by_keywords("coordinate the plan", None), SUPERVISOR_AGENT_ID);
//! let _manager = AgentManager::new();
//! ```

pub mod bridge;
pub mod collaborators;
pub mod config;
pub mod conversation;
pub mod error;
pub mod router;
pub mod schema;
pub mod tool_registry;
pub mod tools;
pub mod transport;
pub mod worker;

pub use config::BusConfig;
pub use error::{ErrorCode, McpError, McpResult};
