//! ACP Ledger: Agent Commerce Coordination
//!
//! Agents register for discovery, create jobs for one another and move those jobs through
//! a fixed lifecycle. Every agent profile and job revision is an immutable, hash-addressed
//! record in a local replica; settlement queries cross an asynchronous request/response
//! bridge to a chain adapter.

pub mod bridge;
pub mod config;
pub mod coordinator;
pub mod entry;
pub mod error;
pub mod heads;
pub mod ledger;
pub mod lifecycle;
pub mod links;
pub mod logging;
pub mod settlement;
pub mod store;
pub mod tooling;
pub mod tools;
pub mod types;
pub mod validation;
