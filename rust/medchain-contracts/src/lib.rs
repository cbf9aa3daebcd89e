#![warn(missing_docs)]

//! Contracts of the medchain authorization engine.
//!
//! - [`query`]: query ids, statuses and the per-project [`QueryStore`].
//! - [`evaluator`]: per-signer authorization of a query against DARC rules.
//! - [`lifecycle`]: the query status state machine.
//! - [`medchain`]: the query contract that owns a project's store.
//! - [`project`]: project metadata and user authorizations.
//! - [`deferred`]: multi-party co-signing of one instruction.
//! - [`darc`]: plain and secure DARC contracts.
//!
//! [`registry`] wires them into a [`medchain_ledger::ContractRegistry`].

pub mod darc;
pub mod deferred;
pub mod evaluator;
pub mod lifecycle;
pub mod medchain;
pub mod project;
pub mod query;
pub mod registry;

pub use query::{Query, QueryId, QueryStatus, QueryStore};
pub use registry::registry;
