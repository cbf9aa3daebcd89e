#![warn(missing_docs)]

//! Client side of the medchain authorization engine.
//!
//! A [`Session`] holds the signing keys of one client together with the
//! signer counters it last used, and turns high level operations (submit a
//! query, decide it, co-sign a proposal, evolve a DARC) into signed
//! transactions against any [`medchain_ledger::LedgerApi`]. Stale counters
//! are refreshed and the transaction retried a bounded number of times.
//!
//! [`query_transitions`] follows committed query status changes in block
//! order, resuming after a block the caller has already seen.

mod error;
pub use error::*;

mod config;
pub use config::*;

mod session;
pub use session::*;

mod stream;
pub use stream::*;
