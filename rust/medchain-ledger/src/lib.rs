#![warn(missing_docs)]

//! An in-memory ledger that contracts run on.
//!
//! State is a set of [`Instance`]s, each owned by a contract type and
//! governed by a DARC. Clients change state by submitting a signed
//! [`ClientTransaction`]; every instruction in it is verified and executed
//! by the [`Contract`] of its target instance, and the resulting
//! [`StateChange`]s are committed together in a new [`Block`] or not at
//! all. Per-identity signer counters prevent replays, and [`Proof`]s let a
//! reader check an instance against a block's state root.

mod error;
pub use error::*;

mod arguments;
pub use arguments::*;

mod instance;
pub use instance::*;

mod instruction;
pub use instruction::*;

mod transaction;
pub use transaction::*;

mod state_change;
pub use state_change::*;

mod config;
pub use config::*;

mod contract;
pub use contract::*;

pub mod verify;

mod block;
pub use block::*;

mod proof;
pub use proof::*;

mod memory;
pub use memory::*;

mod api;
pub use api::*;
