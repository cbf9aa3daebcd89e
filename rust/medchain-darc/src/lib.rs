#![warn(missing_docs)]

//! Distributed access-rights control.
//!
//! A [`Darc`] is a versioned set of [`Rules`], each mapping an [`Action`] to
//! an [`Expr`] over signer identities. DARCs change only by evolution: a new
//! version that points back at the one it replaces and keeps the same base
//! id. The [`evolution`] module decides which evolutions are allowed, and the
//! [`RuleStore`] keeps every version reachable for audit.

mod error;
pub use error::*;

mod action;
pub use action::*;

mod expression;
pub use expression::*;

mod rules;
pub use rules::*;

mod darc;
pub use darc::*;

pub mod evolution;

mod store;
pub use store::*;
