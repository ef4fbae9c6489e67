//! Query routing.
//!
//! Turns raw request text into a [`Query`] and picks the [`AgentKind`]
//! that will handle it.
//!
//! [`AgentKind`]: crate::agent::AgentKind

mod classifier;
mod query;

pub use classifier::Classifier;
pub use query::{fingerprint, Query};
