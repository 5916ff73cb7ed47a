#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Enemy simulation: status effects, path-following actors and the pooled
//! registry that owns them.
//!
//! The registry is the only writer of enemy state. Defenders read it through
//! [`merge_defence_core::EnemyQuery`] and request damage through
//! [`EnemyRegistry::damage`]; every terminal outcome surfaces exactly once as
//! a [`Resolution`].

mod actor;
mod registry;
mod status;

pub use actor::{Enemy, EnemyState, Fate};
pub use registry::{EnemyRegistry, EnemySnapshot, EnemyView, Resolution, SpawnError};
pub use status::StatusEffects;
