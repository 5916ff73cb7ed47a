#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Defender combat: per-defender targeting and cooldowns, plus the
//! projectiles that carry attacks to their targets.
//!
//! Both halves only read enemies through [`merge_defence_core::EnemyQuery`].
//! Attacks and impacts are appended to caller-owned buffers; the world applies
//! the resulting damage to the enemy registry.

mod actor;
mod projectiles;

pub use actor::{Attack, Defender, DefenderState};
pub use projectiles::{Impact, ProjectileSnapshot, Projectiles};
