#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Merge Defence simulation.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative world, and pure systems. Adapters submit [`Command`] values
//! describing desired mutations, the world executes those commands via its
//! `apply` entry point, and then appends [`Event`] values to a caller-owned
//! buffer for any number of consumers. Systems read immutable views, most
//! notably through the [`EnemyQuery`] seam, and answer with request batches.

use std::{fmt, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod config;

pub use config::{
    BalanceConfig, ConfigError, Curve, DefenderConfig, EnemyConfig, GameConfig, GridConfig,
    LevelConfig, ProjectileConfig,
};
pub use glam::Vec2;

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Resets the run and launches the first wave.
    StartRun,
    /// Starts the next wave early, skipping any pending intermission.
    StartNextWave,
    /// Clears the board and force-completes the active wave.
    SkipWave,
    /// Restores player health after a game over and resumes play.
    Revive {
        /// Fraction of maximum health restored, clamped to `[0, 1]`.
        health_fraction: f32,
    },
    /// Clears enemies, projectiles, defenders and wave progress.
    ResetRun,
    /// Places a new defender on the grid.
    PlaceDefender {
        /// Type of defender to create.
        kind: DefenderTypeId,
        /// Target cell, or `None` to pick a uniformly random empty cell.
        cell: Option<CellCoord>,
        /// Level assigned to the new defender.
        level: u32,
    },
    /// Merges the defender on `source` into the defender on `target`.
    MergeDefenders {
        /// Cell holding the defender consumed by the merge.
        source: CellCoord,
        /// Cell holding the defender that gains a level.
        target: CellCoord,
    },
    /// Picks up the defender on the provided cell, suspending its combat logic.
    BeginDrag {
        /// Cell holding the defender being dragged.
        cell: CellCoord,
    },
    /// Puts a dragged defender back without moving it.
    CancelDrag {
        /// Cell holding the dragged defender.
        cell: CellCoord,
    },
    /// Drops a dragged defender at a world position.
    DropDefender {
        /// Cell the dragged defender was picked up from.
        from: CellCoord,
        /// World-space drop position, mapped onto the grid by the world.
        at: Vec2,
    },
    /// Removes the defender occupying the provided cell.
    RemoveDefender {
        /// Cell holding the defender to remove.
        cell: CellCoord,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Announces that a fresh run began on the provided level.
    RunStarted {
        /// Level the run plays on.
        level: LevelId,
        /// Number of waves the level defines.
        total_waves: u32,
    },
    /// Announces that a wave began spawning.
    WaveStarted {
        /// One-based index of the wave.
        wave: u32,
        /// Number of waves the level defines.
        total_waves: u32,
    },
    /// Confirms that an enemy entered the path.
    EnemySpawned {
        /// Handle assigned to the enemy by the registry.
        enemy: EnemyHandle,
        /// Configured type of the enemy.
        kind: EnemyTypeId,
        /// Wave the enemy belongs to.
        wave: u32,
    },
    /// Reports that an enemy was killed and its rewards were rolled.
    EnemyDefeated {
        /// Handle of the defeated enemy.
        enemy: EnemyHandle,
        /// Configured type of the enemy.
        kind: EnemyTypeId,
        /// Coins dropped by the enemy.
        coins: u32,
        /// Gems dropped by the enemy, zero when the drop roll failed.
        gems: u32,
    },
    /// Reports that an enemy walked off the end of the path.
    EnemyReachedEnd {
        /// Handle of the enemy that escaped.
        enemy: EnemyHandle,
        /// Configured type of the enemy.
        kind: EnemyTypeId,
        /// Damage dealt to the player.
        damage: u32,
    },
    /// Reports the player's health after it changed.
    PlayerHealthChanged {
        /// Remaining player health.
        current: u32,
        /// Maximum player health.
        max: u32,
    },
    /// Announces that every enemy of a wave was resolved.
    WaveCompleted {
        /// One-based index of the wave.
        wave: u32,
        /// Indicates that the player took no damage during the wave.
        perfect: bool,
    },
    /// Announces that the final wave was cleared.
    LevelCompleted {
        /// Level that was completed.
        level: LevelId,
        /// Number of waves cleared.
        waves: u32,
    },
    /// Announces that the run ended in defeat.
    LevelFailed {
        /// Level that was failed.
        level: LevelId,
        /// Reason the run ended.
        reason: FailureReason,
    },
    /// Confirms that a defender was placed on the grid.
    DefenderPlaced {
        /// Identifier allocated to the defender.
        defender: DefenderId,
        /// Type of the defender.
        kind: DefenderTypeId,
        /// Level of the defender.
        level: u32,
        /// Cell the defender occupies.
        cell: CellCoord,
    },
    /// Confirms that two defenders merged into one.
    DefenderMerged {
        /// Identifier of the surviving defender.
        defender: DefenderId,
        /// Type of the merged defender.
        kind: DefenderTypeId,
        /// Level reached by the merge.
        level: u32,
    },
    /// Confirms that a defender moved onto an empty cell.
    DefenderMoved {
        /// Identifier of the moved defender.
        defender: DefenderId,
        /// Cell the defender left.
        from: CellCoord,
        /// Cell the defender now occupies.
        to: CellCoord,
    },
    /// Confirms that two defenders exchanged cells.
    DefendersSwapped {
        /// Defender that was dragged.
        dragged: DefenderId,
        /// Defender that occupied the drop cell.
        displaced: DefenderId,
    },
    /// Confirms that a defender was removed from the grid.
    DefenderRemoved {
        /// Identifier of the removed defender.
        defender: DefenderId,
        /// Cell the defender occupied.
        cell: CellCoord,
    },
    /// Reports that a placement request was rejected.
    PlacementRejected {
        /// Type requested for placement.
        kind: DefenderTypeId,
        /// Specific reason the placement failed.
        reason: PlacementError,
    },
    /// Reports that a merge request was rejected.
    MergeRejected {
        /// Cell provided as the merge source.
        source: CellCoord,
        /// Cell provided as the merge target.
        target: CellCoord,
        /// Specific reason the merge failed.
        reason: MergeError,
    },
}

/// Reasons a run can end in defeat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Enemies reaching the end of the path drained the player's health.
    HealthDepleted,
}

impl FailureReason {
    /// Stable identifier handed to analytics collaborators.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HealthDepleted => "health_depleted",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! name_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier from the provided name.
            #[must_use]
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            /// Retrieves the textual representation of the identifier.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

name_id!(
    /// Identifier of an externally authored enemy configuration.
    EnemyTypeId
);
name_id!(
    /// Identifier of an externally authored defender configuration.
    DefenderTypeId
);
name_id!(
    /// Identifier of the level a run is played on.
    LevelId
);

/// Stable handle to a pooled enemy slot.
///
/// The generation advances every time the slot is recycled, so a handle that
/// outlives its enemy never aliases whichever enemy reuses the slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnemyHandle {
    index: u32,
    generation: u32,
}

impl EnemyHandle {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the registry arena.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the handle was issued.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }
}

/// Unique identifier assigned to a defender.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefenderId(u32);

impl DefenderId {
    /// Creates a new defender identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Timed modifier applied to an enemy, usually by a defender's hit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusEffect {
    /// Scales movement speed by `1 - factor`.
    Slow {
        /// Fraction of movement speed removed, within `[0, 1]`.
        factor: f32,
        /// Seconds the slow lasts.
        duration_secs: f32,
    },
    /// Suppresses movement entirely.
    Stun {
        /// Seconds the stun lasts.
        duration_secs: f32,
    },
    /// Deals damage over time independent of movement.
    Poison {
        /// Damage dealt per second of poison.
        damage_per_second: f32,
        /// Seconds the poison lasts.
        duration_secs: f32,
    },
}

impl StatusEffect {
    /// Lifetime of the effect, zero for negative or non-finite settings.
    #[must_use]
    pub fn duration(&self) -> Duration {
        let secs = match *self {
            Self::Slow { duration_secs, .. }
            | Self::Stun { duration_secs }
            | Self::Poison { duration_secs, .. } => duration_secs,
        };
        seconds(secs)
    }
}

/// Converts a configured number of seconds into a [`Duration`].
///
/// Negative, NaN or overflowing inputs collapse to zero.
#[must_use]
pub fn seconds(secs: f32) -> Duration {
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::ZERO)
}

/// Read access to live enemies used by defenders and projectiles.
pub trait EnemyQuery {
    /// Returns the live enemy within `range` of `origin` at the smallest
    /// distance, breaking ties by spawn order.
    fn closest_in_range(&self, origin: Vec2, range: f32) -> Option<EnemyHandle>;

    /// Returns the position of a live enemy, `None` for dead or recycled handles.
    fn position(&self, enemy: EnemyHandle) -> Option<Vec2>;

    /// Reports whether the handle still refers to a live enemy.
    fn is_alive(&self, enemy: EnemyHandle) -> bool {
        self.position(enemy).is_some()
    }
}

/// Currency collaborator credited when enemies drop rewards.
pub trait CurrencyLedger {
    /// Credits coins to the player.
    fn add_coins(&mut self, amount: u32);

    /// Credits gems to the player.
    fn add_gems(&mut self, amount: u32);
}

/// Audio collaborator that plays fire-and-forget sound effects.
pub trait SfxPlayer {
    /// Plays the named clip once.
    fn play_sfx_one_shot(&mut self, clip: &str);
}

/// Reasons a defender placement request may be rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum PlacementError {
    /// The requested cell lies outside the grid.
    #[error("cell lies outside the grid")]
    OutOfBounds,
    /// The requested cell already holds a defender.
    #[error("cell is already occupied")]
    Occupied,
    /// A random cell was requested but the grid is full.
    #[error("no empty cell is available")]
    NoEmptyCell,
    /// The defender type has no configuration.
    #[error("defender type is not configured")]
    UnknownDefender,
    /// The requested level lies outside `1..=max_merge_level`.
    #[error("level lies outside the allowed range")]
    InvalidLevel,
}

/// Reasons a merge request may be rejected. A rejected merge changes nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Error)]
pub enum MergeError {
    /// The source cell holds no defender.
    #[error("source cell is empty")]
    EmptySource,
    /// The target cell holds no defender.
    #[error("target cell is empty")]
    EmptyTarget,
    /// Source and target refer to the same cell.
    #[error("cannot merge a defender with itself")]
    SameCell,
    /// The defenders are of different types.
    #[error("defender types differ")]
    KindMismatch,
    /// The defenders are at different levels.
    #[error("defender levels differ")]
    LevelMismatch,
    /// The merged level would exceed the configured maximum.
    #[error("merge would exceed the maximum level")]
    MaxLevel,
}
